use crate::ext::BytesVec;


/// Appends an HTML page sending web browsers on to `url`.
///
/// Gopher clients follow `URL:` selectors by asking the server for them.
/// The page names the target twice, once in a `refresh` header for browsers
/// that follow it automatically and once as a link. `url` is HTML-escaped.
pub fn html_redirect<B: BytesVec>(out: &mut B, url: &str) {
    let url = escape_html(url);
    out.put_str("<!DOCTYPE html>\n<html>\n<head>\n<meta http-equiv=\"refresh\" content=\"1;URL=");
    out.put_str(&url);
    out.put_str("\">\n</head>\n<body>\nYou are following an external link to a web site.\n<a href=\"");
    out.put_str(&url);
    out.put_str("\">Click here</a> if your browser does not redirect you.\n</body>\n</html>\n");
}

/// Escapes the characters with a special meaning in HTML text and attributes.
#[must_use]
pub fn escape_html(s: &str) -> std::borrow::Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return s.into();
    }
    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out.into()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_names_url_twice() {
        let mut out = Vec::new();
        html_redirect(&mut out, "gopher://example.org/1");
        let page = String::from_utf8(out).expect("page should be UTF-8");
        assert_eq!(page.matches("gopher://example.org/1").count(), 2);
        assert!(page.contains("content=\"1;URL=gopher://example.org/1\""));
        assert!(page.contains("href=\"gopher://example.org/1\""));
    }

    #[test]
    fn escaping() {
        assert_eq!(escape_html("plain"), "plain");
        assert_eq!(escape_html(r#"a"><script>&'"#), "a&quot;&gt;&lt;script&gt;&amp;&#39;");

        let mut out = Vec::new();
        html_redirect(&mut out, "http://x/\"onload=\"evil");
        let page = String::from_utf8_lossy(&out);
        assert!(!page.contains("\"onload"));
    }
}
