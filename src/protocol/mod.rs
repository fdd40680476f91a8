/// Gopher item types and the file name classifier.
pub mod item;
/// Formatting of menu, info and error lines.
pub mod line;
/// HTML stubs for `URL:` selectors.
pub mod redirect;

pub use item::{classify, ItemType};

use crate::ext::ByteLines;


/// The well-known Gopher port.
pub const DEFAULT_PORT: u16 = 70;

/// Prefix marking selectors that redirect to an external URL.
pub const URL_PREFIX: &str = "URL:";


/// Error types that may occur while processing Gopher protocol elements.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The byte is not part of the Gopher item type alphabet.
    #[error("unknown Gopher item type {0:#04x}")]
    UnknownItemType(u8),
    /// The selector is not valid UTF-8.
    #[error("selector is not valid UTF-8")]
    InvalidSelector,
}


/// A borrowed Gopher selector, cut at the first tab or line break.
///
/// Selectors are opaque to the protocol. This wrapper only knows how to
/// recognise `URL:` redirects and how to split off a CGI query string.
#[derive(Debug, PartialEq, Eq, Hash, ref_cast::RefCastCustom)]
#[repr(transparent)]
pub struct Selector(str);

impl Selector {
    /// Wraps a string reference in a [`Selector`].
    #[ref_cast::ref_cast_custom]
    // Unsafe code is generated and checked by ref-cast
    #[allow(unsafe_code, clippy::let_underscore_untyped)]
    #[must_use]
    pub const fn new(s: &str) -> &Self;

    /// Extracts the selector from a raw request line.
    ///
    /// Everything from the first tab, carriage return or line feed onwards
    /// is discarded, which drops Gopher+ and search fields.
    ///
    /// # Errors
    /// Returns an error if the selector is not valid UTF-8.
    pub fn from_request(raw: &[u8]) -> Result<&Self, Error> {
        let end = raw.find_line_break().unwrap_or(raw.len());
        std::str::from_utf8(&raw[..end])
            .map(Self::new)
            .map_err(|_| Error::InvalidSelector)
    }

    /// Returns the selector string.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the target of a `URL:` redirect selector.
    #[inline]
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.0.strip_prefix(URL_PREFIX)
    }

    /// Splits the selector into its path and the query string following
    /// the first `?`, if any.
    #[must_use]
    pub fn split_query(&self) -> (&str, Option<&str>) {
        match self.0.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (&self.0, None),
        }
    }
}

impl<'a> From<&'a str> for &'a Selector {
    #[inline]
    fn from(v: &'a str) -> Self {
        Selector::new(v)
    }
}

impl AsRef<str> for Selector {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_cut() -> Result<(), Error> {
        assert_eq!(Selector::from_request(b"/a/b\r\n")?.as_str(), "/a/b");
        assert_eq!(Selector::from_request(b"/search\tterms\r\n")?.as_str(), "/search");
        assert_eq!(Selector::from_request(b"/lf-only\n")?.as_str(), "/lf-only");
        assert_eq!(Selector::from_request(b"\r\n")?.as_str(), "");
        assert_eq!(Selector::from_request(b"")?.as_str(), "");
        Ok(())
    }

    #[test]
    fn request_invalid() {
        assert!(matches!(
            Selector::from_request(b"/bad\xff\xfe\r\n"),
            Err(Error::InvalidSelector),
        ));
    }

    #[test]
    fn url() {
        assert_eq!(Selector::new("URL:gopher://example.org/1").url(), Some("gopher://example.org/1"));
        assert_eq!(Selector::new("/URL:x").url(), None);
        assert_eq!(Selector::new("url:x").url(), None);
    }

    #[test]
    fn query() {
        assert_eq!(Selector::new("/cgi-bin/hi?a=1&b=2").split_query(), ("/cgi-bin/hi", Some("a=1&b=2")));
        assert_eq!(Selector::new("/x?").split_query(), ("/x", Some("")));
        assert_eq!(Selector::new("/x?a?b").split_query(), ("/x", Some("a?b")));
        assert_eq!(Selector::new("/x").split_query(), ("/x", None));
    }
}
