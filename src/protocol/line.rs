use compact_str::ToCompactString;

use super::ItemType;
use crate::ext::{ByteLines, BytesVec};
use crate::Error;


/// Line terminator for every Gopher line.
pub const CRLF: &[u8] = b"\r\n";
/// The line ending every menu, sent exactly once per response.
pub const LAST_LINE: &[u8] = b".\r\n";

/// Selector used by info lines, which are not navigable.
pub const NULL_SELECTOR: &str = "-";
/// Selector marking a gophermap title line.
pub const TITLE_SELECTOR: &str = "TITLE";
/// Host used by info lines.
pub const NULL_HOST: &str = "null.host";
/// Port used by info lines.
pub const NULL_PORT: &str = "1";

/// Longest selector a menu line may carry.
pub const MAX_SELECTOR_LEN: usize = 255;
/// Substituted for selectors that cannot be sent as-is.
pub const BAD_SELECTOR: &str = "<selector too long>";


/// Appends a menu line `type name HT selector HT host HT port CRLF`.
///
/// `name` is truncated to fit `page_width` and stripped of characters that
/// would break the line format. A selector longer than [`MAX_SELECTOR_LEN`]
/// or containing tabs or line breaks is replaced with [`BAD_SELECTOR`].
///
/// # Errors
/// Returns [`Error::EmptyItemType`] if `item` is an internal sentinel.
pub fn menu_line<B: BytesVec>(
    out: &mut B,
    item: ItemType,
    name: &str,
    selector: &str,
    host: &str,
    port: u16,
    page_width: usize,
) -> Result<(), Error> {
    if item.is_sentinel() {
        return Err(Error::EmptyItemType(item.as_char()));
    }
    let selector = if selector.len() > MAX_SELECTOR_LEN
        || selector.as_bytes().find_line_break().is_some()
    {
        BAD_SELECTOR
    } else {
        selector
    };
    raw_line(out, item, name, selector, host, &port.to_compact_string(), page_width);
    Ok(())
}

/// Appends a non-navigable info line showing `text`.
pub fn info_line<B: BytesVec>(out: &mut B, text: &str, page_width: usize) {
    raw_line(out, ItemType::Info, text, NULL_SELECTOR, NULL_HOST, NULL_PORT, page_width);
}

/// Appends an info line marked as the menu's title.
pub fn title_line<B: BytesVec>(out: &mut B, text: &str, page_width: usize) {
    raw_line(out, ItemType::Info, text, TITLE_SELECTOR, NULL_HOST, NULL_PORT, page_width);
}

/// Appends a complete error response: one type-3 line carrying `status`,
/// followed by the last line.
pub fn error_response<B: BytesVec>(out: &mut B, status: &str) {
    out.put(&[ItemType::Error.into()]);
    put_clean(out, status);
    out.put(CRLF);
    out.put(LAST_LINE);
}

/// Appends `text` as a sequence of info lines no wider than `page_width`.
///
/// Each input line is wrapped on character boundaries. Tabs become single
/// spaces. Empty input lines produce blank info lines.
pub fn reflow<B: BytesVec>(out: &mut B, text: &[u8], page_width: usize) {
    let width = page_width.max(1);
    for line in text.split_lines() {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            info_line(out, "", page_width);
            continue;
        }

        let mut rest = line;
        while !rest.is_empty() {
            let cut = rest.char_indices().nth(width).map_or(rest.len(), |(i, _)| i);
            let (chunk, tail) = rest.split_at(cut);
            info_line(out, chunk, page_width);
            rest = tail;
        }
    }
}

/// Appends the last line.
#[inline]
pub fn last_line<B: BytesVec>(out: &mut B) {
    out.put(LAST_LINE);
}


fn raw_line<B: BytesVec>(
    out: &mut B,
    item: ItemType,
    name: &str,
    selector: &str,
    host: &str,
    port: &str,
    page_width: usize,
) {
    out.put(&[item.into()]);
    put_clean(out, &truncate(name, page_width));
    for field in [selector, host, port] {
        out.put(b"\t");
        out.put_str(field);
    }
    out.put(CRLF);
}

/// Appends `s` with tabs and line breaks turned into spaces.
fn put_clean<B: BytesVec>(out: &mut B, s: &str) {
    let bytes = s.as_bytes();
    if bytes.find_line_break().is_none() {
        out.put(bytes);
        return;
    }
    for &b in bytes {
        out.put(&[if matches!(b, b'\t' | b'\r' | b'\n') { b' ' } else { b }]);
    }
}

/// Cuts names wider than `page_width` to `page_width - 5` characters and
/// marks the cut with `...`.
fn truncate(name: &str, page_width: usize) -> std::borrow::Cow<'_, str> {
    if name.chars().count() <= page_width {
        return name.into();
    }
    let keep = page_width.saturating_sub(5);
    let end = name.char_indices().nth(keep).map_or(name.len(), |(i, _)| i);
    format!("{}...", &name[..end]).into()
}
