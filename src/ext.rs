use smallvec::SmallVec;


/// Line-oriented helpers for raw byte slices.
pub(crate) trait ByteLines {
    /// Returns the index of the first occurrence of `b`.
    fn find_byte(&self, b: u8) -> Option<usize>;

    /// Returns the index of the first tab, carriage return or line feed.
    fn find_line_break(&self) -> Option<usize>;

    /// Tests whether the bytes contain a `\r\n` sequence anywhere.
    fn has_crlf(&self) -> bool;

    /// Splits into lines on `\r\n` if one is present anywhere, else on `\n`.
    ///
    /// A single trailing terminator does not produce a trailing empty line.
    fn split_lines(&self) -> SplitLines<'_>;
}

impl ByteLines for [u8] {
    #[inline]
    fn find_byte(&self, b: u8) -> Option<usize> {
        self.iter().position(|&c| c == b)
    }

    #[inline]
    fn find_line_break(&self) -> Option<usize> {
        self.iter().position(|&c| matches!(c, b'\t' | b'\r' | b'\n'))
    }

    fn has_crlf(&self) -> bool {
        self.windows(2).any(|w| w == b"\r\n")
    }

    fn split_lines(&self) -> SplitLines<'_> {
        let crlf = self.has_crlf();
        SplitLines { rest: Some(self), crlf }
    }
}


/// Iterator returned by `ByteLines::split_lines`.
#[derive(Debug, Clone)]
pub(crate) struct SplitLines<'a> {
    rest: Option<&'a [u8]>,
    crlf: bool,
}

impl<'a> Iterator for SplitLines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.rest?;
        if rest.is_empty() {
            self.rest = None;
            return None;
        }

        let found = if self.crlf {
            rest.windows(2).position(|w| w == b"\r\n").map(|i| (i, 2))
        } else {
            rest.find_byte(b'\n').map(|i| (i, 1))
        };
        match found {
            Some((i, term)) => {
                self.rest = Some(&rest[i + term..]);
                Some(&rest[..i])
            },
            None => {
                self.rest = None;
                Some(rest)
            },
        }
    }
}

impl std::iter::FusedIterator for SplitLines<'_> {}


/// A trait for generic abstraction over [`Vec<u8>`]-like output buffers.
pub trait BytesVec {
    /// Copies and appends all bytes from `other` in-order.
    fn put(&mut self, other: &[u8]);

    /// Appends a string's UTF-8 bytes.
    #[inline]
    fn put_str(&mut self, s: &str) {
        self.put(s.as_bytes());
    }
}

impl BytesVec for Vec<u8> {
    #[inline]
    fn put(&mut self, other: &[u8]) {
        self.extend_from_slice(other);
    }
}

impl<const N: usize> BytesVec for SmallVec<[u8; N]> {
    #[inline]
    fn put(&mut self, other: &[u8]) {
        self.extend_from_slice(other);
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find() {
        assert_eq!(b"abc\tdef".find_byte(b'\t'), Some(3));
        assert_eq!(b"abc".find_byte(b'\t'), None);
        assert_eq!(b"/sel\r\n".find_line_break(), Some(4));
        assert_eq!(b"/sel\tquery\r\n".find_line_break(), Some(4));
        assert_eq!(b"/sel".find_line_break(), None);
    }

    #[test]
    fn lines_lf() {
        let lines: Vec<_> = b"one\ntwo\n\nthree\n".split_lines().collect();
        assert_eq!(lines, [&b"one"[..], b"two", b"", b"three"]);
        let lines: Vec<_> = b"no terminator".split_lines().collect();
        assert_eq!(lines, [&b"no terminator"[..]]);
        assert_eq!(b"".split_lines().count(), 0);
    }

    #[test]
    fn lines_crlf() {
        // Stray LFs stay inside lines once CRLF is detected
        let lines: Vec<_> = b"one\r\ntwo\nstill two\r\n\r\nlast".split_lines().collect();
        assert_eq!(lines, [&b"one"[..], b"two\nstill two", b"", b"last"]);
    }

    #[test]
    fn bytesvec() {
        let mut v = Vec::new();
        v.put(b"abc");
        v.put_str("def");
        assert_eq!(v, b"abcdef");

        let mut sv = SmallVec::<[u8; 8]>::new();
        sv.put(b"abc");
        sv.put_str("defghij");
        assert_eq!(&*sv, b"abcdefghij");
    }
}
