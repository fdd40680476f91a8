use std::fmt;

use super::Error as ProtocolError;


/// A validated Gopher item type byte.
///
/// Covers the RFC 1436 types, the common extensions, the gophermap directive
/// characters, and three internal sentinels that never reach the wire.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::FromRepr)]
#[cfg_attr(test, derive(strum::EnumIter))]
#[repr(u8)]
pub enum ItemType {
    // RFC 1436
    File = b'0',
    Directory = b'1',
    CsoServer = b'2',
    Error = b'3',
    BinHex = b'4',
    Archive = b'5',
    Uuencoded = b'6',
    Search = b'7',
    Telnet = b'8',
    Binary = b'9',
    Tn3270 = b'T',
    Gif = b'g',
    Image = b'I',
    Mirror = b'+',

    // Non-standard but widely supported
    Info = b'i',
    Html = b'h',
    Audio = b's',
    Png = b'p',
    Document = b'd',
    Mime = b'M',
    Video = b';',
    Calendar = b'c',

    // Gophermap directives
    End = b'.',
    Title = b'!',
    Comment = b'#',
    Hidden = b'-',
    SubGophermap = b'=',
    EndBeginList = b'*',
    Exec = b'$',

    // Internal sentinels
    InfoNotStated = b'z',
    Unset = b'@',
    Unknown = b'?',
}

impl ItemType {
    /// The type served for files without a more specific classification.
    pub const DEFAULT: Self = Self::Binary;

    /// Tests whether this type is an internal sentinel that must never be
    /// written into a menu line.
    #[inline]
    #[must_use]
    pub fn is_sentinel(self) -> bool {
        matches!(self, Self::InfoNotStated | Self::Unset | Self::Unknown)
    }

    /// Tests whether a gophermap line starting with this type is shown
    /// verbatim even without any tab-separated fields.
    #[inline]
    #[must_use]
    pub fn is_info_like(self) -> bool {
        matches!(self, Self::Info | Self::Error)
    }

    /// Returns the type's wire byte as a `char`.
    #[inline]
    #[must_use]
    pub fn as_char(self) -> char {
        char::from(u8::from(self))
    }
}

impl TryFrom<u8> for ItemType {
    type Error = ProtocolError;

    /// Parses a [`u8`] as a Gopher [`ItemType`].
    ///
    /// # Errors
    /// Returns an error if the byte is not part of the item type alphabet.
    #[inline]
    // `Self::Error` would be ambiguous with the `Error` item type
    fn try_from(v: u8) -> Result<Self, ProtocolError> {
        Self::from_repr(v).ok_or(ProtocolError::UnknownItemType(v))
    }
}

impl From<ItemType> for u8 {
    #[inline]
    fn from(v: ItemType) -> Self {
        v as Self
    }
}

impl fmt::Display for ItemType {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.as_char(), f)
    }
}


/// Classifies a file name into the [`ItemType`] used in menus.
///
/// Only the last dotted component is considered and matched
/// case-insensitively. Names without an extension and unknown extensions
/// map to [`ItemType::DEFAULT`].
#[must_use]
pub fn classify(name: &str) -> ItemType {
    use ItemType::*;
    let Some(idx) = name.rfind('.') else {
        return ItemType::DEFAULT;
    };
    // Dotfiles without a further extension have no extension at all
    if idx == 0 {
        return ItemType::DEFAULT;
    }

    match name[idx..].to_ascii_lowercase().as_str() {
        ".txt" | ".text" | ".md" | ".markdown" | ".rst" | ".org" | ".csv" | ".tsv" | ".log"
            | ".json" | ".xml" | ".yaml" | ".yml" | ".toml" | ".ini" | ".conf" | ".cfg"
            | ".c" | ".h" | ".cc" | ".cpp" | ".hpp" | ".rs" | ".go" | ".py" | ".rb" | ".pl"
            | ".lua" | ".js" | ".ts" | ".java" | ".kt" | ".hs" | ".ml" | ".fs" | ".s" | ".asm"
            | ".sh" | ".bash" | ".zsh" | ".fish" | ".tex" | ".bib" | ".css" | ".patch"
            | ".diff" | ".gmi" | ".nfo" | ".asc" => File,

        ".html" | ".htm" | ".xhtml" => Html,

        ".gif" => Gif,
        ".png" => Png,
        ".jpg" | ".jpeg" | ".bmp" | ".svg" | ".webp" | ".tif" | ".tiff" | ".ico" | ".xpm"
            | ".pbm" | ".pgm" | ".ppm" => Image,

        ".mp3" | ".wav" | ".ogg" | ".oga" | ".opus" | ".flac" | ".aac" | ".m4a" | ".mid"
            | ".midi" | ".mod" | ".xm" | ".s3m" | ".it" => Audio,

        ".mp4" | ".m4v" | ".mkv" | ".webm" | ".avi" | ".mov" | ".mpg" | ".mpeg" | ".ogv"
            | ".wmv" | ".flv" => Video,

        ".pdf" | ".ps" | ".eps" | ".doc" | ".docx" | ".odt" | ".ods" | ".odp" | ".rtf"
            | ".xls" | ".xlsx" | ".ppt" | ".pptx" | ".epub" | ".djvu" => Document,

        ".gz" | ".tgz" | ".tar" | ".zip" | ".xz" | ".txz" | ".bz2" | ".tbz" | ".7z" | ".rar"
            | ".zst" | ".lz" | ".lzma" | ".z" | ".cpio" | ".arj" | ".lha" => Archive,

        ".hqx" => BinHex,
        ".uu" | ".uue" => Uuencoded,
        ".mbox" | ".eml" | ".mime" => Mime,
        ".ics" | ".ical" | ".vcs" => Calendar,

        _ => ItemType::DEFAULT,
    }
}


#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;
    use super::*;

    #[test]
    fn roundtrip() -> Result<(), ProtocolError> {
        for item in ItemType::iter() {
            assert_eq!(ItemType::try_from(u8::from(item))?, item);
        }
        Ok(())
    }

    #[test]
    fn alphabet() {
        const WIRE: &[u8] = b"0123456789TgI+.ihspdM;c!#-=*$";
        for &b in WIRE {
            let item = ItemType::try_from(b).unwrap_or_else(|e| panic!("{e}"));
            assert!(!item.is_sentinel(), "{item} is a sentinel");
        }
        for b in [b'z', b'@', b'?'] {
            assert!(ItemType::try_from(b).is_ok_and(ItemType::is_sentinel));
        }
    }

    #[test]
    fn unknown_byte() {
        for b in [b'x', b'\t', 0, 0xff] {
            assert!(matches!(ItemType::try_from(b), Err(ProtocolError::UnknownItemType(v)) if v == b));
        }
    }

    #[test]
    fn classify_known() {
        assert_eq!(classify("a.txt"), ItemType::File);
        assert_eq!(classify("b.jpg"), ItemType::Image);
        assert_eq!(classify("B.JPG"), ItemType::Image);
        assert_eq!(classify("anim.gif"), ItemType::Gif);
        assert_eq!(classify("index.html"), ItemType::Html);
        assert_eq!(classify("song.flac"), ItemType::Audio);
        assert_eq!(classify("clip.webm"), ItemType::Video);
        assert_eq!(classify("paper.pdf"), ItemType::Document);
        assert_eq!(classify("release.tar.gz"), ItemType::Archive);
        assert_eq!(classify("inbox.mbox"), ItemType::Mime);
    }

    #[test]
    fn classify_default() {
        assert_eq!(classify("c"), ItemType::DEFAULT);
        assert_eq!(classify(".profile"), ItemType::DEFAULT);
        assert_eq!(classify("trailing."), ItemType::DEFAULT);
        assert_eq!(classify("weird.ext"), ItemType::DEFAULT);
        assert_eq!(classify(""), ItemType::DEFAULT);
    }

    #[test]
    fn classify_total() {
        // Any string must classify without panicking, including non-ASCII names
        for _ in 0..200 {
            let len = fastrand::usize(..16);
            let name: String = std::iter::repeat_with(|| fastrand::char(..)).take(len).collect();
            let _ = classify(&name);
        }
        assert_eq!(classify("übersicht.TXT"), ItemType::File);
    }
}
