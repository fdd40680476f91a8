use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;

use compact_str::{CompactString, ToCompactString};

use super::listing::{self, Hidden};
use super::read_file;
use crate::config::{Config, Host, GOPHERMAP};
use crate::ext::{ByteLines, BytesVec};
use crate::macros::trace;
use crate::path::RequestPath;
use crate::protocol::{line, ItemType};
use crate::response::{ExecJob, Response};
use crate::Error;


const INLINE_UNSUPPORTED: &str = "[inline commands are not supported]";


/// A parsed piece of a gophermap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    /// Finished menu lines. `$hostname` and `$port` are substituted when
    /// rendering.
    Text(Vec<u8>),
    /// A listing of `path`, generated when rendering.
    DirListing { path: RequestPath, hidden: Hidden },
    /// An included gophermap, parsed along with its parent.
    SubGophermap { path: RequestPath, sections: Vec<Section> },
    /// A command whose output is spliced in when sending.
    Exec(ExecJob),
}


/// A directory menu written by hand.
///
/// Each line's first byte selects how it is treated:
///
/// | Line | Meaning |
/// |---|---|
/// | empty | blank info line |
/// | `#…` | comment |
/// | `!…` | title, only the first one counts |
/// | `-name` | hide `name` from a trailing listing |
/// | `=target args…` | include a gophermap, run a command or reflow a file |
/// | `$…` | inline command, unsupported |
/// | `.` | end of the menu |
/// | `*` | end of the menu, followed by a listing of the directory |
///
/// Lines containing a tab are menu lines and kept as they are, as are lines
/// starting with `i` or `3`. Anything else becomes an info line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gophermap {
    sections: Vec<Section>,
}

impl Gophermap {
    /// Reads and parses the gophermap at `path`.
    ///
    /// # Errors
    /// Returns an error if the file or any file it includes cannot be read.
    pub fn load(path: &RequestPath, config: &Config) -> Result<Self, Error> {
        let data = read_file(path.abs())?;
        Self::parse(path, &data, config)
    }

    /// Parses gophermap text located at `path`.
    ///
    /// # Errors
    /// Returns an error if an included file cannot be read or an include
    /// line names no target.
    pub fn parse(path: &RequestPath, data: &[u8], config: &Config) -> Result<Self, Error> {
        let mut parser = Parser { config, stack: vec![path.abs().to_path_buf()] };
        Ok(Self { sections: parser.parse(path, data)? })
    }

    #[inline]
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Renders the menu into `resp`, including its last line. Directory
    /// menus get the configured footer before the last line.
    ///
    /// # Errors
    /// Returns [`Error::DirList`] if a listing cannot be generated.
    pub fn render(&self, config: &Config, resp: &mut Response, dir: bool) -> Result<(), Error> {
        render_sections(&self.sections, config, resp)?;
        let out = resp.bytes_mut();
        if dir {
            out.put(&config.footer);
        }
        line::last_line(out);
        Ok(())
    }
}


struct Parser<'a> {
    config: &'a Config,
    // Every gophermap currently being parsed, outermost first
    stack: Vec<PathBuf>,
}

impl Parser<'_> {
    fn parse(&mut self, path: &RequestPath, data: &[u8]) -> Result<Vec<Section>, Error> {
        let width = self.config.page_width;
        let mut sections = Vec::new();
        let mut text = Vec::new();
        let mut hidden = Hidden::new();
        let mut titled = false;

        for raw in data.split_lines() {
            let Some((&first, rest)) = raw.split_first() else {
                line::info_line(&mut text, "", width);
                continue;
            };
            match first {
                b'#' => {},
                b'!' => {
                    if !titled {
                        titled = true;
                        line::title_line(&mut text, &String::from_utf8_lossy(rest), width);
                    }
                },
                b'-' => {
                    let name = String::from_utf8_lossy(rest);
                    if let Some(base) = name.trim().rsplit('/').next().filter(|b| !b.is_empty()) {
                        hidden.insert(base.into());
                    }
                },
                b'=' => self.include(path, rest, &mut text, &mut sections)?,
                b'$' => line::info_line(&mut text, INLINE_UNSUPPORTED, width),
                b'.' if rest.is_empty() => break,
                b'*' if rest.is_empty() => {
                    flush(&mut text, &mut sections);
                    sections.push(Section::DirListing { path: path.parent(), hidden });
                    return Ok(sections);
                },
                _ if is_menu_line(first, raw) => verbatim(&mut text, raw),
                _ => line::info_line(&mut text, &String::from_utf8_lossy(raw), width),
            }
        }

        flush(&mut text, &mut sections);
        Ok(sections)
    }

    fn include(
        &mut self,
        from: &RequestPath,
        directive: &[u8],
        text: &mut Vec<u8>,
        sections: &mut Vec<Section>,
    ) -> Result<(), Error> {
        let directive = String::from_utf8_lossy(directive);
        let mut words = directive.split_whitespace();
        let target = words.next().ok_or(Error::InvalidGophermap("include without a target"))?;
        let path = from.sibling(target);

        if path.file_name().is_some_and(|n| n.ends_with(GOPHERMAP)) {
            if self.stack.iter().any(|p| p == path.abs()) {
                trace!(include = %path, "skipping recursive gophermap include");
                return Ok(());
            }
            let data = read_file(path.abs())?;
            flush(text, sections);
            self.stack.push(path.abs().to_path_buf());
            let nested = self.parse(&path, &data);
            self.stack.pop();
            sections.push(Section::SubGophermap { path, sections: nested? });
            return Ok(());
        }

        let meta = fs::metadata(path.abs()).map_err(Error::FileStat)?;
        if meta.is_dir() {
            return Err(Error::InvalidGophermap("include target is a directory"));
        }
        if self.config.cgi && meta.is_file() && meta.permissions().mode() & 0o111 != 0 {
            flush(text, sections);
            let args = words.map(CompactString::from).collect();
            sections.push(Section::Exec(ExecJob { path, args }));
            return Ok(());
        }

        let data = read_file(path.abs())?;
        line::reflow(text, &data, self.config.page_width);
        Ok(())
    }
}

fn is_menu_line(first: u8, raw: &[u8]) -> bool {
    ItemType::from_repr(first).is_some_and(ItemType::is_info_like) || raw.find_byte(b'\t').is_some()
}

fn verbatim(text: &mut Vec<u8>, raw: &[u8]) {
    text.put(raw);
    text.put(line::CRLF);
}

fn flush(text: &mut Vec<u8>, sections: &mut Vec<Section>) {
    if !text.is_empty() {
        sections.push(Section::Text(std::mem::take(text)));
    }
}


fn render_sections(sections: &[Section], config: &Config, resp: &mut Response) -> Result<(), Error> {
    for section in sections {
        match section {
            Section::Text(t) => substitute(resp.bytes_mut(), t, &config.host),
            Section::DirListing { path, hidden } => {
                listing::render(resp.bytes_mut(), path, hidden, config)?;
            },
            Section::SubGophermap { sections, .. } => render_sections(sections, config, resp)?,
            Section::Exec(job) => resp.push_exec(job.clone()),
        }
    }
    Ok(())
}

/// Copies `text` into `out`, replacing `$hostname` and `$port`.
fn substitute(out: &mut Vec<u8>, text: &[u8], host: &Host) {
    let mut rest = text;
    while let Some(i) = rest.find_byte(b'$') {
        out.put(&rest[..i]);
        let tail = &rest[i..];
        if let Some(t) = tail.strip_prefix(b"$hostname") {
            out.put_str(&host.name);
            rest = t;
        } else if let Some(t) = tail.strip_prefix(b"$port") {
            out.put_str(&host.port.to_compact_string());
            rest = t;
        } else {
            out.put(b"$");
            rest = &tail[1..];
        }
    }
    out.put(rest);
}
