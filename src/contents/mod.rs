use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::Arc;

use crate::config::{Config, GOPHERMAP};
use crate::path::RequestPath;
use crate::response::Response;
use crate::Error;

/// Hand-written directory menus.
pub mod gophermap;
/// Generated directory menus.
pub mod listing;

pub use gophermap::{Gophermap, Section};


const READ_CHUNK: usize = 16 * 1024;


/// The contents of a cached file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContents {
    /// A file sent exactly as stored on disk.
    Regular(Arc<[u8]>),
    /// A parsed gophermap, rendered as a menu.
    Gophermap(Gophermap),
    /// Server-generated bytes with no file behind them.
    Generated(Arc<[u8]>),
}

impl FileContents {
    /// Creates empty contents of the right kind for `path`. Files named
    /// exactly like gophermaps are parsed, everything else is sent as is.
    #[must_use]
    pub fn for_path(path: &RequestPath) -> Self {
        if path.file_name() == Some(GOPHERMAP) {
            Self::Gophermap(Gophermap::default())
        } else {
            Self::Regular(Arc::<[u8]>::from(&[][..]))
        }
    }

    /// Wraps bytes generated by the server.
    #[inline]
    #[must_use]
    pub fn generated(data: impl Into<Arc<[u8]>>) -> Self {
        Self::Generated(data.into())
    }

    #[inline]
    #[must_use]
    pub fn is_generated(&self) -> bool {
        matches!(self, Self::Generated(_))
    }

    /// (Re)loads the contents from the file at `path`. Generated contents
    /// are left untouched.
    ///
    /// # Errors
    /// Returns an error if the file (or, for gophermaps, any included file)
    /// cannot be read. The previous contents are kept in that case.
    pub fn load(&mut self, path: &RequestPath, config: &Config) -> Result<(), Error> {
        match self {
            Self::Regular(data) => *data = read_file(path.abs())?.into(),
            Self::Gophermap(map) => *map = Gophermap::load(path, config)?,
            Self::Generated(_) => {},
        }
        Ok(())
    }

    /// Renders the contents into `resp`. `dir` is set when a gophermap is
    /// served in place of its directory.
    ///
    /// # Errors
    /// Returns an error if a gophermap listing cannot be generated.
    pub fn render(&self, config: &Config, resp: &mut Response, dir: bool) -> Result<(), Error> {
        match self {
            Self::Regular(data) | Self::Generated(data) => resp.push_shared(data.clone()),
            Self::Gophermap(map) => map.render(config, resp, dir)?,
        }
        Ok(())
    }

    /// Drops loaded data, keeping the kind. Generated contents are never
    /// cleared.
    pub fn clear(&mut self) {
        match self {
            Self::Regular(data) => *data = Arc::<[u8]>::from(&[][..]),
            Self::Gophermap(map) => *map = Gophermap::default(),
            Self::Generated(_) => {},
        }
    }
}


/// Reads a whole file in buffered chunks.
pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>, Error> {
    let file = File::open(path).map_err(Error::FileOpen)?;
    let mut data = Vec::new();
    BufReader::with_capacity(READ_CHUNK, file).read_to_end(&mut data).map_err(Error::FileRead)?;
    Ok(data)
}
