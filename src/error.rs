use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use http::StatusCode;


/// Errors raised while serving a single Gopher request.
///
/// Every variant belongs to one of four kinds: filesystem, network, parsing,
/// and execution. Causes are kept for logging only. The wire response never
/// shows more than the status string from `Error::status`, so no filesystem
/// details leak to clients.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    // Filesystem
    /// A path could not be derived from the request or a gophermap line.
    #[error("failed to enumerate path")]
    PathEnumeration,
    /// The request named a restricted or otherwise forbidden path.
    #[error("illegal path requested")]
    IllegalPath,
    /// `stat` failed and no generated file exists under that path.
    #[error("failed to stat file")]
    FileStat(#[source] io::Error),
    #[error("failed to open file")]
    FileOpen(#[source] io::Error),
    #[error("failed to read file")]
    FileRead(#[source] io::Error),
    /// The path exists but is neither a regular file nor a directory.
    #[error("unsupported file type")]
    FileType,
    #[error("failed to list directory")]
    DirList(#[source] io::Error),

    // Network
    #[error("failed to read from socket")]
    SocketRead(#[source] io::Error),
    /// The client sent more than the read budget without a line terminator.
    #[error("request exceeds {0} bytes")]
    RequestTooLong(usize),
    #[error("failed to write to socket")]
    SocketWrite(#[source] io::Error),
    /// The socket stopped accepting bytes before the response was complete.
    #[error("socket accepted {written} of {expected} bytes")]
    SocketWriteCount { written: u64, expected: u64 },

    // Parsing
    #[error("invalid request")]
    InvalidRequest,
    /// A menu line was requested for an item type that cannot go on the wire.
    #[error("item type {0:?} cannot be sent to clients")]
    EmptyItemType(char),
    #[error("invalid gophermap: {0}")]
    InvalidGophermap(&'static str),

    // Execution
    /// Reading a child's standard output failed.
    #[error("failed to read command output")]
    BufferRead(#[source] io::Error),
    #[error("failed to start command")]
    CommandStart(#[source] io::Error),
    #[error("command exited unsuccessfully: {0}")]
    CommandExitCode(ExitStatus),
    #[error("command {0:?} is restricted")]
    RestrictedCommand(PathBuf),
    /// Signalling a timed-out child's process group failed.
    #[error("failed to signal process group")]
    ProcessGroup(#[source] io::Error),
}

impl Error {
    /// Maps the error to the status reported to the client.
    ///
    /// Returns [`None`] for errors after which no reply can or should be
    /// attempted, such as a broken socket.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        use Error::*;
        Some(match self {
            PathEnumeration | InvalidRequest => StatusCode::BAD_REQUEST,
            IllegalPath => StatusCode::FORBIDDEN,
            FileStat(_) | FileOpen(_) | FileRead(_) | FileType | DirList(_) => {
                StatusCode::NOT_FOUND
            },
            EmptyItemType(_) | InvalidGophermap(_) | BufferRead(_) | CommandStart(_)
                | CommandExitCode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            SocketRead(_) | RequestTooLong(_) | SocketWrite(_) | SocketWriteCount { .. } => {
                return None;
            },
            RestrictedCommand(_) | ProcessGroup(_) => StatusCode::SERVICE_UNAVAILABLE,
        })
    }

    /// Wraps a failed socket write, distinguishing short writes.
    #[must_use]
    pub(crate) fn from_write(e: io::Error, written: u64, expected: u64) -> Self {
        if e.kind() == io::ErrorKind::WriteZero {
            Self::SocketWriteCount { written, expected }
        } else {
            Self::SocketWrite(e)
        }
    }
}


/// Formats a [`StatusCode`] the way it appears in Gopher error lines,
/// for example `404 Not Found`.
#[must_use]
pub fn status_text(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {reason}", status.as_str()),
        None => status.as_str().to_owned(),
    }
}
