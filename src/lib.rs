// TODO(docs): #![deny(missing_docs)]
#![deny(unsafe_code, single_use_lifetimes, unused_lifetimes)]
#![warn(keyword_idents, let_underscore_drop, unreachable_pub, unused_import_braces)]

#![deny(clippy::suspicious, clippy::cargo)]
#![deny(clippy::exit, clippy::semicolon_inside_block, clippy::unwrap_used)]
#![warn(clippy::pedantic, clippy::multiple_crate_versions)]
#![allow(clippy::enum_glob_use, clippy::items_after_statements, clippy::module_name_repetitions)]


mod macros;
/// Helpful extension traits shared across the crate.
pub(crate) mod ext;

mod error;
pub use error::{status_text, Error};

/// Gopher wire format, based on RFC 1436 and common server conventions.
pub mod protocol;

/// Confinement of selectors to the server root.
pub mod path;
/// Regular-expression lists of restricted files and commands.
pub mod restrict;

pub mod config;
pub use config::Config;

/// Environment and execution of CGI scripts.
pub mod cgi;

/// Cached, rendered and generated file contents.
pub mod contents;
pub mod cache;
pub mod response;
/// Generated `caps.txt` and `robots.txt`.
pub mod policy;

/// Connection handling.
pub mod server;


/// Name and version reported to clients and scripts.
pub const SERVER_SOFTWARE: &str = cgi::SOFTWARE;

/// Target of the per-request access log events.
pub const ACCESS_TARGET: &str = "access";
