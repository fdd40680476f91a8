use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use compact_str::CompactString;

use crate::protocol::{line, DEFAULT_PORT};
use crate::restrict::Restrictions;


/// File name of gophermaps; a file with exactly this name replaces the
/// default listing of its directory.
pub const GOPHERMAP: &str = "gophermap";
/// Root-level directory whose files are run as CGI scripts.
pub const CGI_DIR: &str = "cgi-bin";

pub const DEFAULT_PAGE_WIDTH: usize = 80;
pub const DEFAULT_CACHE_SIZE: usize = 100;
pub const DEFAULT_CACHE_FILE_MAX: u64 = 1024 * 1024;
pub const DEFAULT_MONITOR_PERIOD: Duration = Duration::from_secs(60);
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_millis(2500);


/// The identity under which the server appears in menus.
#[derive(Debug, Clone)]
pub struct Host {
    /// Host name written into menu lines.
    pub name: CompactString,
    /// Port written into menu lines.
    pub port: u16,
    /// Canonical document root; the sanitisation trust boundary.
    pub root: Arc<Path>,
}


bitflags::bitflags! {
    /// Optional fields in log output, selected with `--log-opts`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LogOptions: u8 {
        /// Prefix log lines with a timestamp.
        const TIMESTAMP = 0x01;
        /// Record client addresses in the access log.
        const IP = 0x02;
    }
}

impl Default for LogOptions {
    #[inline]
    fn default() -> Self {
        Self::all()
    }
}

impl LogOptions {
    /// Parses a comma-separated list of option names, such as
    /// `timestamp,ip`. Names are case-insensitive; an empty list disables
    /// all options.
    ///
    /// # Errors
    /// Returns the first unknown option name.
    pub fn parse_list(list: &str) -> Result<Self, String> {
        let mut opts = Self::empty();
        for name in list.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            match Self::from_name(&name.to_ascii_uppercase()) {
                Some(f) => opts.insert(f),
                None => return Err(name.to_owned()),
            }
        }
        Ok(opts)
    }
}


/// Text published in the generated `caps.txt`.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    pub description: CompactString,
    pub admin_email: CompactString,
    pub geolocation: CompactString,
}


/// Process-wide server configuration, shared read-only by every request.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: Host,
    /// Menu width used for name truncation and text reflow.
    pub page_width: usize,
    /// Pre-rendered info lines appended to every directory menu.
    pub footer: Vec<u8>,
    /// Character set announced to clients and CGI scripts.
    pub charset: CompactString,
    /// File name patterns hidden from listings and refused on request.
    pub restrict_files: Option<Restrictions>,
    /// Command path patterns that may never be executed.
    pub restrict_commands: Option<Restrictions>,
    /// Whether CGI scripts and gophermap commands may run.
    pub cgi: bool,
    /// Maximum number of cached files.
    pub cache_size: usize,
    /// Files larger than this many bytes bypass the cache.
    pub cache_file_max: u64,
    /// Period of the cache freshness check.
    pub monitor_period: Duration,
    /// Wall-clock limit for every child process.
    pub exec_timeout: Duration,
    pub log_opts: LogOptions,
    pub info: ServerInfo,
}

impl Config {
    /// Creates a [`Config`] with default settings serving `root` under the
    /// host name `hostname`.
    ///
    /// `root` is used as given; callers are expected to canonicalise it.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, hostname: &str) -> Self {
        let root: PathBuf = root.into();
        Self {
            host: Host { name: hostname.into(), port: DEFAULT_PORT, root: root.into() },
            page_width: DEFAULT_PAGE_WIDTH,
            footer: Vec::new(),
            charset: CompactString::const_new("utf-8"),
            restrict_files: None,
            restrict_commands: None,
            cgi: true,
            cache_size: DEFAULT_CACHE_SIZE,
            cache_file_max: DEFAULT_CACHE_FILE_MAX,
            monitor_period: DEFAULT_MONITOR_PERIOD,
            exec_timeout: DEFAULT_EXEC_TIMEOUT,
            log_opts: LogOptions::default(),
            info: ServerInfo::default(),
        }
    }

    /// Shrinks the cache so that no file stays cached.
    pub fn disable_cache(&mut self) {
        self.cache_size = 2;
        self.cache_file_max = 0;
    }

    /// Renders `text` into the footer appended to directory menus.
    ///
    /// With `separator`, a line of underscores spanning the page width
    /// precedes the text.
    pub fn set_footer(&mut self, text: &str, separator: bool) {
        self.footer.clear();
        if text.is_empty() {
            return;
        }
        if separator {
            line::info_line(&mut self.footer, &"_".repeat(self.page_width), self.page_width);
        }
        // Footer text may use "\n" escapes on the command line
        let text = text.replace("\\n", "\n");
        line::reflow(&mut self.footer, text.as_bytes(), self.page_width);
    }

    /// Tests whether files with this name are hidden and refused.
    #[inline]
    #[must_use]
    pub fn is_restricted_file(&self, name: &str) -> bool {
        crate::restrict::is_restricted(self.restrict_files.as_ref(), name)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_opts() {
        assert_eq!(LogOptions::parse_list("timestamp,ip"), Ok(LogOptions::all()));
        assert_eq!(LogOptions::parse_list(" IP "), Ok(LogOptions::IP));
        assert_eq!(LogOptions::parse_list(""), Ok(LogOptions::empty()));
        assert_eq!(LogOptions::parse_list("ip,colour"), Err("colour".to_owned()));
    }

    #[test]
    fn no_flag_overlap() {
        let mut seen = LogOptions::empty();
        for f in LogOptions::all() {
            assert!(!seen.intersects(f));
            seen.insert(f);
        }
    }

    #[test]
    fn disable_cache() {
        let mut config = Config::new("/srv", "localhost");
        config.disable_cache();
        assert_eq!(config.cache_size, 2);
        assert_eq!(config.cache_file_max, 0);
    }

    #[test]
    fn footer() {
        let mut config = Config::new("/srv", "localhost");
        config.page_width = 10;
        config.set_footer("served by\\nburrow", true);
        assert_eq!(
            config.footer,
            b"i__________\t-\tnull.host\t1\r\n\
              iserved by\t-\tnull.host\t1\r\n\
              iburrow\t-\tnull.host\t1\r\n",
        );

        config.set_footer("", true);
        assert!(config.footer.is_empty());
    }
}
