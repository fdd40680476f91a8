use compact_str::{CompactString, ToCompactString};

use crate::config::Config;
use crate::path::RequestPath;
use crate::server::Request;

/// Bounded-time execution of CGI scripts and gophermap commands.
pub mod exec;
mod intern;

pub use intern::StaticVarName;
pub use StaticVarName::*;


/// Value of `SERVER_SOFTWARE`.
pub const SOFTWARE: &str = concat!("burrow/", env!("CARGO_PKG_VERSION"));
/// Value of `PATH`; children never inherit the server's own search path.
pub const SAFE_PATH: &str = "/usr/bin:/bin";


/// The complete environment handed to a child process.
///
/// The server's own environment is never inherited. Every variable listed in
/// [`StaticVarName`] is always present, even if its value is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Env {
    vars: Vec<(StaticVarName, CompactString)>,
}

impl Env {
    /// Builds the CGI/1.1 environment for running `script` on behalf of
    /// `req`.
    ///
    /// For CGI requests `script` is the requested path itself. Gophermap
    /// commands pass the command's own path, while `SELECTOR` and
    /// `REQUEST_URI` keep describing what the client asked for.
    #[must_use]
    pub fn new(config: &Config, req: &Request, script: &RequestPath) -> Self {
        let selector = req.path.selector();
        let query = req.query().unwrap_or_default();
        let request_uri = match req.query() {
            Some(q) => {
                let mut uri = selector.clone();
                uri.push('?');
                uri.push_str(q);
                uri
            },
            None => selector.clone(),
        };

        let vars = vec![
            (GATEWAY_INTERFACE, CompactString::const_new("CGI/1.1")),
            (SERVER_SOFTWARE, CompactString::const_new(SOFTWARE)),
            (SERVER_PROTOCOL, CompactString::const_new("RFC1436")),
            (CONTENT_LENGTH, CompactString::const_new("0")),
            (REQUEST_METHOD, CompactString::const_new("GET")),
            (PATH, CompactString::const_new(SAFE_PATH)),
            (COLUMNS, config.page_width.to_compact_string()),
            (GOPHER_CHARSET, config.charset.clone()),
            (SERVER_NAME, config.host.name.clone()),
            (SERVER_PORT, config.host.port.to_compact_string()),
            (REMOTE_ADDR, req.client.to_compact_string()),
            (QUERY_STRING, query.into()),
            (SCRIPT_NAME, script.selector()),
            (SCRIPT_FILENAME, script.abs().to_string_lossy().into()),
            (SELECTOR, selector),
            (DOCUMENT_ROOT, config.host.root.to_string_lossy().into()),
            (REQUEST_URI, request_uri),
        ];
        Self { vars }
    }

    /// Retrieves the value stored for the variable name, if there is one.
    #[must_use]
    pub fn get(&self, name: StaticVarName) -> Option<&str> {
        self.vars.iter().find(|(n, _)| *n == name).map(|(_, v)| v.as_str())
    }

    /// Returns the number of variables in this environment.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Returns an iterator over all variables.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&'static str, &str)> + '_ {
        self.vars.iter().map(|(n, v)| (<&'static str>::from(*n), v.as_str()))
    }
}


#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::path::Path;
    use std::sync::Arc;

    use strum::IntoEnumIterator;
    use super::*;

    fn config() -> Config {
        Config::new("/srv/gopher", "gopher.example")
    }

    fn request(config: &Config, selector: &str) -> Request {
        let client = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 7));
        Request::new(&config.host.root, client, selector.into())
    }

    #[test]
    fn cgi_vars() {
        let config = config();
        let req = request(&config, "/cgi-bin/hi?a=1&b=2");
        let env = Env::new(&config, &req, &req.path);

        assert_eq!(env.get(GATEWAY_INTERFACE), Some("CGI/1.1"));
        assert_eq!(env.get(SERVER_PROTOCOL), Some("RFC1436"));
        assert_eq!(env.get(PATH), Some("/usr/bin:/bin"));
        assert_eq!(env.get(SERVER_NAME), Some("gopher.example"));
        assert_eq!(env.get(SERVER_PORT), Some("70"));
        assert_eq!(env.get(COLUMNS), Some("80"));
        assert_eq!(env.get(REMOTE_ADDR), Some("192.0.2.7"));
        assert_eq!(env.get(QUERY_STRING), Some("a=1&b=2"));
        assert_eq!(env.get(SCRIPT_NAME), Some("/cgi-bin/hi"));
        assert_eq!(env.get(SCRIPT_FILENAME), Some("/srv/gopher/cgi-bin/hi"));
        assert_eq!(env.get(SELECTOR), Some("/cgi-bin/hi"));
        assert_eq!(env.get(DOCUMENT_ROOT), Some("/srv/gopher"));
        assert_eq!(env.get(REQUEST_URI), Some("/cgi-bin/hi?a=1&b=2"));
    }

    #[test]
    fn complete() {
        let config = config();
        let req = request(&config, "/x");
        let env = Env::new(&config, &req, &req.path);
        assert_eq!(env.len(), StaticVarName::iter().count());
        for var in StaticVarName::iter() {
            assert!(env.get(var).is_some(), "{var} missing");
        }
        assert!(env.iter().all(|(n, _)| n != "PATH_INFO"));
        assert_eq!(env.get(QUERY_STRING), Some(""));
        assert_eq!(env.get(REQUEST_URI), Some("/x"));
    }

    #[test]
    fn command_script() {
        let config = config();
        let req = request(&config, "/dir");
        let root: Arc<Path> = config.host.root.clone();
        let script = RequestPath::resolve(&root, "/dir/run.sh");
        let env = Env::new(&config, &req, &script);
        assert_eq!(env.get(SCRIPT_NAME), Some("/dir/run.sh"));
        assert_eq!(env.get(SELECTOR), Some("/dir"));
    }
}
