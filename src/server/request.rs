use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use compact_str::CompactString;
use smallvec::SmallVec;

use crate::path::RequestPath;
use crate::protocol::Selector;


/// Parameters handed to a script: the query string for CGI requests.
pub type Parameters = SmallVec<[CompactString; 1]>;


/// A single Gopher request after sanitisation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Address of the requesting client.
    pub client: IpAddr,
    /// The requested path, confined to the server root.
    pub path: RequestPath,
    /// The query string following the first `?`, if the selector had one.
    pub parameters: Parameters,
}

impl Request {
    /// Builds a request for `selector` under `root`.
    #[must_use]
    pub fn new(root: &Arc<Path>, client: IpAddr, selector: &Selector) -> Self {
        let (path, query) = selector.split_query();
        let parameters = query.map(CompactString::from).into_iter().collect();
        Self { client, path: RequestPath::resolve(root, path), parameters }
    }

    /// Returns the query string, without the `?`.
    #[inline]
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.parameters.first().map(CompactString::as_str)
    }
}
