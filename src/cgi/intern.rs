use std::fmt;


/// A statically-allocated CGI/1.1 variable name.
///
/// These are the variables every CGI script and gophermap command receives.
/// There is no `PATH_INFO`, since Gopher selectors carry no extra path
/// segments after a script name.
#[allow(missing_docs, non_camel_case_types, clippy::upper_case_acronyms)]
#[derive(Clone, Copy, PartialEq, Eq, strum::IntoStaticStr)]
#[cfg_attr(test, derive(strum::EnumIter))]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum StaticVarName {
    // From RFC 3875, Section 4.1 (CGI/1.1)
    GATEWAY_INTERFACE,
    SERVER_SOFTWARE,
    SERVER_PROTOCOL,
    SERVER_NAME,
    SERVER_PORT,
    REQUEST_METHOD,
    CONTENT_LENGTH,
    QUERY_STRING,
    REMOTE_ADDR,
    SCRIPT_NAME,

    // From Apache's variables
    SCRIPT_FILENAME,
    DOCUMENT_ROOT,
    REQUEST_URI,

    // Process environment
    PATH,
    COLUMNS,

    // Gopher specific
    GOPHER_CHARSET,
    SELECTOR,
}

impl fmt::Debug for StaticVarName {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(<&str>::from(self), f)
    }
}

impl fmt::Display for StaticVarName {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(<&str>::from(self), f)
    }
}
