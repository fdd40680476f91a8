use std::fmt::Write;

use crate::cache::FileCache;
use crate::config::Config;


/// Name of the capabilities file read by Gopher clients.
pub const CAPS_TXT: &str = "caps.txt";
/// Name of the crawler policy file.
pub const ROBOTS_TXT: &str = "robots.txt";

/// Seconds crawlers are asked to wait between requests.
pub const CRAWL_DELAY: u32 = 5;


/// Renders the `caps.txt` describing this server.
#[must_use]
pub fn caps_txt(config: &Config) -> String {
    let info = &config.info;
    let mut out = String::from(concat!(
        "CAPS\n\n",
        "CapsVersion=1\n",
        "ExpireCapsAfter=1800\n\n",
        "PathDelimeter=/\n",
        "PathIdentity=.\n",
        "PathParent=..\n",
        "PathParentDouble=FALSE\n",
        "PathEscapeCharacter=\\\n",
        "PathKeepPreDelimeter=FALSE\n\n",
    ));
    // Writing into a String cannot fail
    let _ = writeln!(out, "ServerSoftware={}", env!("CARGO_PKG_NAME"));
    let _ = writeln!(out, "ServerSoftwareVersion={}", env!("CARGO_PKG_VERSION"));
    let _ = writeln!(out, "ServerDescription={}", info.description);
    let _ = writeln!(out, "ServerGeolocationString={}", info.geolocation);
    let _ = writeln!(out, "ServerDefaultEncoding={}", config.charset);
    let _ = writeln!(out, "ServerAdmin={}", info.admin_email);
    let _ = writeln!(out, "ServerPageWidth={}", config.page_width);
    out
}

/// Renders the `robots.txt` admitting every crawler.
#[must_use]
pub fn robots_txt() -> String {
    format!("User-agent: *\nDisallow:\nCrawl-delay: {CRAWL_DELAY}\n")
}


/// Registers the generated policy files with `cache`, skipping any that
/// exist on disk. Returns the names of the files that were generated.
pub fn install(cache: &FileCache, config: &Config) -> Vec<&'static str> {
    let mut installed = Vec::new();
    for (name, text) in [(CAPS_TXT, caps_txt(config)), (ROBOTS_TXT, robots_txt())] {
        let path = config.host.root.join(name);
        if path.symlink_metadata().is_ok() {
            tracing::debug!(?path, "keeping policy file from disk");
            continue;
        }
        cache.insert_generated(path, text.into_bytes());
        installed.push(name);
    }
    installed
}
