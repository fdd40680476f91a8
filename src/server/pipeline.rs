use std::fs;
use std::net::IpAddr;
use std::sync::Arc;

use http::StatusCode;
use smallvec::SmallVec;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{Request, Shared};
use crate::config::{LogOptions, CGI_DIR, GOPHERMAP};
use crate::contents::listing::{self, Hidden};
use crate::error::status_text;
use crate::ext::{ByteLines, BytesVec};
use crate::protocol::{line, redirect, Selector};
use crate::response::{ExecJob, Response};
use crate::Error;


/// Size of a single read from the client.
pub const READ_CHUNK: usize = 256;
/// Number of reads a request may take.
pub const MAX_CHUNKS: usize = 1;


/// Serves a single request on `stream` and closes it.
///
/// Errors are reported to the client as a type-3 line where possible and
/// logged. Every request produces one event with the target `access`.
pub async fn serve<S>(stream: &mut S, client: IpAddr, shared: Arc<Shared>)
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    let mut selector = None;
    let res = handle(stream, client, &shared, &mut selector).await;

    let (status, written) = match res {
        Ok(n) => (Some(StatusCode::OK), n),
        Err(e) => {
            let status = e.status();
            log_failure(&e, status);
            let written = match status {
                Some(s) => reply_error(stream, s).await,
                None => 0,
            };
            (status, written)
        },
    };

    let ip = shared.config.log_opts.contains(LogOptions::IP).then_some(client);
    tracing::info!(
        target: crate::ACCESS_TARGET,
        client = ip.map(tracing::field::display),
        selector = selector.as_deref().unwrap_or("-"),
        status = status.map(|s| s.as_u16()),
        bytes = written,
        "served",
    );

    if let Err(e) = stream.shutdown().await {
        let error: &dyn std::error::Error = &e;
        tracing::debug!(error, "failed to close connection");
    }
}

fn log_failure(e: &Error, status: Option<StatusCode>) {
    let error: &dyn std::error::Error = e;
    match status {
        Some(s) if s.is_server_error() => tracing::error!(error, "request failed"),
        Some(_) => tracing::info!(error, "request refused"),
        None => tracing::debug!(error, "connection failed"),
    }
}

async fn handle<S>(
    stream: &mut S,
    client: IpAddr,
    shared: &Arc<Shared>,
    selector_out: &mut Option<String>,
) -> Result<u64, Error>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    let raw = read_request(stream).await?;
    let selector = Selector::from_request(&raw).map_err(|_| Error::InvalidRequest)?;
    *selector_out = Some(selector.as_str().to_owned());

    if let Some(url) = selector.url() {
        let mut page = Vec::new();
        redirect::html_redirect(&mut page, url);
        return write_bytes(stream, &page).await;
    }

    let config = &shared.config;
    let req = Request::new(&config.host.root, client, selector);
    if req.path.file_name().is_some_and(|n| config.is_restricted_file(n)) {
        return Err(Error::IllegalPath);
    }
    tracing::debug!(path = %req.path, query = req.query(), "resolved request");

    let resp = {
        let (shared, req) = (shared.clone(), req.clone());
        tokio::task::spawn_blocking(move || respond(&shared, &req))
            .await
            .map_err(|e| Error::FileRead(e.into()))??
    };
    resp.send(stream, config, &req).await
}

/// Reads the request line, stopping at a line feed, at EOF or after a
/// short read.
async fn read_request<S>(stream: &mut S) -> Result<Vec<u8>, Error>
where
    S: AsyncRead + Unpin + ?Sized,
{
    let mut buf = Vec::with_capacity(READ_CHUNK);
    for _ in 0..MAX_CHUNKS {
        let start = buf.len();
        buf.resize(start + READ_CHUNK, 0);
        let n = stream.read(&mut buf[start..]).await.map_err(Error::SocketRead)?;
        buf.truncate(start + n);
        if n < READ_CHUNK || buf[start..].find_byte(b'\n').is_some() {
            return Ok(buf);
        }
    }
    Err(Error::RequestTooLong(READ_CHUNK * MAX_CHUNKS))
}

/// Builds the response for `req`. Runs on the blocking pool.
fn respond(shared: &Shared, req: &Request) -> Result<Response, Error> {
    let config = &shared.config;
    let meta = match fs::metadata(req.path.abs()) {
        Ok(m) => m,
        Err(e) => return shared.cache.lookup(&req.path, config).unwrap_or(Err(Error::FileStat(e))),
    };

    if meta.is_dir() {
        let map = req.path.join(GOPHERMAP);
        match fs::metadata(map.abs()) {
            Ok(m) if m.is_file() => return shared.cache.fetch(&map, &m, config, true),
            _ => {},
        }
        let mut resp = Response::new();
        let out = resp.bytes_mut();
        listing::render(out, &req.path, &Hidden::new(), config)?;
        out.put(&config.footer);
        line::last_line(out);
        return Ok(resp);
    }

    if meta.is_file() {
        if config.cgi && req.path.is_within(CGI_DIR) {
            let mut resp = Response::new();
            resp.push_exec(ExecJob { path: req.path.clone(), args: SmallVec::new() });
            return Ok(resp);
        }
        return shared.cache.fetch(&req.path, &meta, config, false);
    }
    Err(Error::FileType)
}

async fn write_bytes<S>(stream: &mut S, data: &[u8]) -> Result<u64, Error>
where
    S: AsyncWrite + Unpin + ?Sized,
{
    let expected = data.len() as u64;
    stream.write_all(data).await.map_err(|e| Error::from_write(e, 0, expected))?;
    stream.flush().await.map_err(Error::SocketWrite)?;
    Ok(expected)
}

async fn reply_error<S>(stream: &mut S, status: StatusCode) -> u64
where
    S: AsyncWrite + Unpin + ?Sized,
{
    let mut out = Vec::new();
    line::error_response(&mut out, &status_text(status));
    match write_bytes(stream, &out).await {
        Ok(n) => n,
        Err(e) => {
            let error: &dyn std::error::Error = &e;
            tracing::debug!(error, "failed to send error response");
            0
        },
    }
}


#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    use crate::config::Config;
    use crate::restrict::Restrictions;
    use super::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        config: Config,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().expect("tempdir should be created");
            let root = dir.path().canonicalize().expect("tempdir should canonicalize");
            for f in ["a.txt", "b.jpg", "c"] {
                fs::write(root.join(f), f).expect("file should be written");
            }
            fs::create_dir(root.join("sub")).expect("subdir should be created");
            Self { _dir: dir, config: Config::new(root, "localhost") }
        }

        fn write(&self, rel: &str, data: &str) {
            let path = self.config.host.root.join(rel);
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir).expect("dirs should be created");
            }
            fs::write(path, data).expect("file should be written");
        }

        fn script(&self, rel: &str, body: &str) {
            self.write(rel, &format!("#!/bin/sh\n{body}\n"));
            let path = self.config.host.root.join(rel);
            fs::set_permissions(path, fs::Permissions::from_mode(0o755))
                .expect("script should be made executable");
        }

        fn shared(&self) -> Arc<Shared> {
            Shared::new(self.config.clone())
        }
    }

    async fn request(shared: &Arc<Shared>, raw: &[u8]) -> String {
        let (mut client, mut server) = tokio::io::duplex(64 * 1024);
        let shared = shared.clone();
        let task = tokio::spawn(async move {
            serve(&mut server, IpAddr::V4(Ipv4Addr::LOCALHOST), shared).await;
        });

        client.write_all(raw).await.expect("request should be sent");
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.expect("response should be received");
        task.await.expect("server task should not panic");
        String::from_utf8_lossy(&out).into_owned()
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn serve_is_send_and_replies_errors() {
        let fx = Fixture::new();
        let (mut client, mut server) = tokio::io::duplex(1024);
        let fut = serve(&mut server, IpAddr::V4(Ipv4Addr::LOCALHOST), fx.shared());
        assert_send(&fut);

        client.write_all(b"/missing\r\n").await.expect("request should be sent");
        fut.await;
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.expect("response should be received");
        assert_eq!(String::from_utf8_lossy(&out), "3404 Not Found\r\n.\r\n");
    }

    const ROOT_LISTING: &str = concat!(
        "i[ localhost/ ]\tTITLE\tnull.host\t1\r\n",
        "i\t-\tnull.host\t1\r\n",
        "1..\t/\tlocalhost\t70\r\n",
        "0a.txt\t/a.txt\tlocalhost\t70\r\n",
        "Ib.jpg\t/b.jpg\tlocalhost\t70\r\n",
        "9c\t/c\tlocalhost\t70\r\n",
        "1sub\t/sub\tlocalhost\t70\r\n",
    );

    #[tokio::test]
    async fn root_listing() {
        let mut fx = Fixture::new();
        fx.config.set_footer("served by burrow", false);
        let out = request(&fx.shared(), b"\r\n").await;
        assert_eq!(out, format!("{ROOT_LISTING}iserved by burrow\t-\tnull.host\t1\r\n.\r\n"));
    }

    #[tokio::test]
    async fn escape_serves_root() {
        let fx = Fixture::new();
        let shared = fx.shared();
        for raw in [&b"/../etc/passwd\r\n"[..], b"../../\r\n", b"/\n"] {
            assert_eq!(request(&shared, raw).await, format!("{ROOT_LISTING}.\r\n"));
        }
    }

    #[tokio::test]
    async fn star_gophermap() {
        let fx = Fixture::new();
        fx.write("gophermap", "!My hole\nWelcome\n-c\n*\nignored\n");
        let out = request(&fx.shared(), b"/\r\n").await;

        assert!(out.starts_with(concat!(
            "iMy hole\tTITLE\tnull.host\t1\r\n",
            "iWelcome\t-\tnull.host\t1\r\n",
            "i[ localhost/ ]\tTITLE\tnull.host\t1\r\n",
        )), "{out}");
        assert!(out.contains("0a.txt\t/a.txt\tlocalhost\t70\r\n"));
        assert!(!out.contains("9c\t"));
        assert!(!out.contains("ignored"));
        assert!(!out.contains("gophermap"));
        assert!(out.ends_with("1sub\t/sub\tlocalhost\t70\r\n.\r\n"));
        assert_eq!(out.matches(".\r\n").count(), 1);
    }

    #[tokio::test]
    async fn files() {
        let fx = Fixture::new();
        let shared = fx.shared();
        assert_eq!(request(&shared, b"/a.txt\r\n").await, "a.txt");
        assert_eq!(request(&shared, b"/b.jpg\tsearch terms\r\n").await, "b.jpg");
        assert!(shared.cache.contains(&fx.config.host.root.join("a.txt")));
        assert_eq!(request(&shared, b"/missing\r\n").await, "3404 Not Found\r\n.\r\n");
    }

    #[tokio::test]
    async fn generated_policy_files() {
        let fx = Fixture::new();
        let shared = fx.shared();
        assert_eq!(request(&shared, b"/robots.txt\r\n").await, crate::policy::robots_txt());
        assert!(request(&shared, b"/caps.txt\r\n").await.starts_with("CAPS\n"));
    }

    #[tokio::test]
    async fn url_redirect() {
        let fx = Fixture::new();
        let out = request(&fx.shared(), b"URL:gopher://example.org/1\r\n").await;
        assert!(out.starts_with("<!DOCTYPE html>"));
        assert_eq!(out.matches("gopher://example.org/1").count(), 2);
    }

    #[tokio::test]
    async fn restricted_files() -> Result<(), regex::Error> {
        let mut fx = Fixture::new();
        fx.config.restrict_files = Restrictions::parse("^b\\.")?;
        let shared = fx.shared();
        assert_eq!(request(&shared, b"/b.jpg\r\n").await, "3403 Forbidden\r\n.\r\n");
        assert!(!request(&shared, b"/\r\n").await.contains("b.jpg"));
        Ok(())
    }

    #[tokio::test]
    async fn cgi() {
        let fx = Fixture::new();
        fx.script("cgi-bin/hi", r#"echo hello; echo "$QUERY_STRING|$SCRIPT_NAME|$REQUEST_URI""#);
        let out = request(&fx.shared(), b"/cgi-bin/hi?a=1&b=2\r\n").await;
        assert_eq!(out, "hello\na=1&b=2|/cgi-bin/hi|/cgi-bin/hi?a=1&b=2\n");
    }

    #[tokio::test]
    async fn cgi_disabled() {
        let mut fx = Fixture::new();
        fx.config.cgi = false;
        fx.script("cgi-bin/hi", "echo hello");
        let out = request(&fx.shared(), b"/cgi-bin/hi\r\n").await;
        assert_eq!(out, "#!/bin/sh\necho hello\n");
    }

    #[tokio::test]
    async fn cgi_timeout() {
        let mut fx = Fixture::new();
        fx.config.exec_timeout = Duration::from_millis(300);
        fx.script("cgi-bin/slow", "sleep 5");
        let out = request(&fx.shared(), b"/cgi-bin/slow\r\n").await;
        assert_eq!(out, "3500 Internal Server Error\r\n.\r\n");
    }

    #[tokio::test]
    async fn cgi_restricted() -> Result<(), regex::Error> {
        let mut fx = Fixture::new();
        fx.config.restrict_commands = Restrictions::parse("/hi$")?;
        fx.script("cgi-bin/hi", "echo hello");
        let out = request(&fx.shared(), b"/cgi-bin/hi\r\n").await;
        assert_eq!(out, "3503 Service Unavailable\r\n.\r\n");
        Ok(())
    }

    #[tokio::test]
    async fn gophermap_command() {
        let fx = Fixture::new();
        fx.script("sub/greet.sh", r#"printf 'i%s\t-\tnull.host\t1\r\n' "hi $1""#);
        fx.write("sub/gophermap", "before\n=greet.sh there\nafter\n");
        let out = request(&fx.shared(), b"/sub\r\n").await;
        assert_eq!(out, concat!(
            "ibefore\t-\tnull.host\t1\r\n",
            "ihi there\t-\tnull.host\t1\r\n",
            "iafter\t-\tnull.host\t1\r\n",
            ".\r\n",
        ));
    }

    #[tokio::test]
    async fn too_long() {
        let fx = Fixture::new();
        let out = request(&fx.shared(), &[b'a'; READ_CHUNK]).await;
        assert!(out.is_empty(), "{out}");
    }

    #[tokio::test]
    async fn invalid_selector() {
        let fx = Fixture::new();
        let out = request(&fx.shared(), b"/\xff\xfe\r\n").await;
        assert_eq!(out, "3400 Bad Request\r\n.\r\n");
    }
}
