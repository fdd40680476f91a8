use std::sync::Arc;

use compact_str::CompactString;
use smallvec::SmallVec;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::cgi::{exec, Env};
use crate::config::Config;
use crate::path::RequestPath;
use crate::server::Request;
use crate::Error;


/// A command whose output belongs at a fixed position in a response.
///
/// Jobs are collected while rendering and only run once every cache lock
/// has been released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecJob {
    pub path: RequestPath,
    pub args: SmallVec<[CompactString; 2]>,
}

/// One piece of a [`Response`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Bytes(Vec<u8>),
    /// Bytes shared with a cache entry.
    Shared(Arc<[u8]>),
    Exec(ExecJob),
}


/// A fully rendered response, owning everything it needs to be sent
/// without touching the cache again.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    parts: Vec<Part>,
}

impl Response {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a buffer for appending bytes at the end of the response.
    pub fn bytes_mut(&mut self) -> &mut Vec<u8> {
        if !matches!(self.parts.last(), Some(Part::Bytes(_))) {
            self.parts.push(Part::Bytes(Vec::new()));
        }
        match self.parts.last_mut() {
            Some(Part::Bytes(buf)) => buf,
            _ => unreachable!("a byte part was just pushed"),
        }
    }

    pub fn push_shared(&mut self, data: Arc<[u8]>) {
        if !data.is_empty() {
            self.parts.push(Part::Shared(data));
        }
    }

    pub fn push_exec(&mut self, job: ExecJob) {
        self.parts.push(Part::Exec(job));
    }

    #[inline]
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Tests whether sending requires running commands.
    #[must_use]
    pub fn has_exec(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::Exec(_)))
    }

    /// Writes the response to `writer` in order, running command jobs in
    /// place. Returns the number of bytes written.
    ///
    /// # Errors
    /// Returns the first write or execution error. Everything before the
    /// failing part has already been written at that point.
    pub async fn send<W: AsyncWrite + Unpin + ?Sized>(
        &self,
        writer: &mut W,
        config: &Config,
        req: &Request,
    ) -> Result<u64, Error> {
        let mut written = 0u64;
        for part in &self.parts {
            let bytes: &[u8] = match part {
                Part::Bytes(b) => b,
                Part::Shared(b) => b,
                Part::Exec(job) => {
                    let env = Env::new(config, req, &job.path);
                    written += exec::execute(writer, &env, job.path.abs(), &job.args, config).await?;
                    continue;
                },
            };
            let expected = written + bytes.len() as u64;
            writer.write_all(bytes).await.map_err(|e| Error::from_write(e, written, expected))?;
            written = expected;
        }
        writer.flush().await.map_err(Error::SocketWrite)?;
        Ok(written)
    }
}

impl From<Vec<u8>> for Response {
    #[inline]
    fn from(v: Vec<u8>) -> Self {
        Self { parts: vec![Part::Bytes(v)] }
    }
}


#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use super::*;

    #[test]
    fn coalesces_bytes() {
        let mut resp = Response::new();
        resp.bytes_mut().extend_from_slice(b"ab");
        resp.bytes_mut().extend_from_slice(b"cd");
        resp.push_shared(Arc::<[u8]>::from(&b"ef"[..]));
        resp.push_shared(Arc::<[u8]>::from(&b""[..]));
        resp.bytes_mut().push(b'g');
        assert_eq!(resp.parts(), [
            Part::Bytes(b"abcd".to_vec()),
            Part::Shared(Arc::<[u8]>::from(&b"ef"[..])),
            Part::Bytes(b"g".to_vec()),
        ]);
        assert!(!resp.has_exec());
    }

    #[tokio::test]
    async fn send_in_order() -> Result<(), Error> {
        let config = Config::new("/srv", "localhost");
        let req = Request::new(&config.host.root, IpAddr::V4(Ipv4Addr::LOCALHOST), "/".into());

        let mut resp = Response::from(b"head ".to_vec());
        resp.push_shared(Arc::<[u8]>::from(&b"body "[..]));
        resp.bytes_mut().extend_from_slice(b"tail");

        let mut out = Vec::new();
        let n = resp.send(&mut out, &config, &req).await?;
        assert_eq!(out, b"head body tail");
        assert_eq!(n, 14);
        Ok(())
    }
}
