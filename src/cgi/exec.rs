use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use compact_str::CompactString;
use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::{Child, Command};

use super::Env;
use crate::config::Config;
use crate::Error;


/// Time a child gets to exit after `SIGTERM` before its group is killed.
pub const GRACE_PERIOD: Duration = Duration::from_millis(500);

const CHUNK_SIZE: usize = 4096;


/// Runs the executable at `path` and streams its standard output into
/// `writer`, returning the number of bytes forwarded.
///
/// The child starts in its own process group with `env` as its complete
/// environment, a null standard input, and the script's directory as its
/// working directory. Once `config.exec_timeout` has passed, the whole group
/// receives `SIGTERM`, followed by `SIGKILL` if the child survives
/// [`GRACE_PERIOD`]. Output forwarded before the deadline stays forwarded.
///
/// # Errors
/// * [`Error::RestrictedCommand`] if `path` matches the restricted-commands
///   list. Nothing is spawned in that case.
/// * [`Error::CommandStart`] if the child cannot be spawned.
/// * [`Error::BufferRead`] if reading its output fails.
/// * [`Error::SocketWrite`] or [`Error::SocketWriteCount`] if `writer`
///   refuses the output.
/// * [`Error::CommandExitCode`] if the child exits unsuccessfully, including
///   when it was killed after the deadline.
/// * [`Error::ProcessGroup`] if the process group cannot be signalled.
pub async fn execute<W: AsyncWrite + Unpin + ?Sized>(
    writer: &mut W,
    env: &Env,
    path: &Path,
    args: &[CompactString],
    config: &Config,
) -> Result<u64, Error> {
    if crate::restrict::is_restricted(config.restrict_commands.as_ref(), &path.to_string_lossy()) {
        return Err(Error::RestrictedCommand(path.to_owned()));
    }

    let mut cmd = Command::new(path);
    cmd.args(args.iter().map(CompactString::as_str))
        .env_clear()
        .envs(env.iter())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .process_group(0)
        .kill_on_drop(true);
    if let Some(dir) = path.parent() {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn().map_err(Error::CommandStart)?;
    // Our child leads its own group, so its pid doubles as the group id
    let pgid = child.id().and_then(|id| i32::try_from(id).ok()).unwrap_or(0);
    tracing::debug!(?path, pgid, "started command");

    let Some(mut stdout) = child.stdout.take() else {
        return Err(Error::BufferRead(io::ErrorKind::BrokenPipe.into()));
    };

    let deadline = tokio::time::Instant::now() + config.exec_timeout;
    let mut written = 0;
    let run = async {
        forward(&mut stdout, writer, &mut written).await?;
        child.wait().await.map_err(Error::BufferRead)
    };

    let outcome = tokio::time::timeout_at(deadline, run).await;
    let status = match outcome {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            // The client or the pipe failed, so nobody is waiting for the rest
            if let Err(kill_err) = signal_group(pgid, Signal::SIGKILL) {
                let error: &dyn std::error::Error = &kill_err;
                tracing::debug!(error, pgid, "failed to kill abandoned command");
            }
            return Err(e);
        },
        Err(_) => {
            tracing::warn!(?path, timeout = ?config.exec_timeout, "command timed out");
            terminate(&mut child, pgid).await?
        },
    };
    if status.success() {
        Ok(written)
    } else {
        Err(Error::CommandExitCode(status))
    }
}


/// Copies everything from `reader` to `writer` until EOF. `total` counts the
/// bytes written so far, even if the copy is cut short.
async fn forward<R, W>(reader: &mut R, writer: &mut W, total: &mut u64) -> Result<(), Error>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf).await.map_err(Error::BufferRead)?;
        if n == 0 {
            break;
        }
        let expected = *total + n as u64;
        writer.write_all(&buf[..n]).await.map_err(|e| Error::from_write(e, *total, expected))?;
        *total = expected;
    }
    writer.flush().await.map_err(Error::SocketWrite)
}

/// Stops a timed-out child: `SIGTERM` to its group, then `SIGKILL` once the
/// grace period is over. Stragglers left behind by an exited leader are
/// killed as well.
async fn terminate(child: &mut Child, pgid: i32) -> Result<ExitStatus, Error> {
    signal_group(pgid, Signal::SIGTERM).map_err(Error::ProcessGroup)?;
    let exited = tokio::time::timeout(GRACE_PERIOD, child.wait()).await;
    signal_group(pgid, Signal::SIGKILL).map_err(Error::ProcessGroup)?;
    match exited {
        Ok(res) => res.map_err(Error::BufferRead),
        Err(_) => child.wait().await.map_err(Error::BufferRead),
    }
}

/// Sends `signal` to the process group `pgid`. A group that no longer
/// exists counts as success.
fn signal_group(pgid: i32, signal: Signal) -> io::Result<()> {
    if pgid <= 0 {
        // Never signal our own group or every process we can reach
        return Err(io::ErrorKind::InvalidInput.into());
    }
    match killpg(Pid::from_raw(pgid), signal) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(e.into()),
    }
}
