use std::io;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::cache::{monitor, FileCache};
use crate::config::Config;

/// The per-connection request pipeline.
pub mod pipeline;
mod request;

pub use request::{Parameters, Request};


/// State shared read-only by every connection.
#[derive(Debug)]
pub struct Shared {
    pub config: Config,
    pub cache: Arc<FileCache>,
}

impl Shared {
    /// Creates the shared state for `config` with an empty cache, then
    /// registers the generated policy files.
    #[must_use]
    pub fn new(config: Config) -> Arc<Self> {
        let cache = FileCache::from_config(&config);
        let installed = crate::policy::install(&cache, &config);
        tracing::debug!(?installed, "generated policy files");
        Arc::new(Self { config, cache: Arc::new(cache) })
    }
}


/// Accepts connections on `listener` forever, serving each one on its own
/// task.
///
/// The cache monitor is started first and runs as long as the returned
/// future is alive. Failed accepts are logged and skipped.
///
/// # Errors
/// Returns an error if the listener's local address is unavailable.
pub async fn run(listener: TcpListener, shared: Arc<Shared>) -> io::Result<()> {
    let local = listener.local_addr()?;
    tracing::info!(protocol = "gopher", %local, root = ?shared.config.host.root, "server started");

    let period = shared.config.monitor_period;
    let _monitor = AbortOnDrop(monitor::spawn(shared.cache.clone(), period));

    loop {
        let (mut conn, remote) = match listener.accept().await {
            Ok(c) => c,
            Err(e) => {
                let error: &dyn std::error::Error = &e;
                tracing::info!(%local, error, "accept failed");
                continue;
            },
        };

        let span = tracing::error_span!("gopher_connection", %local, %remote);
        let shared = shared.clone();
        tokio::spawn(async move {
            tracing::debug!("new connection accepted");
            pipeline::serve(&mut conn, remote.ip(), shared).await;
        }.instrument(span));
    }
}


/// Stops the wrapped task once the owner goes away.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}
