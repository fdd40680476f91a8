use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::FileCache;


/// Spawns the task revalidating `cache` every `period`.
///
/// The first check happens one period after startup. Checks run on the
/// blocking pool, since they `stat` every cached file while holding the
/// cache's write lock.
pub fn spawn(cache: Arc<FileCache>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let cache = cache.clone();
            match tokio::task::spawn_blocking(move || cache.revalidate()).await {
                Ok(dropped) => tracing::debug!(dropped, "revalidated file cache"),
                Err(e) => {
                    let error: &dyn std::error::Error = &e;
                    tracing::error!(error, "file cache revalidation panicked");
                },
            }
        }
    })
}
