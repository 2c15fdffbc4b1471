use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;

use crate::Result;

/// Sleeps for `delay` unless `shutdown` fires first.
///
/// Returns `false` when the sleep was cut short by cancellation.
pub(crate) async fn sleep_or_cancelled(
    delay: Duration,
    shutdown: &CancellationToken,
) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

// Helper function to spawn named background tasks and log how they ended
pub(crate) fn spawn_task<F>(
    name: &str,
    task: F,
) -> JoinHandle<()>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    let name = name.to_string();
    tokio::spawn(async move {
        match task.await {
            Ok(()) => debug!("spawned task: {name} stopped"),
            Err(e) => error!("spawned task: {name} stopped with error: {:?}", e),
        }
    })
}
