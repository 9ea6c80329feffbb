//! Cancellation-aware waiting.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Run `fut` unless `cancel` fires first. Returns `None` when cancelled.
pub async fn or_cancelled<F, T>(cancel: &CancellationToken, fut: F) -> Option<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

/// Sleep for `duration`. Returns `false` if cancelled before it elapsed.
pub async fn sleep_or_cancelled(cancel: &CancellationToken, duration: Duration) -> bool {
    or_cancelled(cancel, tokio::time::sleep(duration))
        .await
        .is_some()
}
