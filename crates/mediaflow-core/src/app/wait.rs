//! Cancellable waits shared by the poller and the orchestrator.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::ports::Clock;

/// Sleep on `clock` unless `cancel` fires first.
///
/// Returns `false` when cancelled (before or during the wait).
pub(crate) async fn pause(clock: &dyn Clock, cancel: &CancellationToken, duration: Duration) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    if duration.is_zero() {
        return true;
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = clock.sleep(duration) => true,
    }
}

/// Bound a single remote call. `Err(())` means the call ran past `limit`.
pub(crate) async fn bounded<F: Future>(limit: Duration, call: F) -> Result<F::Output, ()> {
    tokio::time::timeout(limit, call).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ManualClock;

    #[tokio::test]
    async fn pause_sleeps_when_not_cancelled() {
        let clock = ManualClock::default();
        let cancel = CancellationToken::new();

        assert!(pause(&clock, &cancel, Duration::from_secs(3)).await);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(3)]);
    }

    #[tokio::test]
    async fn pause_skips_sleep_once_cancelled() {
        let clock = ManualClock::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(!pause(&clock, &cancel, Duration::from_secs(3)).await);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn bounded_reports_overrun() {
        let result = bounded(Duration::from_millis(10), tokio::time::sleep(Duration::from_secs(5))).await;
        assert!(result.is_err());

        let result = bounded(Duration::from_secs(5), async { 7 }).await;
        assert_eq!(result, Ok(7));
    }
}
