//! SpacingRateLimiter - 投入と投入の間に最低間隔を空ける
//!
//! ロックを待機中も保持するので、同時に来た投入は 1 本ずつ順番に通る。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::ports::{Clock, RateLimiter};

pub struct SpacingRateLimiter {
    clock: Arc<dyn Clock>,
    spacing: Duration,
    last_slot: Mutex<Option<DateTime<Utc>>>,
}

impl SpacingRateLimiter {
    pub fn new(clock: Arc<dyn Clock>, spacing: Duration) -> Self {
        Self {
            clock,
            spacing,
            last_slot: Mutex::new(None),
        }
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }
}

#[async_trait]
impl RateLimiter for SpacingRateLimiter {
    async fn wait_for_slot(&self) {
        let mut last_slot = self.last_slot.lock().await;

        if let Some(last) = *last_slot {
            let since = self.clock.elapsed_since(last);
            if since < self.spacing {
                let wait = self.spacing - since;
                debug!(?wait, "delaying submission");
                self.clock.sleep(wait).await;
            }
        }
        *last_slot = Some(self.clock.now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::ManualClock;

    #[tokio::test]
    async fn first_slot_is_immediate() {
        let clock = Arc::new(ManualClock::default());
        let limiter = SpacingRateLimiter::new(clock.clone(), Duration::from_secs(2));

        limiter.wait_for_slot().await;

        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn back_to_back_slots_are_spaced() {
        let clock = Arc::new(ManualClock::default());
        let limiter = SpacingRateLimiter::new(clock.clone(), Duration::from_secs(2));

        limiter.wait_for_slot().await;
        clock.advance(Duration::from_millis(500));
        limiter.wait_for_slot().await;
        limiter.wait_for_slot().await;

        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_millis(1500), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn no_wait_after_spacing_has_passed() {
        let clock = Arc::new(ManualClock::default());
        let limiter = SpacingRateLimiter::new(clock.clone(), Duration::from_secs(2));

        limiter.wait_for_slot().await;
        clock.advance(Duration::from_secs(5));
        limiter.wait_for_slot().await;

        assert!(clock.sleeps().is_empty());
    }
}
