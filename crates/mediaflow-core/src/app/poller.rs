//! TaskPoller - タスクハンドルを終端状態まで解決する
//!
//! # フロー
//! 1. キャンセル確認
//! 2. `TaskProvider::status()`（1 回ごとにタイムアウト付き）
//! 3. 進捗通知
//! 4. `PollState::advance()` で継続 / 終了を判定
//! 5. 継続ならケイデンスどおりに待つ（待機中もキャンセルに反応）

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::wait::{bounded, pause};
use crate::domain::{
    PollError, PollObservation, PollPolicy, PollState, PollStep, PollVerdict, TaskHandle,
};
use crate::ports::progress::notify;
use crate::ports::{Clock, Credential, ProgressObserver, TaskProvider};

/// How a poll loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Finished(PollVerdict),
    Cancelled { attempts: u32 },
}

pub struct TaskPoller {
    clock: Arc<dyn Clock>,
    policy: PollPolicy,
    request_timeout: Duration,
}

impl TaskPoller {
    pub fn new(clock: Arc<dyn Clock>, policy: PollPolicy, request_timeout: Duration) -> Self {
        Self {
            clock,
            policy,
            request_timeout,
        }
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    pub async fn await_terminal(
        &self,
        provider: &dyn TaskProvider,
        credential: &Credential,
        task: &TaskHandle,
        progress: &dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> PollOutcome {
        let started = self.clock.now();
        let mut state = PollState::begin();

        loop {
            if cancel.is_cancelled() {
                info!(provider = %provider.id(), task_id = %task, attempts = state.attempt, "polling cancelled");
                return PollOutcome::Cancelled {
                    attempts: state.attempt,
                };
            }

            let observation = match bounded(self.request_timeout, provider.status(credential, task)).await {
                Ok(Ok(report)) => PollObservation::Status(report),
                Ok(Err(err)) => PollObservation::TransientError(err),
                Err(()) => PollObservation::TransientError(PollError::Timeout(self.request_timeout)),
            };

            let attempt = state.attempt + 1;
            match &observation {
                PollObservation::Status(report) => {
                    if let Some(previous) = state.last_status {
                        if !previous.can_transition_to(report.status) {
                            warn!(task_id = %task, from = %previous, to = %report.status, "status regressed");
                        }
                    }
                    debug!(provider = %provider.id(), task_id = %task, attempt, status = %report.status, "polled");
                }
                PollObservation::TransientError(err) => {
                    warn!(
                        provider = %provider.id(),
                        task_id = %task,
                        attempt,
                        consecutive_errors = state.consecutive_errors + 1,
                        error = %err,
                        "status query failed"
                    );
                }
            }
            notify(progress, observation.label(), attempt);

            let elapsed = self.clock.elapsed_since(started);
            match state.advance(observation, elapsed, &self.policy) {
                PollStep::Finished(verdict) => {
                    info!(provider = %provider.id(), task_id = %task, attempts = attempt, ?verdict, "polling finished");
                    return PollOutcome::Finished(verdict);
                }
                PollStep::Continue { state: next, delay } => {
                    state = next;
                    if !pause(self.clock.as_ref(), cancel, delay).await {
                        info!(provider = %provider.id(), task_id = %task, attempts = state.attempt, "polling cancelled");
                        return PollOutcome::Cancelled {
                            attempts: state.attempt,
                        };
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PollCadence, StatusReport, TimeoutReason};
    use crate::impls::scripted::{ScriptStep, ScriptedProvider};
    use crate::ports::{ManualClock, RecordingProgress};

    fn poller(clock: Arc<ManualClock>, policy: PollPolicy) -> TaskPoller {
        TaskPoller::new(clock, policy, Duration::from_secs(15))
    }

    fn fixed(max_attempts: u32, max_errors: u32) -> PollPolicy {
        PollPolicy {
            cadence: PollCadence::Fixed(Duration::from_secs(5)),
            max_attempts,
            max_consecutive_errors: max_errors,
            max_elapsed: None,
        }
    }

    async fn submit(provider: &ScriptedProvider) -> TaskHandle {
        use crate::domain::SubmissionPayload;
        provider
            .submit(
                &Credential::new("k"),
                &SubmissionPayload {
                    prompt: "p".into(),
                    media_urls: vec![],
                    options: serde_json::Value::Null,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn reports_progress_on_every_attempt_until_success() {
        let clock = Arc::new(ManualClock::default());
        let provider = ScriptedProvider::new("p").with_cycle(vec![
            ScriptStep::Status(StatusReport::queued()),
            ScriptStep::Status(StatusReport::in_progress()),
            ScriptStep::Status(StatusReport::in_progress()),
            ScriptStep::Status(StatusReport::succeeded(["https://cdn/out.mp4"])),
        ]);
        let task = submit(&provider).await;
        let progress = RecordingProgress::new();

        let outcome = poller(clock.clone(), fixed(10, 3))
            .await_terminal(&provider, &Credential::new("k"), &task, &progress, &CancellationToken::new())
            .await;

        assert!(matches!(
            outcome,
            PollOutcome::Finished(PollVerdict::Succeeded { ref artifacts, .. }) if artifacts == &vec!["https://cdn/out.mp4".to_string()]
        ));
        assert_eq!(
            progress.events(),
            vec![
                ("queued".to_string(), 1),
                ("in-progress".to_string(), 2),
                ("in-progress".to_string(), 3),
                ("succeeded".to_string(), 4),
            ]
        );
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(5); 3]);
    }

    #[tokio::test]
    async fn endless_in_progress_times_out_at_cap() {
        let clock = Arc::new(ManualClock::default());
        let provider =
            ScriptedProvider::new("p").with_cycle(vec![ScriptStep::Status(StatusReport::in_progress())]);
        let task = submit(&provider).await;

        let outcome = poller(clock.clone(), fixed(12, 3))
            .await_terminal(&provider, &Credential::new("k"), &task, &RecordingProgress::new(), &CancellationToken::new())
            .await;

        assert_eq!(
            outcome,
            PollOutcome::Finished(PollVerdict::TimedOut {
                reason: TimeoutReason::AttemptsExhausted,
                attempts: 12,
            })
        );
        assert_eq!(provider.status_calls(), 12);
        assert_eq!(clock.sleeps().len(), 11);
    }

    #[tokio::test]
    async fn transient_errors_below_threshold_are_tolerated() {
        let clock = Arc::new(ManualClock::default());
        let provider = ScriptedProvider::new("p").with_cycle(vec![
            ScriptStep::transient("502 bad gateway"),
            ScriptStep::transient("502 bad gateway"),
            ScriptStep::Status(StatusReport::in_progress()),
            ScriptStep::transient("connection reset"),
            ScriptStep::transient("connection reset"),
            ScriptStep::Status(StatusReport::succeeded(["u"])),
        ]);
        let task = submit(&provider).await;

        let outcome = poller(clock, fixed(20, 3))
            .await_terminal(&provider, &Credential::new("k"), &task, &RecordingProgress::new(), &CancellationToken::new())
            .await;

        assert!(matches!(outcome, PollOutcome::Finished(PollVerdict::Succeeded { .. })));
    }

    #[tokio::test]
    async fn consecutive_error_threshold_times_out() {
        let clock = Arc::new(ManualClock::default());
        let provider = ScriptedProvider::new("p").with_cycle(vec![ScriptStep::transient("dns failure")]);
        let task = submit(&provider).await;
        let progress = RecordingProgress::new();

        let outcome = poller(clock, fixed(100, 4))
            .await_terminal(&provider, &Credential::new("k"), &task, &progress, &CancellationToken::new())
            .await;

        assert_eq!(
            outcome,
            PollOutcome::Finished(PollVerdict::TimedOut {
                reason: TimeoutReason::ConsecutiveErrors,
                attempts: 4,
            })
        );
        assert!(progress.events().iter().all(|(label, _)| label == "poll-error"));
    }

    #[tokio::test]
    async fn cancelled_before_first_poll_makes_no_calls() {
        let clock = Arc::new(ManualClock::default());
        let provider =
            ScriptedProvider::new("p").with_cycle(vec![ScriptStep::Status(StatusReport::in_progress())]);
        let task = submit(&provider).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = poller(clock, fixed(10, 3))
            .await_terminal(&provider, &Credential::new("k"), &task, &RecordingProgress::new(), &cancel)
            .await;

        assert_eq!(outcome, PollOutcome::Cancelled { attempts: 0 });
        assert_eq!(provider.status_calls(), 0);
    }

    #[tokio::test]
    async fn cancellation_from_observer_stops_before_next_wait() {
        let clock = Arc::new(ManualClock::default());
        let provider =
            ScriptedProvider::new("p").with_cycle(vec![ScriptStep::Status(StatusReport::in_progress())]);
        let task = submit(&provider).await;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let progress = crate::ports::FnProgress(move |_: &str, attempt: u32| {
            if attempt == 2 {
                trigger.cancel();
            }
        });

        let outcome = poller(clock.clone(), fixed(10, 3))
            .await_terminal(&provider, &Credential::new("k"), &task, &progress, &cancel)
            .await;

        assert_eq!(outcome, PollOutcome::Cancelled { attempts: 2 });
        assert_eq!(provider.status_calls(), 2);
        assert_eq!(clock.sleeps().len(), 1);
    }

    #[tokio::test]
    async fn exponential_cadence_is_followed() {
        let clock = Arc::new(ManualClock::default());
        let provider = ScriptedProvider::new("p").with_cycle(vec![
            ScriptStep::Status(StatusReport::queued()),
            ScriptStep::Status(StatusReport::queued()),
            ScriptStep::Status(StatusReport::in_progress()),
            ScriptStep::Status(StatusReport::succeeded(["u"])),
        ]);
        let task = submit(&provider).await;

        poller(clock.clone(), PollPolicy::quick_edit())
            .await_terminal(&provider, &Credential::new("k"), &task, &RecordingProgress::new(), &CancellationToken::new())
            .await;

        assert_eq!(
            clock.sleeps(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4)
            ]
        );
    }
}
