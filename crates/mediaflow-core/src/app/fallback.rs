//! FallbackCoordinator - 優先プロバイダ → 代替プロバイダ
//!
//! # フロー
//! 1. 優先プロバイダで RetryOrchestrator を実行
//! 2. 失敗理由がモデレーション誤検知っぽい場合は、優先プロバイダで最大 N 回やり直す
//!    （1 回につき 1 サイクルだけ。通常のリトライ予算は使わない）
//! 3. それでも失敗し、代替が許可されていれば代替プロバイダで 1 回だけ実行する
//!    （さらに先へのフォールバックはしない）
//!
//! 結果には実際に出力を作ったプロバイダを必ず記録する。

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::orchestrator::{RetryOrchestrator, RunReport};
use super::wait::pause;
use crate::domain::{CycleOutcome, DEFAULT_CONTENT_FLAG_PHRASES, SubmissionPayload, is_content_flag};
use crate::ports::{Annotated, Credential, ProgressObserver, TaskProvider};

#[derive(Debug, Clone, PartialEq)]
pub struct FallbackPolicy {
    /// Global switch; a call can additionally disable fallback for itself.
    pub enabled: bool,

    /// Extra single-cycle runs of the preferred provider after a moderation
    /// rejection.
    pub content_flag_retries: u32,

    /// Pause before each moderation retry.
    pub content_flag_pause: Duration,

    /// Lower-cased phrases matched against failure messages.
    pub content_flag_phrases: Vec<String>,
}

impl FallbackPolicy {
    pub fn is_content_flag(&self, message: &str) -> bool {
        is_content_flag(message, &self.content_flag_phrases)
    }
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            content_flag_retries: 3,
            content_flag_pause: Duration::from_secs(3),
            content_flag_phrases: DEFAULT_CONTENT_FLAG_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

/// A provider together with the credential to use for it.
#[derive(Clone, Copy)]
pub struct Route<'a> {
    pub provider: &'a dyn TaskProvider,
    pub credential: &'a Credential,
}

pub struct FallbackCoordinator {
    orchestrator: RetryOrchestrator,
    policy: FallbackPolicy,
}

impl FallbackCoordinator {
    pub fn new(orchestrator: RetryOrchestrator, policy: FallbackPolicy) -> Self {
        Self {
            orchestrator,
            policy,
        }
    }

    pub fn policy(&self) -> &FallbackPolicy {
        &self.policy
    }

    /// Run `preferred`, then `alternate` once if the preferred run failed.
    ///
    /// The returned report's `provider` is the one whose run is final;
    /// `history` spans both providers.
    pub async fn run(
        &self,
        preferred: Route<'_>,
        alternate: Option<Route<'_>>,
        payload: &SubmissionPayload,
        progress: &dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> RunReport {
        let primary = self.run_preferred(preferred, payload, progress, cancel).await;
        if primary.outcome.is_success() || primary.outcome == CycleOutcome::Cancelled {
            return primary;
        }

        let alternate = match alternate {
            Some(route) if self.policy.enabled => route,
            _ => return primary,
        };

        warn!(
            from = %preferred.provider.id(),
            to = %alternate.provider.id(),
            error = %primary.outcome.failure_message().unwrap_or_default(),
            "falling back to alternate provider"
        );
        let annotated = Annotated::new(progress, format!("fallback {}: ", alternate.provider.id()));
        let secondary = self
            .orchestrator
            .run(alternate.provider, alternate.credential, payload, &annotated, cancel)
            .await;

        let mut history = primary.history;
        history.extend(secondary.history);
        info!(
            provider = %secondary.provider,
            succeeded = secondary.outcome.is_success(),
            "fallback run finished"
        );
        RunReport {
            provider: secondary.provider,
            outcome: secondary.outcome,
            history,
        }
    }

    async fn run_preferred(
        &self,
        route: Route<'_>,
        payload: &SubmissionPayload,
        progress: &dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> RunReport {
        let mut history = Vec::new();
        let mut flag_retries = 0;
        let mut report = self
            .orchestrator
            .run(route.provider, route.credential, payload, progress, cancel)
            .await;

        loop {
            history.extend(report.history);
            let outcome = report.outcome;

            let flagged = outcome
                .failure_message()
                .is_some_and(|message| self.policy.is_content_flag(&message));
            if !flagged
                || flag_retries >= self.policy.content_flag_retries
                || outcome == CycleOutcome::Cancelled
            {
                return RunReport {
                    provider: report.provider,
                    outcome,
                    history,
                };
            }

            flag_retries += 1;
            warn!(
                provider = %route.provider.id(),
                attempt = flag_retries,
                max = self.policy.content_flag_retries,
                "content moderation rejection; retrying preferred provider"
            );
            if !pause(self.orchestrator.clock().as_ref(), cancel, self.policy.content_flag_pause).await {
                return RunReport {
                    provider: report.provider,
                    outcome: CycleOutcome::Cancelled,
                    history,
                };
            }

            let annotated = Annotated::new(
                progress,
                format!("content retry {flag_retries}/{}: ", self.policy.content_flag_retries),
            );
            report = self
                .orchestrator
                .run_once(route.provider, route.credential, payload, &annotated, cancel)
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::app::poller::TaskPoller;
    use crate::domain::{
        DefaultDecider, FailureKind, PollCadence, PollPolicy, ProviderId, RetryPolicy,
        StatusReport, SubmitError,
    };
    use crate::impls::scripted::{ScriptStep, ScriptedProvider};
    use crate::ports::{ManualClock, RecordingProgress, UlidGenerator, Unlimited};

    fn coordinator(budget: u32, policy: FallbackPolicy) -> FallbackCoordinator {
        coordinator_with_clock(Arc::new(ManualClock::default()), budget, policy)
    }

    fn coordinator_with_clock(
        clock: Arc<ManualClock>,
        budget: u32,
        policy: FallbackPolicy,
    ) -> FallbackCoordinator {
        let poll = PollPolicy {
            cadence: PollCadence::Fixed(Duration::from_secs(5)),
            max_attempts: 10,
            max_consecutive_errors: 3,
            max_elapsed: None,
        };
        let orchestrator = RetryOrchestrator::new(
            clock.clone(),
            Arc::new(UlidGenerator::new(clock.clone())),
            Arc::new(Unlimited),
            Arc::new(
                DefaultDecider::new(RetryPolicy::new(budget, Duration::from_secs(3)))
                    .with_content_flags(policy.content_flag_phrases.clone()),
            ),
            TaskPoller::new(clock, poll, Duration::from_secs(15)),
            Duration::from_secs(30),
        );
        FallbackCoordinator::new(orchestrator, policy)
    }

    fn payload() -> SubmissionPayload {
        SubmissionPayload {
            prompt: "dance".into(),
            media_urls: vec!["https://cdn/ref.mp4".into()],
            options: serde_json::Value::Null,
        }
    }

    fn failing(id: &str, message: &str) -> ScriptedProvider {
        ScriptedProvider::new(id).with_cycle(vec![ScriptStep::Status(StatusReport::failed(message))])
    }

    fn succeeding(id: &str) -> ScriptedProvider {
        ScriptedProvider::new(id)
            .with_cycle(vec![ScriptStep::Status(StatusReport::succeeded(["https://cdn/out.mp4"]))])
    }

    async fn run(
        coord: &FallbackCoordinator,
        primary: &ScriptedProvider,
        alternate: Option<&ScriptedProvider>,
    ) -> RunReport {
        let key = Credential::new("k");
        coord
            .run(
                Route {
                    provider: primary,
                    credential: &key,
                },
                alternate.map(|p| Route {
                    provider: p,
                    credential: &key,
                }),
                &payload(),
                &RecordingProgress::new(),
                &CancellationToken::new(),
            )
            .await
    }

    #[test]
    fn content_flag_matching_is_case_insensitive() {
        let policy = FallbackPolicy::default();
        assert!(policy.is_content_flag("Your input was FLAGGED by our safety system"));
        assert!(policy.is_content_flag("violates content policy"));
        assert!(!policy.is_content_flag("render node crashed"));
    }

    #[tokio::test]
    async fn primary_success_never_touches_alternate() {
        let coord = coordinator(3, FallbackPolicy::default());
        let primary = succeeding("primary");
        let backup = succeeding("backup");

        let report = run(&coord, &primary, Some(&backup)).await;

        assert!(report.outcome.is_success());
        assert_eq!(report.provider, ProviderId::from("primary"));
        assert_eq!(backup.submit_calls(), 0);
    }

    #[tokio::test]
    async fn exhausted_primary_falls_back_exactly_once() {
        let coord = coordinator(3, FallbackPolicy::default());
        let primary = failing("primary", "render node crashed");
        let backup = succeeding("backup");

        let report = run(&coord, &primary, Some(&backup)).await;

        assert!(report.outcome.is_success());
        assert_eq!(report.provider, ProviderId::from("backup"));
        assert_eq!(primary.submit_calls(), 3);
        assert_eq!(backup.submit_calls(), 1);
        assert_eq!(report.history.len(), 4);
    }

    #[tokio::test]
    async fn both_failing_surfaces_latest_error() {
        let coord = coordinator(2, FallbackPolicy::default());
        let primary = failing("primary", "primary broke");
        let backup = failing("backup", "backup broke");

        let report = run(&coord, &primary, Some(&backup)).await;

        assert!(!report.outcome.is_success());
        assert_eq!(report.provider, ProviderId::from("backup"));
        assert_eq!(report.outcome.failure_message().as_deref(), Some("backup broke"));
        assert_eq!(backup.submit_calls(), 2);
    }

    #[tokio::test]
    async fn auth_failure_on_primary_still_falls_back() {
        let coord = coordinator(3, FallbackPolicy::default());
        let primary = ScriptedProvider::new("primary").always_reject(SubmitError::from_status(401, "bad key"));
        let backup = succeeding("backup");

        let report = run(&coord, &primary, Some(&backup)).await;

        assert!(report.outcome.is_success());
        assert_eq!(primary.submit_calls(), 1);
        assert_eq!(report.history[0].failure_kind, Some(FailureKind::Authentication));
    }

    #[tokio::test]
    async fn disabled_policy_keeps_primary_failure() {
        let policy = FallbackPolicy {
            enabled: false,
            ..FallbackPolicy::default()
        };
        let coord = coordinator(1, policy);
        let primary = failing("primary", "boom");
        let backup = succeeding("backup");

        let report = run(&coord, &primary, Some(&backup)).await;

        assert_eq!(report.provider, ProviderId::from("primary"));
        assert_eq!(backup.submit_calls(), 0);
    }

    #[tokio::test]
    async fn content_flag_retries_preferred_before_falling_back() {
        let coord = coordinator(1, FallbackPolicy::default());
        let primary = ScriptedProvider::new("primary")
            .with_cycle(vec![ScriptStep::Status(StatusReport::failed("prompt flagged as sensitive"))])
            .with_cycle(vec![ScriptStep::Status(StatusReport::failed("prompt flagged as sensitive"))])
            .with_cycle(vec![ScriptStep::Status(StatusReport::succeeded(["https://cdn/ok.mp4"]))]);
        let backup = succeeding("backup");

        let report = run(&coord, &primary, Some(&backup)).await;

        assert!(report.outcome.is_success());
        assert_eq!(report.provider, ProviderId::from("primary"));
        assert_eq!(primary.submit_calls(), 3);
        assert_eq!(backup.submit_calls(), 0);
    }

    #[tokio::test]
    async fn content_flag_retries_are_bounded() {
        let coord = coordinator(1, FallbackPolicy::default());
        let primary = failing("primary", "content policy violation");
        let backup = succeeding("backup");

        let report = run(&coord, &primary, Some(&backup)).await;

        assert_eq!(primary.submit_calls(), 4);
        assert_eq!(backup.submit_calls(), 1);
        assert_eq!(report.provider, ProviderId::from("backup"));
    }

    #[tokio::test]
    async fn content_flag_retries_do_not_spend_the_retry_budget() {
        let clock = Arc::new(ManualClock::default());
        let coord = coordinator_with_clock(clock.clone(), 3, FallbackPolicy::default());
        let primary = failing("primary", "content policy violation");
        let backup = succeeding("backup");

        let report = run(&coord, &primary, Some(&backup)).await;

        assert!(report.outcome.is_success());
        assert_eq!(primary.submit_calls(), 4);
        assert_eq!(backup.submit_calls(), 1);
        assert_eq!(report.history.len(), 5);
        assert_eq!(clock.sleeps(), vec![Duration::from_secs(3); 3]);
    }

    #[tokio::test]
    async fn content_retries_are_labelled() {
        let policy = FallbackPolicy {
            content_flag_retries: 2,
            ..FallbackPolicy::default()
        };
        let coord = coordinator(3, policy);
        let primary = ScriptedProvider::new("primary")
            .with_cycle(vec![ScriptStep::Status(StatusReport::failed("nsfw detected"))])
            .with_cycle(vec![ScriptStep::Status(StatusReport::failed("nsfw detected"))])
            .with_cycle(vec![ScriptStep::Status(StatusReport::succeeded(["https://cdn/ok.mp4"]))]);
        let progress = RecordingProgress::new();
        let key = Credential::new("k");

        let report = coord
            .run(
                Route { provider: &primary, credential: &key },
                None,
                &payload(),
                &progress,
                &CancellationToken::new(),
            )
            .await;

        assert!(report.outcome.is_success());
        assert_eq!(
            progress.events(),
            vec![
                ("failed".to_string(), 1),
                ("content retry 1/2: failed".to_string(), 1),
                ("content retry 2/2: succeeded".to_string(), 1),
            ]
        );
    }

    #[tokio::test]
    async fn fallback_progress_is_labelled() {
        let coord = coordinator(1, FallbackPolicy::default());
        let primary = failing("primary", "boom");
        let backup = succeeding("backup");
        let progress = RecordingProgress::new();
        let key = Credential::new("k");

        coord
            .run(
                Route { provider: &primary, credential: &key },
                Some(Route { provider: &backup, credential: &key }),
                &payload(),
                &progress,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(
            progress.events(),
            vec![
                ("failed".to_string(), 1),
                ("fallback backup: succeeded".to_string(), 1),
            ]
        );
    }
}
