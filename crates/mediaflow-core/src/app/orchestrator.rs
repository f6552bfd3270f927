//! RetryOrchestrator - submit+poll サイクルの外側ループ
//!
//! # フロー（1 サイクル）
//! 1. RateLimiter::wait_for_slot()
//! 2. TaskProvider::submit() → 新しい TaskHandle
//! 3. TaskPoller::await_terminal()
//! 4. Decider::decide() → Retry なら待ってから 1 に戻る / Stop なら返す
//!
//! 1 回のサイクルが終端に達するまで次のハンドルは作らない。
//! `retry n/m` の m は Decider::budget() から取る。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::poller::{PollOutcome, TaskPoller};
use super::wait::{bounded, pause};
use crate::domain::{
    CycleOutcome, CycleRecord, Decider, Decision, GenerationOutput, PollVerdict, ProviderId,
    SubmissionPayload, SubmitError, TaskHandle,
};
use crate::ports::{Annotated, Clock, Credential, IdGenerator, ProgressObserver, RateLimiter, TaskProvider};

/// Result of one orchestrator run against one provider.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub provider: ProviderId,
    pub outcome: CycleOutcome,
    pub history: Vec<CycleRecord>,
}

impl RunReport {
    pub fn cycles(&self) -> u32 {
        self.history.len() as u32
    }
}

pub struct RetryOrchestrator {
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    rate_limiter: Arc<dyn RateLimiter>,
    decider: Arc<dyn Decider>,
    poller: TaskPoller,
    request_timeout: Duration,
}

impl RetryOrchestrator {
    pub fn new(
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
        rate_limiter: Arc<dyn RateLimiter>,
        decider: Arc<dyn Decider>,
        poller: TaskPoller,
        request_timeout: Duration,
    ) -> Self {
        Self {
            clock,
            ids,
            rate_limiter,
            decider,
            poller,
            request_timeout,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Run cycles until the decider stops.
    pub async fn run(
        &self,
        provider: &dyn TaskProvider,
        credential: &Credential,
        payload: &SubmissionPayload,
        progress: &dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> RunReport {
        self.run_cycles(provider, credential, payload, progress, cancel, self.decider.budget())
            .await
    }

    /// Exactly one cycle, whatever the decider says.
    pub async fn run_once(
        &self,
        provider: &dyn TaskProvider,
        credential: &Credential,
        payload: &SubmissionPayload,
        progress: &dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> RunReport {
        self.run_cycles(provider, credential, payload, progress, cancel, 1)
            .await
    }

    async fn run_cycles(
        &self,
        provider: &dyn TaskProvider,
        credential: &Credential,
        payload: &SubmissionPayload,
        progress: &dyn ProgressObserver,
        cancel: &CancellationToken,
        max_cycles: u32,
    ) -> RunReport {
        let mut history = Vec::new();
        let mut cycle = 1;

        loop {
            let cycle_id = self.ids.cycle_id();
            let started_at = self.clock.now();
            let annotated = Annotated::for_cycle(progress, cycle, max_cycles);

            let outcome = self
                .run_cycle(provider, credential, payload, &annotated, cancel)
                .await;
            history.push(CycleRecord::new(
                cycle_id,
                provider.id().clone(),
                cycle,
                &outcome,
                started_at,
                self.clock.now(),
            ));

            let decision = match self.decider.decide(cycle, &outcome) {
                Decision::Retry { .. } if cycle >= max_cycles => Decision::Stop {
                    reason: format!("cycle limit reached ({cycle}/{max_cycles})"),
                },
                decision => decision,
            };
            match decision {
                Decision::Stop { reason } => {
                    info!(provider = %provider.id(), cycle, %cycle_id, %reason, "run finished");
                    return RunReport {
                        provider: provider.id().clone(),
                        outcome,
                        history,
                    };
                }
                Decision::Retry { delay, reason } => {
                    warn!(provider = %provider.id(), cycle, %cycle_id, ?delay, %reason, "restarting cycle");
                    if !pause(self.clock.as_ref(), cancel, delay).await {
                        return RunReport {
                            provider: provider.id().clone(),
                            outcome: CycleOutcome::Cancelled,
                            history,
                        };
                    }
                    cycle += 1;
                }
            }
        }
    }

    async fn run_cycle(
        &self,
        provider: &dyn TaskProvider,
        credential: &Credential,
        payload: &SubmissionPayload,
        progress: &dyn ProgressObserver,
        cancel: &CancellationToken,
    ) -> CycleOutcome {
        if cancel.is_cancelled() {
            return CycleOutcome::Cancelled;
        }
        self.rate_limiter.wait_for_slot().await;
        if cancel.is_cancelled() {
            return CycleOutcome::Cancelled;
        }

        let task = match self.submit(provider, credential, payload).await {
            Ok(task) => task,
            Err(err) => {
                warn!(provider = %provider.id(), error = %err, retryable = err.is_cycle_retryable(), "submission failed");
                return CycleOutcome::SubmissionFailed(err);
            }
        };
        info!(provider = %provider.id(), task_id = %task, "task submitted");

        match self
            .poller
            .await_terminal(provider, credential, &task, progress, cancel)
            .await
        {
            PollOutcome::Finished(PollVerdict::Succeeded {
                artifacts,
                metadata,
            }) => CycleOutcome::Succeeded(GenerationOutput {
                task,
                artifacts,
                metadata,
            }),
            PollOutcome::Finished(PollVerdict::Failed { code, message }) => {
                CycleOutcome::DefinitiveFailure {
                    task,
                    code,
                    message,
                }
            }
            PollOutcome::Finished(PollVerdict::TimedOut { reason, attempts }) => {
                CycleOutcome::TimedOut {
                    task,
                    reason,
                    attempts,
                }
            }
            PollOutcome::Cancelled { .. } => CycleOutcome::Cancelled,
        }
    }

    async fn submit(
        &self,
        provider: &dyn TaskProvider,
        credential: &Credential,
        payload: &SubmissionPayload,
    ) -> Result<TaskHandle, SubmitError> {
        match bounded(self.request_timeout, provider.submit(credential, payload)).await {
            Ok(result) => result,
            Err(()) => Err(SubmitError::Transport(format!(
                "submission timed out after {:?}",
                self.request_timeout
            ))),
        }
    }
}
