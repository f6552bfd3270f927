//! Poll loop state as an explicit value.
//!
//! `PollState::advance` is the whole loop body: given one observation it
//! decides whether to stop (and with what verdict) or to wait and query
//! again. It does no I/O and reads no clock, so every edge case can be
//! tested without timers.

use std::time::Duration;

use super::errors::PollError;
use super::outcome::{ResultMetadata, StatusReport, TimeoutReason};
use super::policy::PollPolicy;
use super::status::TaskStatus;

/// Error code used when a provider reports success without any output.
pub const EMPTY_RESULT_CODE: &str = "empty_result";

/// What one status query produced.
#[derive(Debug, Clone, PartialEq)]
pub enum PollObservation {
    Status(StatusReport),
    TransientError(PollError),
}

impl PollObservation {
    /// Label passed to progress observers.
    pub fn label(&self) -> &'static str {
        match self {
            PollObservation::Status(report) => report.status.label(),
            PollObservation::TransientError(_) => "poll-error",
        }
    }
}

/// Terminal verdict of a poll loop.
#[derive(Debug, Clone, PartialEq)]
pub enum PollVerdict {
    Succeeded {
        artifacts: Vec<String>,
        metadata: ResultMetadata,
    },
    Failed {
        code: Option<String>,
        message: String,
    },
    TimedOut {
        reason: TimeoutReason,
        attempts: u32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollStep {
    Continue { state: PollState, delay: Duration },
    Finished(PollVerdict),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollState {
    /// Queries made so far.
    pub attempt: u32,
    pub consecutive_errors: u32,
    pub elapsed: Duration,
    pub last_status: Option<TaskStatus>,
}

impl PollState {
    pub fn begin() -> Self {
        Self::default()
    }

    /// Fold one observation into the state.
    ///
    /// `elapsed` is the wall-clock time since the loop started, measured
    /// after the query returned.
    pub fn advance(
        mut self,
        observation: PollObservation,
        elapsed: Duration,
        policy: &PollPolicy,
    ) -> PollStep {
        self.attempt += 1;
        self.elapsed = elapsed;

        match observation {
            PollObservation::TransientError(_) => {
                self.consecutive_errors += 1;
                if self.consecutive_errors >= policy.max_consecutive_errors {
                    return PollStep::Finished(PollVerdict::TimedOut {
                        reason: TimeoutReason::ConsecutiveErrors,
                        attempts: self.attempt,
                    });
                }
            }
            PollObservation::Status(report) => {
                self.consecutive_errors = 0;
                self.last_status = Some(report.status);

                match report.status {
                    TaskStatus::Succeeded if report.artifacts.is_empty() => {
                        return PollStep::Finished(PollVerdict::Failed {
                            code: Some(EMPTY_RESULT_CODE.to_string()),
                            message: "provider reported success without any output".to_string(),
                        });
                    }
                    TaskStatus::Succeeded => {
                        return PollStep::Finished(PollVerdict::Succeeded {
                            artifacts: report.artifacts,
                            metadata: report.metadata,
                        });
                    }
                    TaskStatus::Failed => {
                        let message = report
                            .error_message
                            .filter(|m| !m.trim().is_empty())
                            .unwrap_or_else(|| "provider reported the task as failed".to_string());
                        return PollStep::Finished(PollVerdict::Failed {
                            code: report.error_code,
                            message,
                        });
                    }
                    TaskStatus::Queued | TaskStatus::InProgress => {}
                }
            }
        }

        if self.attempt >= policy.max_attempts {
            return PollStep::Finished(PollVerdict::TimedOut {
                reason: TimeoutReason::AttemptsExhausted,
                attempts: self.attempt,
            });
        }
        if let Some(max_elapsed) = policy.max_elapsed {
            if self.elapsed >= max_elapsed {
                return PollStep::Finished(PollVerdict::TimedOut {
                    reason: TimeoutReason::Deadline,
                    attempts: self.attempt,
                });
            }
        }

        let delay = policy.cadence.delay_after(self.attempt);
        PollStep::Continue { state: self, delay }
    }
}
