//! Decision model: what the orchestrator does after a cycle ends.
//!
//! Deciders are pure functions: given the cycle index and its outcome they
//! return the next action. Sleeping and resubmitting is the orchestrator's
//! job.

use std::time::Duration;

use super::outcome::CycleOutcome;
use super::policy::{RetryPolicy, is_content_flag};

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Start a fresh submit+poll cycle after `delay`.
    Retry { delay: Duration, reason: String },

    /// Return the outcome as final.
    Stop { reason: String },
}

impl Decision {
    pub fn is_retry(&self) -> bool {
        matches!(self, Decision::Retry { .. })
    }
}

pub trait Decider: Send + Sync {
    /// Decide what follows the `cycle`-th (1-indexed) cycle.
    fn decide(&self, cycle: u32, outcome: &CycleOutcome) -> Decision;

    /// Total cycles this decider allows. Progress labels (`retry n/m`) use it.
    fn budget(&self) -> u32;
}

/// Retries definitive failures and retryable submission errors while
/// budget remains. Timeouts, cancellations and credential/balance errors
/// always stop.
///
/// Failures matching a content-flag phrase also stop: the fallback
/// coordinator re-runs those on its own, narrower schedule.
#[derive(Debug, Clone)]
pub struct DefaultDecider {
    retry_policy: RetryPolicy,
    content_flags: Vec<String>,
}

impl DefaultDecider {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self {
            retry_policy,
            content_flags: Vec::new(),
        }
    }

    pub fn with_content_flags(mut self, phrases: Vec<String>) -> Self {
        self.content_flags = phrases;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    fn retry_or_exhausted(&self, cycle: u32, what: &str) -> Decision {
        if self.retry_policy.has_budget_after(cycle) {
            Decision::Retry {
                delay: self.retry_policy.pause,
                reason: format!(
                    "{what}; retry {}/{} after {:?}",
                    cycle,
                    self.retry_policy.budget.saturating_sub(1),
                    self.retry_policy.pause
                ),
            }
        } else {
            Decision::Stop {
                reason: format!(
                    "{what}; retry budget exhausted ({cycle}/{})",
                    self.retry_policy.budget
                ),
            }
        }
    }
}

impl Default for DefaultDecider {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, cycle: u32, outcome: &CycleOutcome) -> Decision {
        match outcome {
            CycleOutcome::Succeeded(_) => Decision::Stop {
                reason: "succeeded".to_string(),
            },
            CycleOutcome::DefinitiveFailure { message, .. }
                if is_content_flag(message, &self.content_flags) =>
            {
                Decision::Stop {
                    reason: "content moderation rejection".to_string(),
                }
            }
            CycleOutcome::DefinitiveFailure { .. } => {
                self.retry_or_exhausted(cycle, "provider reported failure")
            }
            CycleOutcome::SubmissionFailed(err) if err.is_cycle_retryable() => {
                self.retry_or_exhausted(cycle, "submission failed")
            }
            CycleOutcome::SubmissionFailed(err) => Decision::Stop {
                reason: format!("non-retryable submission error: {err}"),
            },
            CycleOutcome::TimedOut { reason, .. } => Decision::Stop {
                reason: format!("no verdict from provider ({reason})"),
            },
            CycleOutcome::Cancelled => Decision::Stop {
                reason: "cancelled".to_string(),
            },
        }
    }

    fn budget(&self) -> u32 {
        self.retry_policy.budget.max(1)
    }
}
