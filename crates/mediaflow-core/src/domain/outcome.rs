//! Outcome model: what a status query, a cycle and a whole generation end in.
//!
//! Three layers, from the inside out:
//! - `StatusReport`: one normalized status query.
//! - `CycleOutcome`: one submit+poll cycle.
//! - `GenerationResult`: the value handed back to the caller.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::attempt::CycleRecord;
use super::errors::{FailureKind, SubmitError};
use super::ids::{GenerationId, ProviderId, TaskHandle};
use super::status::TaskStatus;

/// Provider-reported metadata about a finished task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// How long the provider spent on the job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_time_ms: Option<u64>,

    /// Duration of the produced media (video jobs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

impl ResultMetadata {
    pub fn is_empty(&self) -> bool {
        self.cost_time_ms.is_none() && self.duration_secs.is_none()
    }
}

/// One status query, normalized from whatever the provider returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: TaskStatus,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(default, skip_serializing_if = "ResultMetadata::is_empty")]
    pub metadata: ResultMetadata,
}

impl StatusReport {
    pub fn new(status: TaskStatus) -> Self {
        Self {
            status,
            artifacts: Vec::new(),
            error_code: None,
            error_message: None,
            metadata: ResultMetadata::default(),
        }
    }

    pub fn queued() -> Self {
        Self::new(TaskStatus::Queued)
    }

    pub fn in_progress() -> Self {
        Self::new(TaskStatus::InProgress)
    }

    pub fn succeeded<I, S>(artifacts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut report = Self::new(TaskStatus::Succeeded);
        report.artifacts = artifacts.into_iter().map(Into::into).collect();
        report
    }

    pub fn failed(message: impl Into<String>) -> Self {
        let mut report = Self::new(TaskStatus::Failed);
        report.error_message = Some(message.into());
        report
    }

    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn with_metadata(mut self, metadata: ResultMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A successful cycle's output. `artifacts` is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub task: TaskHandle,
    pub artifacts: Vec<String>,
    pub metadata: ResultMetadata,
}

impl GenerationOutput {
    pub fn primary_url(&self) -> Option<&str> {
        self.artifacts.first().map(String::as_str)
    }
}

/// Why a poll loop gave up without a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimeoutReason {
    AttemptsExhausted,
    Deadline,
    ConsecutiveErrors,
}

impl fmt::Display for TimeoutReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimeoutReason::AttemptsExhausted => "polling attempts exhausted",
            TimeoutReason::Deadline => "polling deadline reached",
            TimeoutReason::ConsecutiveErrors => "too many consecutive status errors",
        };
        f.write_str(s)
    }
}

/// Terminal outcome of one submit+poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Succeeded(GenerationOutput),

    /// The provider explicitly reported failure (or an unusable success).
    DefinitiveFailure {
        task: TaskHandle,
        code: Option<String>,
        message: String,
    },

    /// No verdict within the polling budget.
    TimedOut {
        task: TaskHandle,
        reason: TimeoutReason,
        attempts: u32,
    },

    /// The submission itself failed; no task handle exists.
    SubmissionFailed(SubmitError),

    Cancelled,
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Succeeded(_))
    }

    pub fn task(&self) -> Option<&TaskHandle> {
        match self {
            CycleOutcome::Succeeded(output) => Some(&output.task),
            CycleOutcome::DefinitiveFailure { task, .. } | CycleOutcome::TimedOut { task, .. } => {
                Some(task)
            }
            CycleOutcome::SubmissionFailed(_) | CycleOutcome::Cancelled => None,
        }
    }

    /// `None` on success.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            CycleOutcome::Succeeded(_) => None,
            CycleOutcome::DefinitiveFailure { .. } => Some(FailureKind::DefinitiveFailure),
            CycleOutcome::TimedOut { .. } => Some(FailureKind::Timeout),
            CycleOutcome::SubmissionFailed(err) => Some(err.kind()),
            CycleOutcome::Cancelled => Some(FailureKind::Cancelled),
        }
    }

    /// Human-readable failure message. `None` on success.
    pub fn failure_message(&self) -> Option<String> {
        match self {
            CycleOutcome::Succeeded(_) => None,
            CycleOutcome::DefinitiveFailure { message, .. } => Some(message.clone()),
            CycleOutcome::TimedOut {
                reason, attempts, ..
            } => Some(format!("{reason} after {attempts} attempts")),
            CycleOutcome::SubmissionFailed(err) => Some(err.to_string()),
            CycleOutcome::Cancelled => Some("generation cancelled".to_string()),
        }
    }
}

/// The value handed back across the core boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub generation_id: GenerationId,

    pub success: bool,

    /// Primary artifact (first of `artifact_urls`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_url: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifact_urls: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,

    /// The provider whose run produced this result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<ProviderId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskHandle>,

    /// Total submissions made across retries and providers.
    pub attempts: u32,

    #[serde(default, skip_serializing_if = "ResultMetadata::is_empty")]
    pub metadata: ResultMetadata,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<CycleRecord>,
}

impl GenerationResult {
    /// Build a result from the final cycle outcome of `provider`.
    pub fn from_outcome(
        generation_id: GenerationId,
        provider: Option<ProviderId>,
        outcome: &CycleOutcome,
        history: Vec<CycleRecord>,
    ) -> Self {
        let attempts = history.len() as u32;
        match outcome {
            CycleOutcome::Succeeded(output) => Self {
                generation_id,
                success: true,
                artifact_url: output.primary_url().map(str::to_string),
                artifact_urls: output.artifacts.clone(),
                error: None,
                error_kind: None,
                provider,
                task_id: Some(output.task.clone()),
                attempts,
                metadata: output.metadata.clone(),
                history,
            },
            failure => Self {
                generation_id,
                success: false,
                artifact_url: None,
                artifact_urls: Vec::new(),
                error: failure.failure_message(),
                error_kind: failure.failure_kind(),
                provider,
                task_id: failure.task().cloned(),
                attempts,
                metadata: ResultMetadata::default(),
                history,
            },
        }
    }

    /// A failure that happened before any cycle ran (e.g. media upload).
    pub fn failed_before_submission(
        generation_id: GenerationId,
        kind: FailureKind,
        error: impl Into<String>,
    ) -> Self {
        Self {
            generation_id,
            success: false,
            artifact_url: None,
            artifact_urls: Vec::new(),
            error: Some(error.into()),
            error_kind: Some(kind),
            provider: None,
            task_id: None,
            attempts: 0,
            metadata: ResultMetadata::default(),
            history: Vec::new(),
        }
    }
}
