//! Errors - エラー型と分類
//!
//! - `SubmitError`: 投入時のエラー。オーケストレータがリトライ可否を判断する
//! - `PollError`: ポーリング時の一時エラー。Poller が連続回数を数える
//! - `DriverError`: 設定ミス。リモート呼び出しの前に即座に失敗する
//!
//! それ以外の失敗はすべて `GenerationResult` の `FailureKind` に変換される。

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::ProviderId;

/// Failure classes surfaced to callers inside a `GenerationResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Authentication,
    InsufficientCredits,
    AccessDenied,
    RateLimited,
    MalformedResponse,
    Rejected,
    Transport,
    DefinitiveFailure,
    Timeout,
    Upload,
    Cancelled,
}

/// Errors raised while creating a remote task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("insufficient credits: {0}")]
    InsufficientCredits(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("provider response carried no task id: {0}")]
    MalformedResponse(String),

    #[error("submission rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl SubmitError {
    /// Classify a non-success HTTP status (or an in-body status code).
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 => SubmitError::Authentication(message),
            402 => SubmitError::InsufficientCredits(message),
            403 => SubmitError::AccessDenied(message),
            429 => SubmitError::RateLimited(message),
            _ => SubmitError::Rejected { status, message },
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            SubmitError::Authentication(_) => FailureKind::Authentication,
            SubmitError::InsufficientCredits(_) => FailureKind::InsufficientCredits,
            SubmitError::AccessDenied(_) => FailureKind::AccessDenied,
            SubmitError::RateLimited(_) => FailureKind::RateLimited,
            SubmitError::MalformedResponse(_) => FailureKind::MalformedResponse,
            SubmitError::Rejected { .. } => FailureKind::Rejected,
            SubmitError::Transport(_) => FailureKind::Transport,
        }
    }

    /// Whether restarting the whole submit+poll cycle may help.
    ///
    /// Credential and balance problems never go away on their own.
    pub fn is_cycle_retryable(&self) -> bool {
        match self {
            SubmitError::Authentication(_)
            | SubmitError::InsufficientCredits(_)
            | SubmitError::AccessDenied(_) => false,
            SubmitError::RateLimited(_)
            | SubmitError::MalformedResponse(_)
            | SubmitError::Transport(_) => true,
            SubmitError::Rejected { status, .. } => *status >= 500,
        }
    }
}

/// Transient errors observed while querying task status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error("status query failed ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("status query transport error: {0}")]
    Transport(String),

    #[error("status response could not be decoded: {0}")]
    Decode(String),

    #[error("status query timed out after {0:?}")]
    Timeout(Duration),
}

/// Setup-time misconfiguration. Returned before any remote call is made.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("no credential configured for provider {0}")]
    MissingCredential(ProviderId),

    #[error("unknown provider {0}")]
    UnknownProvider(ProviderId),

    #[error("request has inline media but no uploader is configured")]
    UploaderMissing,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::unauthorized(401, FailureKind::Authentication, false)]
    #[case::payment(402, FailureKind::InsufficientCredits, false)]
    #[case::forbidden(403, FailureKind::AccessDenied, false)]
    #[case::too_many(429, FailureKind::RateLimited, true)]
    #[case::bad_request(400, FailureKind::Rejected, false)]
    #[case::server(503, FailureKind::Rejected, true)]
    fn status_codes_are_classified(
        #[case] status: u16,
        #[case] kind: FailureKind,
        #[case] retryable: bool,
    ) {
        let err = SubmitError::from_status(status, "boom");
        assert_eq!(err.kind(), kind);
        assert_eq!(err.is_cycle_retryable(), retryable);
    }

    #[test]
    fn insufficient_credits_message_is_readable() {
        let err = SubmitError::from_status(402, "balance is 0");
        assert_eq!(err.to_string(), "insufficient credits: balance is 0");
    }

    #[test]
    fn failure_kind_serializes_as_snake_case() {
        let s = serde_json::to_string(&FailureKind::InsufficientCredits).unwrap();
        assert_eq!(s, "\"insufficient_credits\"");
    }
}
