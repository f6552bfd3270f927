//! DriverConfig - JSON で渡すドライバ設定
//!
//! すべてのフィールドにデフォルトがあるので `{}` も有効な設定。
//! 読み込んだら `validate()` を通してからドメインのポリシーに変換する。
//!
//! ```json
//! {
//!   "poll": { "preset": "image", "max_attempts": 60 },
//!   "retry": { "budget": 2, "pause_ms": 5000 },
//!   "request_timeout_ms": 20000,
//!   "fallback": { "enabled": false }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app::fallback::FallbackPolicy;
use crate::domain::{DEFAULT_CONTENT_FLAG_PHRASES, PollCadence, PollPolicy, RetryPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Named starting points for the poll section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPreset {
    #[default]
    Video,
    Image,
    QuickEdit,
}

impl PollPreset {
    pub fn policy(self) -> PollPolicy {
        match self {
            PollPreset::Video => PollPolicy::video(),
            PollPreset::Image => PollPolicy::image(),
            PollPreset::QuickEdit => PollPolicy::quick_edit(),
        }
    }
}

/// Poll section: a preset plus optional overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollConfig {
    pub preset: PollPreset,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<u64>,

    /// Values above 1.0 switch the cadence to exponential backoff.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_factor: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_interval_ms: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_consecutive_errors: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_elapsed_ms: Option<u64>,
}

impl PollConfig {
    pub fn to_policy(&self) -> PollPolicy {
        let mut policy = self.preset.policy();

        if self.interval_ms.is_some() || self.backoff_factor.is_some() {
            let initial = self
                .interval_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| policy.cadence.delay_after(1));
            policy.cadence = match self.backoff_factor {
                Some(factor) if factor > 1.0 => PollCadence::Exponential {
                    initial,
                    factor,
                    max: self
                        .max_interval_ms
                        .map(Duration::from_millis)
                        .unwrap_or(initial * 10),
                },
                _ => PollCadence::Fixed(initial),
            };
        }
        if let (Some(ms), PollCadence::Exponential { max, .. }) =
            (self.max_interval_ms, &mut policy.cadence)
        {
            *max = Duration::from_millis(ms);
        }
        if let Some(max_attempts) = self.max_attempts {
            policy.max_attempts = max_attempts;
        }
        if let Some(max_errors) = self.max_consecutive_errors {
            policy.max_consecutive_errors = max_errors;
        }
        if let Some(max_elapsed) = self.max_elapsed_ms {
            policy.max_elapsed = Some(Duration::from_millis(max_elapsed));
        }
        policy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Total cycles, including the first submission.
    pub budget: u32,
    pub pause_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            budget: 3,
            pause_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FallbackConfig {
    pub enabled: bool,
    pub content_flag_retries: u32,
    pub content_flag_pause_ms: u64,
    pub content_flag_phrases: Vec<String>,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            content_flag_retries: 3,
            content_flag_pause_ms: 3_000,
            content_flag_phrases: DEFAULT_CONTENT_FLAG_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    pub poll: PollConfig,
    pub retry: RetryConfig,

    /// Per-call bound on each submit / status request.
    pub request_timeout_ms: u64,

    /// Minimum spacing between submissions across all requests; 0 disables.
    pub submit_spacing_ms: u64,

    pub fallback: FallbackConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll: PollConfig::default(),
            retry: RetryConfig::default(),
            request_timeout_ms: 30_000,
            submit_spacing_ms: 0,
            fallback: FallbackConfig::default(),
        }
    }
}

impl DriverConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: DriverConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.budget == 0 {
            return Err(ConfigError::Invalid("retry.budget must be at least 1".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("request_timeout_ms must be positive".into()));
        }
        if self.poll.interval_ms == Some(0) {
            return Err(ConfigError::Invalid("poll.interval_ms must be positive".into()));
        }
        if let Some(factor) = self.poll.backoff_factor {
            if !factor.is_finite() || factor < 1.0 {
                return Err(ConfigError::Invalid(format!(
                    "poll.backoff_factor must be a finite number >= 1.0, got {factor}"
                )));
            }
        }
        if self.poll.max_interval_ms == Some(0) {
            return Err(ConfigError::Invalid("poll.max_interval_ms must be positive".into()));
        }
        let policy = self.poll.to_policy();
        match policy.cadence {
            PollCadence::Fixed(_) if self.poll.max_interval_ms.is_some() => {
                return Err(ConfigError::Invalid(
                    "poll.max_interval_ms needs an exponential cadence (backoff_factor > 1.0)".into(),
                ));
            }
            PollCadence::Exponential { initial, max, .. } if max < initial => {
                return Err(ConfigError::Invalid(format!(
                    "poll.max_interval_ms ({max:?}) is below the initial interval ({initial:?})"
                )));
            }
            _ => {}
        }
        if policy.max_attempts == 0 {
            return Err(ConfigError::Invalid("poll.max_attempts must be at least 1".into()));
        }
        if policy.max_consecutive_errors == 0 {
            return Err(ConfigError::Invalid(
                "poll.max_consecutive_errors must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn poll_policy(&self) -> PollPolicy {
        self.poll.to_policy()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry.budget, Duration::from_millis(self.retry.pause_ms))
    }

    pub fn fallback_policy(&self) -> FallbackPolicy {
        FallbackPolicy {
            enabled: self.fallback.enabled,
            content_flag_retries: self.fallback.content_flag_retries,
            content_flag_pause: Duration::from_millis(self.fallback.content_flag_pause_ms),
            content_flag_phrases: self
                .fallback
                .content_flag_phrases
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn submit_spacing(&self) -> Duration {
        Duration::from_millis(self.submit_spacing_ms)
    }
}
