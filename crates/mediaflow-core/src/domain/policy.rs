//! Timing policies: poll cadence, poll caps and the cycle retry budget.
//! Also the phrase list that marks a content-moderation rejection.

use std::time::Duration;

/// Spacing between status queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PollCadence {
    Fixed(Duration),

    /// `initial * factor^(n-1)`, capped at `max`.
    Exponential {
        initial: Duration,
        factor: f64,
        max: Duration,
    },
}

impl PollCadence {
    /// Delay to wait after the `attempt`-th query (1-indexed).
    ///
    /// Example with initial=1s, factor=2.0, max=10s:
    /// 1s, 2s, 4s, 8s, 10s, 10s, ...
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match *self {
            PollCadence::Fixed(interval) => interval,
            PollCadence::Exponential {
                initial,
                factor,
                max,
            } => {
                let exponent = attempt.saturating_sub(1).min(64) as i32;
                let secs = initial.as_secs_f64() * factor.powi(exponent);
                if !secs.is_finite() || secs >= max.as_secs_f64() {
                    max
                } else {
                    Duration::from_secs_f64(secs)
                }
            }
        }
    }
}

/// Bounds for one poll loop.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub cadence: PollCadence,

    /// Hard cap on status queries.
    pub max_attempts: u32,

    /// Consecutive transient errors tolerated before giving up.
    pub max_consecutive_errors: u32,

    /// Optional wall-clock cap, measured from the first query.
    pub max_elapsed: Option<Duration>,
}

impl PollPolicy {
    /// Multi-minute video jobs: every 5s, up to an hour.
    pub fn video() -> Self {
        Self {
            cadence: PollCadence::Fixed(Duration::from_secs(5)),
            max_attempts: 720,
            max_consecutive_errors: 15,
            max_elapsed: None,
        }
    }

    /// Still-image generation: every 5s, up to ten minutes.
    pub fn image() -> Self {
        Self {
            cadence: PollCadence::Fixed(Duration::from_secs(5)),
            max_attempts: 120,
            max_consecutive_errors: 10,
            max_elapsed: None,
        }
    }

    /// Short image edits: fast exponential backoff, small cap.
    pub fn quick_edit() -> Self {
        Self {
            cadence: PollCadence::Exponential {
                initial: Duration::from_secs(1),
                factor: 2.0,
                max: Duration::from_secs(10),
            },
            max_attempts: 60,
            max_consecutive_errors: 10,
            max_elapsed: None,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::video()
    }
}

/// Cycle-level retry budget.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total submit+poll cycles allowed (including the first one).
    pub budget: u32,

    /// Pause before a fresh submission.
    pub pause: Duration,
}

impl RetryPolicy {
    pub fn new(budget: u32, pause: Duration) -> Self {
        Self { budget, pause }
    }

    /// No retries: one cycle only.
    pub fn single_cycle() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn has_budget_after(&self, cycle: u32) -> bool {
        cycle < self.budget
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(3))
    }
}

/// Default phrases that mark a content-moderation rejection.
pub const DEFAULT_CONTENT_FLAG_PHRASES: &[&str] = &[
    "content policy",
    "flagged",
    "sensitive content",
    "nsfw",
    "moderation",
];

/// Case-insensitive match of a failure message against moderation phrases.
pub fn is_content_flag(message: &str, phrases: &[String]) -> bool {
    let message = message.to_lowercase();
    phrases
        .iter()
        .any(|phrase| !phrase.is_empty() && message.contains(&phrase.to_lowercase()))
}
