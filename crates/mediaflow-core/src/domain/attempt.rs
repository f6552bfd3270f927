//! Cycle history: one record per submit+poll cycle.
//!
//! This is what lets a caller explain a result afterwards ("two failures on
//! the primary, then the fallback succeeded").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::FailureKind;
use super::ids::{CycleId, ProviderId, TaskHandle};
use super::outcome::CycleOutcome;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub cycle_id: CycleId,
    pub provider: ProviderId,

    /// 1-based index within one orchestrator run.
    pub cycle: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskHandle>,

    pub succeeded: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl CycleRecord {
    pub fn new(
        cycle_id: CycleId,
        provider: ProviderId,
        cycle: u32,
        outcome: &CycleOutcome,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            cycle_id,
            provider,
            cycle,
            task_id: outcome.task().cloned(),
            succeeded: outcome.is_success(),
            failure_kind: outcome.failure_kind(),
            message: outcome.failure_message(),
            started_at,
            finished_at,
        }
    }
}
