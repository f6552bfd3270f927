//! Remote task status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic status of a remote task.
///
/// Providers use many labels; all of them collapse into these four.
/// Transitions: `queued -> in-progress -> {succeeded | failed}`.
/// A terminal status never transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Queued,
    InProgress,
    Succeeded,
    Failed,
}

impl TaskStatus {
    /// Map a provider label to a status. Unknown labels return `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        let status = match normalized.as_str() {
            "created" | "queued" | "queuing" | "pending" | "waiting" | "submitted" => {
                TaskStatus::Queued
            }
            "in-progress" | "processing" | "running" | "generating" | "started" => {
                TaskStatus::InProgress
            }
            "succeeded" | "succeed" | "success" | "completed" | "complete" | "done" => {
                TaskStatus::Succeeded
            }
            "failed" | "fail" | "failure" | "error" | "cancelled" | "canceled" => {
                TaskStatus::Failed
            }
            _ => return None,
        };
        Some(status)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }

    /// Whether observing `next` after `self` is a legal transition.
    ///
    /// Non-terminal statuses may be revisited (providers sometimes report
    /// `queued` again after `in-progress`); terminal ones are final.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        !self.is_terminal() || *self == next
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::created("created", TaskStatus::Queued)]
    #[case::waiting("waiting", TaskStatus::Queued)]
    #[case::queuing("queuing", TaskStatus::Queued)]
    #[case::processing("PROCESSING", TaskStatus::InProgress)]
    #[case::snake("in_progress", TaskStatus::InProgress)]
    #[case::success("success", TaskStatus::Succeeded)]
    #[case::completed("Completed", TaskStatus::Succeeded)]
    #[case::fail("fail", TaskStatus::Failed)]
    fn provider_labels_collapse(#[case] label: &str, #[case] expected: TaskStatus) {
        assert_eq!(TaskStatus::from_label(label), Some(expected));
    }

    #[test]
    fn unknown_label_is_none() {
        assert_eq!(TaskStatus::from_label("teleporting"), None);
    }

    #[test]
    fn terminal_statuses_are_final() {
        assert!(TaskStatus::Succeeded.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Succeeded.can_transition_to(TaskStatus::InProgress));
        assert!(!TaskStatus::Failed.can_transition_to(TaskStatus::Succeeded));
        assert!(TaskStatus::InProgress.can_transition_to(TaskStatus::Queued));
        assert!(TaskStatus::Queued.can_transition_to(TaskStatus::Succeeded));
    }

    #[test]
    fn serializes_as_kebab_case() {
        let s = serde_json::to_string(&TaskStatus::InProgress).unwrap();
        assert_eq!(s, "\"in-progress\"");
    }
}
