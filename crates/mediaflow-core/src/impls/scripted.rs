//! ScriptedProvider - 台本どおりに応答する TaskProvider
//!
//! テストと CLI の `simulate` で使う。ネットワークには一切出ない。
//!
//! # 台本の扱い
//! - `with_cycle()` で 1 サイクル分の状態列を追加（投入ごとに次の台本へ進む）
//! - 台本が尽きたら最後のサイクルを繰り返す
//! - 1 サイクル内で状態列が尽きたら最後のステップを繰り返す

use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use crate::domain::{
    PollError, ProviderId, StatusReport, SubmissionPayload, SubmitError, TaskHandle, TaskStatus,
};
use crate::ports::{Credential, TaskProvider};

/// One scripted reply to a status query.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Status(StatusReport),
    Error(PollError),
}

impl ScriptStep {
    pub fn transient(message: impl Into<String>) -> Self {
        ScriptStep::Error(PollError::Transport(message.into()))
    }
}

/// Parses `queued`, `in-progress`, `succeeded`, `failed`, `failed:<message>`
/// and `error`. A scripted success gets a placeholder artifact URL.
impl FromStr for ScriptStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (head, detail) = match s.split_once(':') {
            Some((head, detail)) => (head.trim(), Some(detail.trim())),
            None => (s.trim(), None),
        };
        if head.eq_ignore_ascii_case("error") {
            return Ok(ScriptStep::transient(detail.unwrap_or("simulated transport error")));
        }
        if head.eq_ignore_ascii_case("empty") {
            return Ok(ScriptStep::Status(StatusReport::succeeded(Vec::<String>::new())));
        }
        let status = TaskStatus::from_label(head).ok_or_else(|| format!("unknown script step: {s}"))?;
        let report = match status {
            TaskStatus::Succeeded => StatusReport::succeeded([detail
                .unwrap_or("https://example.invalid/output.mp4")
                .to_string()]),
            TaskStatus::Failed => StatusReport::failed(detail.unwrap_or("simulated failure")),
            other => StatusReport::new(other),
        };
        Ok(ScriptStep::Status(report))
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    cycles: Vec<Vec<ScriptStep>>,
    submit_errors: VecDeque<SubmitError>,
    persistent_submit_error: Option<SubmitError>,
    cursors: HashMap<TaskHandle, (usize, usize)>,
}

pub struct ScriptedProvider {
    id: ProviderId,
    state: Mutex<ScriptState>,
    submit_calls: AtomicU32,
    status_calls: AtomicU32,
    payloads: Mutex<Vec<SubmissionPayload>>,
}

impl ScriptedProvider {
    pub fn new(id: impl Into<ProviderId>) -> Self {
        Self {
            id: id.into(),
            state: Mutex::new(ScriptState::default()),
            submit_calls: AtomicU32::new(0),
            status_calls: AtomicU32::new(0),
            payloads: Mutex::new(Vec::new()),
        }
    }

    /// Append the status sequence for the next submission.
    pub fn with_cycle(self, steps: Vec<ScriptStep>) -> Self {
        self.lock().cycles.push(steps);
        self
    }

    /// Fail the next submission with `err` (queued, one per call).
    pub fn with_submit_error(self, err: SubmitError) -> Self {
        self.lock().submit_errors.push_back(err);
        self
    }

    /// Fail every submission with `err`.
    pub fn always_reject(self, err: SubmitError) -> Self {
        self.lock().persistent_submit_error = Some(err);
        self
    }

    pub fn submit_calls(&self) -> u32 {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<SubmissionPayload> {
        self.payloads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TaskProvider for ScriptedProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    async fn submit(
        &self,
        _credential: &Credential,
        payload: &SubmissionPayload,
    ) -> Result<TaskHandle, SubmitError> {
        let n = self.submit_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.payloads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(payload.clone());

        let mut state = self.lock();
        if let Some(err) = state.submit_errors.pop_front() {
            return Err(err);
        }
        if let Some(err) = &state.persistent_submit_error {
            return Err(err.clone());
        }

        let accepted = state.cursors.len();
        let cycle = accepted.min(state.cycles.len().saturating_sub(1));
        let handle = TaskHandle::new(format!("{}-task-{n}", self.id));
        state.cursors.insert(handle.clone(), (cycle, 0));
        Ok(handle)
    }

    async fn status(
        &self,
        _credential: &Credential,
        task: &TaskHandle,
    ) -> Result<StatusReport, PollError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);

        let mut state = self.lock();
        let (cycle, position) = match state.cursors.get(task) {
            Some(cursor) => *cursor,
            None => {
                return Err(PollError::Http {
                    status: 404,
                    message: format!("unknown task {task}"),
                });
            }
        };
        let step = match state.cycles.get(cycle) {
            Some(steps) if !steps.is_empty() => steps[position.min(steps.len() - 1)].clone(),
            _ => ScriptStep::Status(StatusReport::in_progress()),
        };
        state.cursors.insert(task.clone(), (cycle, position + 1));

        match step {
            ScriptStep::Status(report) => Ok(report),
            ScriptStep::Error(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> SubmissionPayload {
        SubmissionPayload {
            prompt: "p".into(),
            media_urls: vec![],
            options: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn each_submission_gets_its_own_cycle() {
        let provider = ScriptedProvider::new("p")
            .with_cycle(vec![ScriptStep::Status(StatusReport::failed("first"))])
            .with_cycle(vec![ScriptStep::Status(StatusReport::succeeded(["u"]))]);
        let key = Credential::new("k");

        let t1 = provider.submit(&key, &payload()).await.unwrap();
        let t2 = provider.submit(&key, &payload()).await.unwrap();
        assert_ne!(t1, t2);

        assert_eq!(provider.status(&key, &t1).await.unwrap().status, TaskStatus::Failed);
        assert_eq!(provider.status(&key, &t2).await.unwrap().status, TaskStatus::Succeeded);
    }

    #[tokio::test]
    async fn last_step_repeats() {
        let provider = ScriptedProvider::new("p").with_cycle(vec![
            ScriptStep::Status(StatusReport::queued()),
            ScriptStep::Status(StatusReport::in_progress()),
        ]);
        let key = Credential::new("k");
        let task = provider.submit(&key, &payload()).await.unwrap();

        provider.status(&key, &task).await.unwrap();
        for _ in 0..5 {
            assert_eq!(
                provider.status(&key, &task).await.unwrap().status,
                TaskStatus::InProgress
            );
        }
        assert_eq!(provider.status_calls(), 6);
    }

    #[tokio::test]
    async fn queued_submit_errors_come_first() {
        let provider = ScriptedProvider::new("p")
            .with_submit_error(SubmitError::RateLimited("slow".into()))
            .with_cycle(vec![ScriptStep::Status(StatusReport::succeeded(["u"]))]);
        let key = Credential::new("k");

        assert!(provider.submit(&key, &payload()).await.is_err());
        assert!(provider.submit(&key, &payload()).await.is_ok());
        assert_eq!(provider.submit_calls(), 2);
    }

    #[test]
    fn parses_script_steps() {
        assert_eq!(
            "queued".parse::<ScriptStep>().unwrap(),
            ScriptStep::Status(StatusReport::queued())
        );
        assert_eq!(
            "failed: nsfw".parse::<ScriptStep>().unwrap(),
            ScriptStep::Status(StatusReport::failed("nsfw"))
        );
        assert!(matches!("error".parse::<ScriptStep>().unwrap(), ScriptStep::Error(_)));
        assert!("warp".parse::<ScriptStep>().is_err());
    }
}
