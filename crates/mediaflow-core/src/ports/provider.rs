//! TaskProvider port - 外部の生成 API
//!
//! 1 つの provider は「投入」と「状態取得」の 2 操作だけを持つ。
//! リトライ・ポーリング・フォールバックはすべて app 層の責務。
//!
//! # 実装
//! - `HttpTaskProvider`: reqwest による HTTP 実装
//! - `ScriptedProvider`: テスト・デモ用の台本どおりに応答する実装

use async_trait::async_trait;

use super::credentials::Credential;
use crate::domain::{PollError, ProviderId, StatusReport, SubmissionPayload, SubmitError, TaskHandle};

#[async_trait]
pub trait TaskProvider: Send + Sync {
    fn id(&self) -> &ProviderId;

    /// Create exactly one remote job. Never retries internally.
    async fn submit(
        &self,
        credential: &Credential,
        payload: &SubmissionPayload,
    ) -> Result<TaskHandle, SubmitError>;

    /// Query the current status of `task`. Every error is transient from
    /// the poller's point of view.
    async fn status(
        &self,
        credential: &Credential,
        task: &TaskHandle,
    ) -> Result<StatusReport, PollError>;
}
