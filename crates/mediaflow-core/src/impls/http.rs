//! HttpTaskProvider - reqwest による TaskProvider 実装
//!
//! 1 つの設定（`HttpProviderConfig`）が 1 つのベンダー API に対応する。
//! レスポンスの形の違いは `Dialect` が吸収する。
//!
//! # エラーの振り分け
//! - 投入: HTTP ステータス / 本文の `code` を `SubmitError::from_status` で分類
//! - 状態取得: 失敗はすべて `PollError`（Poller 側で一時エラーとして数える）

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use super::dialect::Dialect;
use crate::config::ConfigError;
use crate::domain::{PollError, ProviderId, StatusReport, SubmissionPayload, SubmitError, TaskHandle};
use crate::ports::{Credential, TaskProvider};

const TASK_ID_PLACEHOLDER: &str = "{task_id}";

fn default_submit_path() -> String {
    "/api/v1/jobs/createTask".to_string()
}

fn default_status_path() -> String {
    "/api/v1/jobs/recordInfo?taskId={task_id}".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

/// One HTTP provider.
///
/// ```json
/// { "id": "kling", "base_url": "https://api.example.com", "model": "kling-2.6/motion-control" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpProviderConfig {
    pub id: ProviderId,
    pub base_url: String,

    #[serde(default = "default_submit_path")]
    pub submit_path: String,

    /// Must contain `{task_id}`.
    #[serde(default = "default_status_path")]
    pub status_path: String,

    #[serde(default)]
    pub dialect: Dialect,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl HttpProviderConfig {
    pub fn new(id: impl Into<ProviderId>, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            submit_path: default_submit_path(),
            status_path: default_status_path(),
            dialect: Dialect::default(),
            model: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }

    /// Read a JSON array of provider configs.
    pub fn load_all(path: impl AsRef<Path>) -> Result<Vec<Self>, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let configs: Vec<Self> = serde_json::from_str(&raw)?;
        for config in &configs {
            config.validate()?;
        }
        Ok(configs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.as_str().trim().is_empty() {
            return Err(ConfigError::Invalid("provider id must not be empty".into()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "provider {}: base_url must be an http(s) URL, got {:?}",
                self.id, self.base_url
            )));
        }
        if !self.status_path.contains(TASK_ID_PLACEHOLDER) {
            return Err(ConfigError::Invalid(format!(
                "provider {}: status_path must contain {TASK_ID_PLACEHOLDER}",
                self.id
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(format!(
                "provider {}: request_timeout_ms must be positive",
                self.id
            )));
        }
        self.status_url(&TaskHandle::new("task"))?;
        Ok(())
    }

    pub fn submit_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.submit_path)
    }

    /// Status endpoint for `task`. The handle is percent-encoded for where
    /// it lands: a path segment or a query value.
    pub fn status_url(&self, task: &TaskHandle) -> Result<Url, ConfigError> {
        let invalid = |reason: String| {
            ConfigError::Invalid(format!("provider {}: {reason}", self.id))
        };
        let (path, query) = match self.status_path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (self.status_path.as_str(), None),
        };

        let mut url = Url::parse(&self.base_url).map_err(|err| invalid(format!("base_url: {err}")))?;
        url.path_segments_mut()
            .map_err(|()| invalid("base_url cannot carry a path".into()))?
            .pop_if_empty()
            .extend(
                path.split('/')
                    .filter(|segment| !segment.is_empty())
                    .map(|segment| segment.replace(TASK_ID_PLACEHOLDER, task.as_str())),
            );
        if let Some(query) = query {
            let mut pairs = url.query_pairs_mut();
            for pair in query.split('&').filter(|pair| !pair.is_empty()) {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                pairs.append_pair(key, &value.replace(TASK_ID_PLACEHOLDER, task.as_str()));
            }
        }
        Ok(url)
    }

    /// Request body for a submission: `{"model": ..., "input": {...}}`.
    ///
    /// Object options are merged into `input`; anything else is passed as
    /// `input.options`.
    pub fn submission_body(&self, payload: &SubmissionPayload) -> Value {
        let mut input = Map::new();
        input.insert("prompt".into(), Value::String(payload.prompt.clone()));
        if !payload.media_urls.is_empty() {
            input.insert("media_urls".into(), json!(payload.media_urls));
        }
        match &payload.options {
            Value::Null => {}
            Value::Object(options) => {
                for (key, value) in options {
                    input.insert(key.clone(), value.clone());
                }
            }
            other => {
                input.insert("options".into(), other.clone());
            }
        }

        let mut body = Map::new();
        if let Some(model) = &self.model {
            body.insert("model".into(), Value::String(model.clone()));
        }
        body.insert("input".into(), Value::Object(input));
        Value::Object(body)
    }
}

pub struct HttpTaskProvider {
    config: HttpProviderConfig,
    client: Client,
}

impl HttpTaskProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &HttpProviderConfig {
        &self.config
    }
}

#[async_trait]
impl TaskProvider for HttpTaskProvider {
    fn id(&self) -> &ProviderId {
        &self.config.id
    }

    async fn submit(
        &self,
        credential: &Credential,
        payload: &SubmissionPayload,
    ) -> Result<TaskHandle, SubmitError> {
        let url = self.config.submit_url();
        debug!(provider = %self.config.id, %url, "submitting task");

        let response = self
            .client
            .post(&url)
            .bearer_auth(credential.expose())
            .json(&self.config.submission_body(payload))
            .send()
            .await
            .map_err(|err| SubmitError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| SubmitError::Transport(err.to_string()))?;
        if !status.is_success() {
            return Err(SubmitError::from_status(status.as_u16(), body));
        }

        self.config
            .dialect
            .parse(&body)
            .map_err(|err| SubmitError::MalformedResponse(err.to_string()))?
            .into_task_handle()
    }

    async fn status(
        &self,
        credential: &Credential,
        task: &TaskHandle,
    ) -> Result<StatusReport, PollError> {
        let url = self
            .config
            .status_url(task)
            .map_err(|err| PollError::Transport(err.to_string()))?;
        let response = self
            .client
            .get(url)
            .bearer_auth(credential.expose())
            .send()
            .await
            .map_err(|err| PollError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| PollError::Transport(err.to_string()))?;
        if !status.is_success() {
            return Err(PollError::Http {
                status: status.as_u16(),
                message: body,
            });
        }

        self.config
            .dialect
            .parse(&body)
            .map_err(|err| PollError::Decode(err.to_string()))?
            .into_status_report()
    }
}
