//! Provider response dialects.
//!
//! Vendors wrap the same information in different shapes. Each dialect gets
//! one serde model plus one normalization into `TaskHandle` / `StatusReport`;
//! nothing outside this module looks at raw vendor JSON.
//!
//! - `envelope`: `{"code": 200, "msg": "...", "data": {"taskId": ..., "state": ..., "resultUrls": [...]}}`.
//!   The in-body `code` is authoritative even when HTTP says 200.
//! - `flat`: `{"id": ..., "status": ..., "output": <url | [url]>, "error": ...}`.

use serde::{Deserialize, Serialize};

use crate::domain::{
    PollError, ResultMetadata, StatusReport, SubmitError, TaskHandle, TaskStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    #[default]
    Envelope,
    Flat,
}

impl Dialect {
    pub fn parse(self, body: &str) -> Result<ProviderResponse, serde_json::Error> {
        match self {
            Dialect::Envelope => serde_json::from_str(body).map(ProviderResponse::Envelope),
            Dialect::Flat => serde_json::from_str(body).map(ProviderResponse::Flat),
        }
    }
}

/// A decoded provider body, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResponse {
    Envelope(EnvelopeBody),
    Flat(FlatBody),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnvelopeBody {
    #[serde(default)]
    pub code: Option<u16>,

    #[serde(default)]
    pub msg: Option<String>,

    #[serde(default)]
    pub data: Option<EnvelopeData>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeData {
    #[serde(default)]
    pub task_id: Option<String>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub result_urls: Vec<String>,

    /// Some vendors nest the result as a JSON string: `{"resultUrls": [...]}`.
    #[serde(default)]
    pub result_json: Option<String>,

    #[serde(default)]
    pub fail_code: Option<String>,

    #[serde(default)]
    pub fail_msg: Option<String>,

    #[serde(default)]
    pub cost_time: Option<u64>,

    #[serde(default)]
    pub duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NestedResult {
    #[serde(default)]
    result_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FlatBody {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub output: Option<FlatOutput>,

    #[serde(default)]
    pub error: Option<String>,

    #[serde(default)]
    pub metrics: Option<FlatMetrics>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FlatOutput {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FlatMetrics {
    #[serde(default)]
    pub predict_time: Option<f64>,
}

impl ProviderResponse {
    /// Extract the handle from a submission response.
    pub fn into_task_handle(self) -> Result<TaskHandle, SubmitError> {
        let task_id = match self {
            ProviderResponse::Envelope(body) => {
                check_envelope_code(body.code, body.msg.as_deref(), |status, message| {
                    SubmitError::from_status(status, message)
                })?;
                body.data.and_then(|d| d.task_id)
            }
            ProviderResponse::Flat(body) => {
                if let Some(error) = body.error.filter(|e| !e.is_empty()) {
                    return Err(SubmitError::Rejected {
                        status: 200,
                        message: error,
                    });
                }
                body.id
            }
        };
        task_id
            .filter(|id| !id.trim().is_empty())
            .map(TaskHandle::new)
            .ok_or_else(|| SubmitError::MalformedResponse("missing task id".into()))
    }

    /// Normalize a status response.
    pub fn into_status_report(self) -> Result<StatusReport, PollError> {
        match self {
            ProviderResponse::Envelope(body) => {
                check_envelope_code(body.code, body.msg.as_deref(), |status, message| {
                    PollError::Http {
                        status,
                        message: message.to_string(),
                    }
                })?;
                let data = body
                    .data
                    .ok_or_else(|| PollError::Decode("envelope has no data".into()))?;
                envelope_report(data)
            }
            ProviderResponse::Flat(body) => flat_report(body),
        }
    }
}

fn check_envelope_code<E>(
    code: Option<u16>,
    msg: Option<&str>,
    classify: impl FnOnce(u16, &str) -> E,
) -> Result<(), E> {
    match code {
        None | Some(200) | Some(0) => Ok(()),
        Some(code) => Err(classify(code, msg.unwrap_or("provider error"))),
    }
}

fn status_from(label: Option<&str>) -> Result<TaskStatus, PollError> {
    let label = label.ok_or_else(|| PollError::Decode("missing status".into()))?;
    TaskStatus::from_label(label)
        .ok_or_else(|| PollError::Decode(format!("unknown status label {label:?}")))
}

fn envelope_report(data: EnvelopeData) -> Result<StatusReport, PollError> {
    let status = status_from(data.state.as_deref())?;

    let mut artifacts = data.result_urls;
    if artifacts.is_empty() {
        if let Some(raw) = data.result_json.as_deref().filter(|raw| !raw.is_empty()) {
            let nested: NestedResult = serde_json::from_str(raw)
                .map_err(|err| PollError::Decode(format!("resultJson: {err}")))?;
            artifacts = nested.result_urls;
        }
    }

    Ok(StatusReport {
        status,
        artifacts,
        error_code: data.fail_code.filter(|c| !c.is_empty()),
        error_message: data.fail_msg.filter(|m| !m.is_empty()),
        metadata: ResultMetadata {
            cost_time_ms: data.cost_time,
            duration_secs: data.duration,
        },
    })
}

fn flat_report(body: FlatBody) -> Result<StatusReport, PollError> {
    let status = status_from(body.status.as_deref())?;
    let artifacts = match body.output {
        Some(FlatOutput::One(url)) => vec![url],
        Some(FlatOutput::Many(urls)) => urls,
        None => Vec::new(),
    };

    Ok(StatusReport {
        status,
        artifacts,
        error_code: None,
        error_message: body.error.filter(|e| !e.is_empty()),
        metadata: ResultMetadata {
            cost_time_ms: body
                .metrics
                .and_then(|m| m.predict_time)
                .map(|secs| (secs * 1000.0).round() as u64),
            duration_secs: None,
        },
    })
}
