//! Music-synthesis vendor client
//!
//! Wire contract (vendor envelopes):
//! - Submit: `POST /api/v1/generate` → `{ code, msg, data: { taskId } }`
//! - Status: `GET /api/v1/generate/record-info?taskId=...` →
//!   `{ code, data: { status | response: { status, sunoData: [...] } } }`
//!
//! Non-200 vendor `code` values and transport failures both surface as
//! `Error::Upstream`; the poller treats those as non-terminal.

use crate::jobs::status::JobStatus;
use crate::models::ProducedAsset;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tonesmith_common::{Error, Result};
use tracing::debug;

/// Default timeout for synthesis API requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// One synthesis submission
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisRequest {
    /// Sung text
    pub lyrics: String,
    /// Sonic description (genre, mood, instrumentation)
    pub style: String,
    /// Display title
    pub title: String,
    /// Where the vendor should POST the completion callback
    pub callback_url: String,
}

/// Parsed outcome of one status query
#[derive(Debug, Clone)]
pub struct JobStatusReport {
    pub status: JobStatus,
    /// Produced assets; populated only when the vendor includes them
    pub assets: Vec<ProducedAsset>,
    /// Vendor envelope verbatim, reflected to UI status callers
    pub raw: serde_json::Value,
}

/// Synthesis vendor seam
#[async_trait]
pub trait SynthesisService: Send + Sync {
    /// Submit a generation request, returning the vendor job id
    async fn submit(&self, request: &SynthesisRequest) -> Result<String>;

    /// Query the status of a submitted job
    async fn status(&self, job_id: &str) -> Result<JobStatusReport>;
}

/// reqwest-backed synthesis client
pub struct SynthClient {
    http_client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
}

impl SynthClient {
    pub fn new(api_base: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            api_base: api_base.into(),
            api_key,
        }
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl SynthesisService for SynthClient {
    async fn submit(&self, request: &SynthesisRequest) -> Result<String> {
        let url = format!("{}/api/v1/generate", self.api_base);
        debug!(title = %request.title, "Submitting synthesis request");

        let body = serde_json::json!({
            "prompt": request.lyrics,
            "style": request.style,
            "title": request.title,
            "customMode": true,
            "instrumental": false,
            "callBackUrl": request.callback_url,
        });

        let response = self
            .authorize(self.http_client.post(&url).json(&body))
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Synthesis submit failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "Synthesis submit returned HTTP {}",
                response.status()
            )));
        }

        let envelope: SubmitEnvelope = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Synthesis submit reply unreadable: {}", e)))?;

        if envelope.code != 200 {
            return Err(Error::Upstream(format!(
                "Synthesis submit rejected (code {}): {}",
                envelope.code,
                envelope.msg.unwrap_or_default()
            )));
        }

        envelope
            .data
            .and_then(|d| d.task_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::Upstream("Synthesis submit reply had no task id".to_string()))
    }

    async fn status(&self, job_id: &str) -> Result<JobStatusReport> {
        let url = format!(
            "{}/api/v1/generate/record-info?taskId={}",
            self.api_base, job_id
        );
        debug!(job_id = %job_id, "Querying synthesis job status");

        let response = self
            .authorize(self.http_client.get(&url))
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Status query failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "Status query returned HTTP {}",
                response.status()
            )));
        }

        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Status reply unreadable: {}", e)))?;

        parse_status_report(job_id, raw)
    }
}

/// Parse a status envelope into a report
///
/// The status tag lives either at `data.status` or `data.response.status`
/// depending on how far the job has progressed; assets live at
/// `data.response.sunoData`.
pub fn parse_status_report(job_id: &str, raw: serde_json::Value) -> Result<JobStatusReport> {
    let envelope: StatusEnvelope = serde_json::from_value(raw.clone())
        .map_err(|e| Error::Upstream(format!("Status envelope malformed: {}", e)))?;

    if envelope.code != 200 {
        return Err(Error::Upstream(format!(
            "Status query rejected (code {}): {}",
            envelope.code,
            envelope.msg.unwrap_or_default()
        )));
    }

    let data = envelope
        .data
        .ok_or_else(|| Error::Upstream("Status reply had no data".to_string()))?;

    let tag = data
        .status
        .or_else(|| data.response.as_ref().and_then(|r| r.status.clone()))
        .ok_or_else(|| Error::Upstream("Status reply had no status tag".to_string()))?;
    let status = JobStatus::from(tag);

    let assets = data
        .response
        .map(|r| {
            r.suno_data
                .into_iter()
                .filter_map(|item| item.into_asset(job_id))
                .collect()
        })
        .unwrap_or_default();

    Ok(JobStatusReport { status, assets, raw })
}

#[derive(Debug, Deserialize)]
struct SubmitEnvelope {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<SubmitData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SubmitData {
    task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusEnvelope {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Option<StatusData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StatusData {
    status: Option<String>,
    response: Option<StatusResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StatusResponse {
    status: Option<String>,
    suno_data: Vec<RawAssetItem>,
}

/// One produced-asset entry as the vendor reports it in status replies
/// (camelCase) or completion callbacks (snake_case)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawAssetItem {
    #[serde(alias = "audioUrl")]
    pub audio_url: Option<String>,
    #[serde(alias = "sourceAudioUrl")]
    pub source_audio_url: Option<String>,
    pub title: Option<String>,
    pub prompt: Option<String>,
    pub lyrics: Option<String>,
    pub tags: Option<String>,
    pub duration: Option<f64>,
}

impl RawAssetItem {
    /// Convert to a [`ProducedAsset`], preferring `audio_url` over
    /// `source_audio_url`. Items with neither are dropped.
    pub fn into_asset(self, job_id: &str) -> Option<ProducedAsset> {
        let audio_url = self
            .audio_url
            .filter(|u| !u.is_empty())
            .or(self.source_audio_url.filter(|u| !u.is_empty()))?;

        Some(ProducedAsset {
            audio_url,
            title: self.title,
            prompt: self.prompt,
            lyrics: self.lyrics,
            tags: self.tags,
            duration: self.duration,
            source_job_id: job_id.to_string(),
        })
    }
}

/// Completion-callback envelope (inbound push from the vendor)
#[derive(Debug, Deserialize)]
pub struct CallbackEnvelope {
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Option<CallbackData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CallbackData {
    #[serde(alias = "taskId")]
    pub task_id: Option<String>,
    #[serde(alias = "callbackType")]
    pub callback_type: Option<String>,
    pub data: Vec<RawAssetItem>,
}
