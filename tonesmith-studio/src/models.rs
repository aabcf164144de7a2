//! Domain models for the studio service

use crate::jobs::status::JobStatus;
use serde::{Deserialize, Serialize};

/// One raw result item returned by the synthesis vendor for a job
///
/// `audio_url` is the deduplication key: the reconciler never persists two
/// records for the same URL, within one pass or across repeated passes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProducedAsset {
    /// Vendor URL of the produced audio (required)
    pub audio_url: String,
    /// Display title, if the vendor supplied one
    pub title: Option<String>,
    /// Free-text generation prompt as reported by the vendor
    pub prompt: Option<String>,
    /// Sung lyrics, when the vendor separates them from the prompt
    pub lyrics: Option<String>,
    /// Vendor style tags (comma-separated free text)
    pub tags: Option<String>,
    /// Track duration in seconds
    pub duration: Option<f64>,
    /// Synthesis job that produced this asset
    pub source_job_id: String,
}

/// Structured creative brief returned by the conversational agent
///
/// All four fields are required; a reply missing any of them is a parse
/// failure and no track is created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackBrief {
    /// Short description of the track for display and cover generation
    pub prompt: String,
    /// Sonic description submitted to the synthesis vendor
    pub style: String,
    /// Track title
    pub title: String,
    /// Sung text submitted to the synthesis vendor
    pub lyrics: String,
}

/// One outstanding synthesis request
///
/// Lives only in the poller's in-memory registry; removed once a terminal
/// state is reached and downstream work has been dispatched.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationJob {
    /// Vendor-assigned job identifier
    pub job_id: String,
    /// Foundry the job belongs to
    pub foundry_id: uuid::Uuid,
    /// Last observed status
    pub status: JobStatus,
    /// Display label shown while the job is in flight
    pub title: String,
    /// When the job was registered with the poller
    pub created_at: chrono::DateTime<chrono::Utc>,
}
