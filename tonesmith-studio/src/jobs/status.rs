//! Synthesis job status vocabulary
//!
//! The vendor reports status as one of a fixed set of tags. Tags outside
//! the known vocabulary are carried through verbatim and treated as
//! non-terminal, so a vendor-side addition degrades to "keep polling"
//! rather than a parse failure.

use serde::{Deserialize, Serialize};

/// Status of one synthesis job as reported by the vendor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobStatus {
    Initializing,
    Pending,
    TextSuccess,
    FirstSuccess,
    Success,
    CreateTaskFailed,
    GenerateAudioFailed,
    CallbackException,
    SensitiveWordError,
    Error,
    /// Unrecognized vendor tag, carried verbatim; never terminal
    Other(String),
}

impl JobStatus {
    /// Terminal states stop polling
    pub fn is_terminal(&self) -> bool {
        self.is_success() || self.is_failure()
    }

    /// Success-terminal: the asset list is available for reconciliation
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::FirstSuccess)
    }

    /// Failure-terminal: polling stops and no persistence happens
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            JobStatus::CreateTaskFailed
                | JobStatus::GenerateAudioFailed
                | JobStatus::CallbackException
                | JobStatus::SensitiveWordError
                | JobStatus::Error
        )
    }

    /// Vendor wire tag for this status
    pub fn as_str(&self) -> &str {
        match self {
            JobStatus::Initializing => "INITIALIZING",
            JobStatus::Pending => "PENDING",
            JobStatus::TextSuccess => "TEXT_SUCCESS",
            JobStatus::FirstSuccess => "FIRST_SUCCESS",
            JobStatus::Success => "SUCCESS",
            JobStatus::CreateTaskFailed => "CREATE_TASK_FAILED",
            JobStatus::GenerateAudioFailed => "GENERATE_AUDIO_FAILED",
            JobStatus::CallbackException => "CALLBACK_EXCEPTION",
            JobStatus::SensitiveWordError => "SENSITIVE_WORD_ERROR",
            JobStatus::Error => "ERROR",
            JobStatus::Other(tag) => tag,
        }
    }
}

impl From<String> for JobStatus {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "INITIALIZING" => JobStatus::Initializing,
            "PENDING" => JobStatus::Pending,
            "TEXT_SUCCESS" => JobStatus::TextSuccess,
            "FIRST_SUCCESS" => JobStatus::FirstSuccess,
            "SUCCESS" => JobStatus::Success,
            "CREATE_TASK_FAILED" => JobStatus::CreateTaskFailed,
            "GENERATE_AUDIO_FAILED" => JobStatus::GenerateAudioFailed,
            "CALLBACK_EXCEPTION" => JobStatus::CallbackException,
            "SENSITIVE_WORD_ERROR" => JobStatus::SensitiveWordError,
            "ERROR" => JobStatus::Error,
            _ => JobStatus::Other(tag),
        }
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::str::FromStr for JobStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(JobStatus::from(s.to_string()))
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
