//! Outbound HTTP client seams
//!
//! Each external collaborator sits behind an async trait so the
//! orchestration code can be exercised against scripted stand-ins.

pub mod agent;
pub mod cover;
pub mod synth;

pub use agent::{parse_brief, MuseAgent, MuseAgentClient};
pub use cover::{CoverArtist, CoverArtClient};
pub use synth::{JobStatusReport, SynthClient, SynthesisRequest, SynthesisService};

use async_trait::async_trait;
use tonesmith_common::Result;

/// Plain byte download seam, used for produced audio assets
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// reqwest-backed audio fetcher
pub struct HttpAudioFetcher {
    http_client: reqwest::Client,
}

impl HttpAudioFetcher {
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to create HTTP client"),
        }
    }
}

impl Default for HttpAudioFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioFetcher for HttpAudioFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| tonesmith_common::Error::Upstream(format!("Download failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(tonesmith_common::Error::Upstream(format!(
                "Download of {} returned HTTP {}",
                url,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| tonesmith_common::Error::Upstream(format!("Download body failed: {}", e)))?;

        Ok(bytes.to_vec())
    }
}
