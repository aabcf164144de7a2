//! Cover-image generation client
//!
//! Generates album art for a finished track via an OpenAI-compatible
//! images API, then downloads the produced image bytes. Cover generation
//! is best-effort: callers treat failures as non-fatal.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tonesmith_common::{Error, Result};
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

/// Cover-art collaborator seam
#[async_trait]
pub trait CoverArtist: Send + Sync {
    /// Generate a cover image for the prompt and return its bytes
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>>;
}

/// reqwest-backed image-generation client
pub struct CoverArtClient {
    http_client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl CoverArtClient {
    pub fn new(api_base: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            api_base: api_base.into(),
            api_key,
            model: model.into(),
        }
    }
}

#[async_trait]
impl CoverArtist for CoverArtClient {
    async fn generate(&self, prompt: &str) -> Result<Vec<u8>> {
        let url = format!("{}/images/generations", self.api_base);
        debug!(model = %self.model, "Requesting cover image");

        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "n": 1,
            "size": "1024x1024",
        });

        let mut request = self.http_client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Cover generation failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "Cover generation returned HTTP {}",
                response.status()
            )));
        }

        let generated: ImageResponse = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Cover reply unreadable: {}", e)))?;

        let image_url = generated
            .data
            .into_iter()
            .next()
            .and_then(|d| d.url)
            .ok_or_else(|| Error::Upstream("Cover reply had no image URL".to_string()))?;

        let image = self
            .http_client
            .get(&image_url)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Cover download failed: {}", e)))?;

        if !image.status().is_success() {
            return Err(Error::Upstream(format!(
                "Cover download returned HTTP {}",
                image.status()
            )));
        }

        let bytes = image
            .bytes()
            .await
            .map_err(|e| Error::Upstream(format!("Cover download body failed: {}", e)))?;

        Ok(bytes.to_vec())
    }
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageItem>,
}

#[derive(Debug, Deserialize)]
struct ImageItem {
    #[serde(default)]
    url: Option<String>,
}
