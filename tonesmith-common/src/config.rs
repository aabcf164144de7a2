//! Configuration loading for Tonesmith services
//!
//! Resolution order: explicit path in `TONESMITH_CONFIG`, then the user
//! config directory (`<config dir>/tonesmith/config.toml`), then built-in
//! defaults. Secrets may additionally be supplied through environment
//! variables, which take priority over the TOML file.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Top-level configuration for the studio service
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StudioConfig {
    #[serde(default)]
    pub studio: StudioSection,
    #[serde(default)]
    pub synthesis: SynthesisSection,
    #[serde(default)]
    pub agent: AgentSection,
    #[serde(default)]
    pub cover: CoverSection,
    #[serde(default)]
    pub jobs: JobsSection,
}

/// HTTP server and storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudioSection {
    /// Bind host
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Externally reachable base URL, used to build vendor callback
    /// addresses (e.g. "https://studio.example.com")
    pub public_base_url: String,
    /// Directory for downloaded audio and cover images
    pub storage_dir: PathBuf,
    /// SQLite database file
    pub database_path: PathBuf,
}

impl Default for StudioSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5840,
            public_base_url: "http://127.0.0.1:5840".to_string(),
            storage_dir: PathBuf::from("media/tracks"),
            database_path: PathBuf::from("tonesmith.db"),
        }
    }
}

/// Music-synthesis vendor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisSection {
    pub api_base: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for SynthesisSection {
    fn default() -> Self {
        Self {
            api_base: "https://api.sunoapi.org".to_string(),
            api_key: None,
        }
    }
}

/// Conversational-agent vendor settings (OpenAI-compatible chat API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    pub api_base: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
        }
    }
}

/// Cover-image vendor settings (OpenAI-compatible images API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverSection {
    pub api_base: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub model: String,
}

impl Default for CoverSection {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "dall-e-3".to_string(),
        }
    }
}

/// Job polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsSection {
    /// Seconds between status polls for an outstanding synthesis job
    pub poll_interval_secs: u64,
}

impl Default for JobsSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: 10,
        }
    }
}

impl StudioConfig {
    /// Load configuration from disk and the environment
    ///
    /// A missing config file is not an error (defaults apply); an
    /// unreadable or malformed file is.
    pub fn load() -> Result<Self> {
        let mut config = match config_file_path() {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "Loading configuration file");
                let raw = std::fs::read_to_string(&path)?;
                toml::from_str(&raw)
                    .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?
            }
            _ => {
                info!("No configuration file found, using defaults");
                StudioConfig::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment-variable overrides (ENV beats TOML)
    pub fn apply_env_overrides(&mut self) {
        override_key(
            "TONESMITH_SYNTHESIS_API_KEY",
            "synthesis",
            &mut self.synthesis.api_key,
        );
        override_key("TONESMITH_AGENT_API_KEY", "agent", &mut self.agent.api_key);
        override_key("TONESMITH_COVER_API_KEY", "cover", &mut self.cover.api_key);

        if let Ok(url) = std::env::var("TONESMITH_PUBLIC_BASE_URL") {
            self.studio.public_base_url = url;
        }
        if let Ok(dir) = std::env::var("TONESMITH_STORAGE_DIR") {
            self.studio.storage_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var("TONESMITH_DATABASE_PATH") {
            self.studio.database_path = PathBuf::from(path);
        }
    }

    /// Validate settings that have no usable default
    pub fn validate(&self) -> Result<()> {
        if self.studio.public_base_url.is_empty() {
            return Err(Error::Config("studio.public_base_url must not be empty".into()));
        }
        if self.jobs.poll_interval_secs == 0 {
            return Err(Error::Config("jobs.poll_interval_secs must be at least 1".into()));
        }
        Ok(())
    }

    /// Socket address string for the HTTP listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.studio.host, self.studio.port)
    }
}

fn override_key(var: &str, section: &str, slot: &mut Option<String>) {
    if let Ok(value) = std::env::var(var) {
        if !value.trim().is_empty() {
            if slot.is_some() {
                warn!(
                    "{} API key found in both environment and config file; using environment",
                    section
                );
            }
            *slot = Some(value);
        }
    }
}

fn config_file_path() -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var("TONESMITH_CONFIG") {
        return Some(PathBuf::from(explicit));
    }
    dirs::config_dir().map(|d| d.join("tonesmith").join("config.toml"))
}
