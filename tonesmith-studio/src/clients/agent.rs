//! Conversational-agent client
//!
//! Asks the foundry's agent (an OpenAI-compatible chat API) to turn a
//! user's creative request into a structured track brief. The instruction
//! forces a JSON-only reply; [`parse_brief`] accepts both a structured
//! value and a JSON-encoded string, since models return either.

use crate::models::TrackBrief;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tonesmith_common::{Error, Result};
use tracing::debug;

/// Default timeout for agent requests (model replies can be slow)
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// System instruction forcing the JSON-only brief reply
const BRIEF_INSTRUCTION: &str = "You are a musician persona composing a song for the user. \
Reply with ONLY a JSON object, no prose and no code fences, containing exactly these string \
fields: \"prompt\" (a one-sentence description of the track), \"style\" (genre, mood and \
instrumentation), \"title\" (a short track title), \"lyrics\" (the full sung text).";

/// Conversational-agent seam
#[async_trait]
pub trait MuseAgent: Send + Sync {
    /// Send the user's prompt and return the agent's raw reply text
    async fn compose_brief(&self, user_prompt: &str) -> Result<String>;
}

/// reqwest-backed chat-completion client
pub struct MuseAgentClient {
    http_client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
}

impl MuseAgentClient {
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
impl MuseAgent for MuseAgentClient {
    async fn compose_brief(&self, user_prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_base);
        debug!(model = %self.model, "Requesting track brief from agent");

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": BRIEF_INSTRUCTION },
                { "role": "user", "content": user_prompt },
            ],
        });

        let mut request = self.http_client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Agent request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "Agent returned HTTP {}",
                response.status()
            )));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Agent reply unreadable: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Upstream("Agent reply had no choices".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Parse the agent's reply into a [`TrackBrief`]
///
/// The reply may be the JSON object itself or a JSON string containing the
/// object (double encoding). Code fences around the object are tolerated.
/// Missing fields fail with a descriptive parse error.
pub fn parse_brief(reply: &str) -> Result<TrackBrief> {
    let trimmed = strip_code_fences(reply.trim());

    let mut value: serde_json::Value = serde_json::from_str(trimmed)
        .map_err(|e| Error::Parse(format!("Agent reply is not valid JSON: {}", e)))?;

    // A JSON-encoded string holding the object: unwrap one level
    if let serde_json::Value::String(inner) = &value {
        value = serde_json::from_str(inner)
            .map_err(|e| Error::Parse(format!("Agent reply string is not valid JSON: {}", e)))?;
    }

    let object = value
        .as_object()
        .ok_or_else(|| Error::Parse("Agent reply is not a JSON object".to_string()))?;

    let field = |name: &str| -> Result<String> {
        object
            .get(name)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| Error::Parse(format!("Agent reply missing field \"{}\"", name)))
    };

    Ok(TrackBrief {
        prompt: field("prompt")?,
        style: field("style")?,
        title: field("title")?,
        lyrics: field("lyrics")?,
    })
}

fn strip_code_fences(reply: &str) -> &str {
    let reply = reply
        .strip_prefix("```json")
        .or_else(|| reply.strip_prefix("```"))
        .unwrap_or(reply);
    reply.strip_suffix("```").unwrap_or(reply).trim()
}
