//! Thinking-step webhook ingestion
//!
//! The foundry's autonomous-thinking collaborator pushes its intermediate
//! steps here; valid steps are published onto the foundry's event channel
//! for any live stream subscribers.

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tonesmith_common::events::ThinkingEvent;
use tracing::debug;
use uuid::Uuid;

/// Inbound thinking-step payload
#[derive(Debug, Deserialize)]
pub struct ThinkingStepBody {
    #[serde(default)]
    pub step: Option<String>,
    #[serde(default)]
    pub content: serde_json::Value,
}

/// POST /api/foundry/:foundry_id/thinking
///
/// Validates the payload and publishes it to the foundry's subscribers.
/// A missing or empty `step` is rejected with 400; everything else is
/// accepted, `content` being free-form.
pub async fn ingest_thinking_step(
    State(state): State<AppState>,
    Path(foundry_id): Path<Uuid>,
    Json(body): Json<ThinkingStepBody>,
) -> ApiResult<Json<serde_json::Value>> {
    let step = body
        .step
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Field \"step\" is required".to_string()))?;

    let event = ThinkingEvent::new(foundry_id, step, body.content);
    let delivered = state.events.publish(event);
    debug!(foundry_id = %foundry_id, delivered, "Thinking step ingested");

    Ok(Json(json!({ "success": true })))
}

/// Build webhook routes
pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/api/foundry/:foundry_id/thinking", post(ingest_thinking_step))
}
