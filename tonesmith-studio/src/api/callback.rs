//! Synthesis completion callback
//!
//! The vendor pushes completed assets here when a job finishes. Items go
//! through the same reconcile-and-materialize path as the polling route,
//! so whichever notification arrives first wins and the other is a no-op.

use crate::clients::synth::CallbackEnvelope;
use crate::error::{ApiError, ApiResult};
use crate::models::ProducedAsset;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

/// POST /api/foundry/:foundry_id/synthesis-callback
pub async fn synthesis_callback(
    State(state): State<AppState>,
    Path(foundry_id): Path<Uuid>,
    Json(envelope): Json<CallbackEnvelope>,
) -> ApiResult<Json<serde_json::Value>> {
    if envelope.code != 200 {
        // Vendor-side failure notification; nothing to persist.
        warn!(
            foundry_id = %foundry_id,
            code = envelope.code,
            msg = envelope.msg.as_deref().unwrap_or(""),
            "Synthesis callback reported failure"
        );
        return Ok(Json(json!({ "success": true })));
    }

    let data = envelope
        .data
        .filter(|d| !d.data.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Callback carried no produced assets".to_string()))?;

    let job_id = data.task_id.unwrap_or_default();
    let assets: Vec<ProducedAsset> = data
        .data
        .into_iter()
        .filter_map(|item| item.into_asset(&job_id))
        .collect();

    if assets.is_empty() {
        return Err(ApiError::BadRequest(
            "Callback assets had no audio URLs".to_string(),
        ));
    }

    info!(
        foundry_id = %foundry_id,
        job_id = %job_id,
        assets = assets.len(),
        "Synthesis callback received"
    );

    // The callback supersedes polling for this job
    state.poller.cancel(&job_id).await;
    state.assembly.ingest(foundry_id, &job_id, &assets).await?;

    Ok(Json(json!({ "success": true })))
}

/// Build callback routes
pub fn callback_routes() -> Router<AppState> {
    Router::new().route(
        "/api/foundry/:foundry_id/synthesis-callback",
        post(synthesis_callback),
    )
}
