//! Track creation and listing endpoints

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

/// Track-creation request body
#[derive(Debug, Deserialize)]
pub struct CreateTrackBody {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// POST /api/foundry/:foundry_id/tracks
///
/// Runs the creation flow; 202 because the synthesis job completes later.
/// A reply without `job_id` means the agent answered but the synthesis
/// submission failed (partial success).
pub async fn create_track(
    State(state): State<AppState>,
    Path(foundry_id): Path<Uuid>,
    Json(body): Json<CreateTrackBody>,
) -> ApiResult<(StatusCode, Json<crate::orchestrator::CreateTrackOutcome>)> {
    let prompt = body
        .prompt
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Field \"prompt\" is required".to_string()))?;

    info!(foundry_id = %foundry_id, "Track creation requested");
    let outcome = state.orchestrator.create_track(foundry_id, &prompt).await?;

    Ok((StatusCode::ACCEPTED, Json(outcome)))
}

/// GET /api/foundry/:foundry_id/tracks
pub async fn list_tracks(
    State(state): State<AppState>,
    Path(foundry_id): Path<Uuid>,
) -> ApiResult<Json<Vec<db::tracks::TrackRecord>>> {
    let tracks = db::tracks::list_for_foundry(&state.db, foundry_id).await?;
    Ok(Json(tracks))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub job_id: Option<String>,
}

/// GET /api/tracks/status?job_id=...
///
/// Reflects the vendor's status envelope to the caller. Polling stays
/// server-side; this surface only exists so the UI can show raw progress.
pub async fn job_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let job_id = query
        .job_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Query parameter \"job_id\" is required".to_string()))?;

    let report = state.synth.status(&job_id).await?;
    Ok(Json(report.raw))
}

/// GET /api/jobs
///
/// Jobs currently being polled, for UI in-flight indicators.
pub async fn active_jobs(
    State(state): State<AppState>,
) -> Json<Vec<crate::models::GenerationJob>> {
    Json(state.poller.active_jobs().await)
}

#[derive(Debug, Deserialize)]
pub struct ReactionBody {
    pub symbol: String,
}

/// POST /api/tracks/:track_id/reactions
pub async fn add_reaction(
    State(state): State<AppState>,
    Path(track_id): Path<Uuid>,
    Json(body): Json<ReactionBody>,
) -> ApiResult<Json<db::tracks::TrackRecord>> {
    if body.symbol.trim().is_empty() {
        return Err(ApiError::BadRequest("Field \"symbol\" is required".to_string()));
    }

    let track = db::tracks::add_reaction(&state.db, track_id, &body.symbol).await?;
    Ok(Json(track))
}

/// Build track routes
pub fn track_routes() -> Router<AppState> {
    Router::new()
        .route("/api/foundry/:foundry_id/tracks", post(create_track).get(list_tracks))
        .route("/api/tracks/status", get(job_status))
        .route("/api/tracks/:track_id/reactions", post(add_reaction))
        .route("/api/jobs", get(active_jobs))
}
