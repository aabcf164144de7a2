//! tonesmith-studio library interface
//!
//! Exposes the application state, router construction, and the
//! orchestration components for integration testing.

pub mod api;
pub mod clients;
pub mod db;
pub mod error;
pub mod jobs;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod reconcile;

pub use crate::error::{ApiError, ApiResult};

use crate::clients::{AudioFetcher, CoverArtist, MuseAgent, SynthesisService};
use crate::jobs::{ChannelProgressSink, JobStatusPoller};
use crate::orchestrator::TrackCreationOrchestrator;
use crate::pipeline::{AssetPipeline, TrackAssembly};
use crate::reconcile::TrackReconciler;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tonesmith_common::events::EventChannel;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Track record store
    pub db: SqlitePool,
    /// Per-foundry event channel for live streaming
    pub events: Arc<EventChannel>,
    /// Synthesis vendor client (status reflection)
    pub synth: Arc<dyn SynthesisService>,
    /// Active-job polling loops
    pub poller: Arc<JobStatusPoller>,
    /// Track creation flow
    pub orchestrator: Arc<TrackCreationOrchestrator>,
    /// Reconcile-and-materialize path shared by poller and callback
    pub assembly: Arc<TrackAssembly>,
    /// Media storage directory served under /media/tracks
    pub storage_dir: PathBuf,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire the full component graph from its collaborator seams
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: SqlitePool,
        events: Arc<EventChannel>,
        agent: Arc<dyn MuseAgent>,
        synth: Arc<dyn SynthesisService>,
        cover: Arc<dyn CoverArtist>,
        audio: Arc<dyn AudioFetcher>,
        storage_dir: PathBuf,
        public_base_url: String,
        poll_interval: Duration,
    ) -> Self {
        let reconciler = Arc::new(TrackReconciler::new(db.clone()));
        let pipeline = Arc::new(AssetPipeline::new(
            db.clone(),
            storage_dir.clone(),
            audio,
            cover,
        ));
        let assembly = Arc::new(TrackAssembly::new(reconciler, pipeline));

        let sink = Arc::new(ChannelProgressSink::new(events.clone()));
        let poller = Arc::new(JobStatusPoller::new(
            synth.clone(),
            sink,
            assembly.clone(),
            poll_interval,
        ));

        let orchestrator = Arc::new(TrackCreationOrchestrator::new(
            db.clone(),
            agent,
            synth.clone(),
            poller.clone(),
            public_base_url,
        ));

        Self {
            db,
            events,
            synth,
            poller,
            orchestrator,
            assembly,
            storage_dir,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use tower_http::services::ServeDir;

    Router::new()
        .merge(api::webhook_routes())
        .merge(api::stream_routes())
        .merge(api::callback_routes())
        .merge(api::track_routes())
        .merge(api::health_routes())
        .nest_service(
            crate::pipeline::MEDIA_PREFIX,
            ServeDir::new(&state.storage_dir),
        )
        .with_state(state)
}
