//! Track creation orchestration
//!
//! User prompt → agent brief → synthesis submission → provisional record
//! and polling. Agent parse failures fail fast with no partial track; a
//! synthesis submission failure after a good agent reply is a partial
//! success (the reply comes back without a job id, nothing is rolled
//! back).

use crate::clients::{parse_brief, MuseAgent, SynthesisRequest, SynthesisService};
use crate::db;
use crate::db::tracks::TrackRecord;
use crate::jobs::JobStatusPoller;
use crate::models::TrackBrief;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use tonesmith_common::Result;
use tracing::{info, warn};
use uuid::Uuid;

/// Result of one track-creation request
#[derive(Debug, Clone, Serialize)]
pub struct CreateTrackOutcome {
    /// Raw conversational reply, shown to the user either way
    pub reply: String,
    /// Parsed creative brief
    pub brief: TrackBrief,
    /// Vendor job id; absent when the synthesis submission failed
    pub job_id: Option<String>,
}

/// User-facing entry point for "create track"
pub struct TrackCreationOrchestrator {
    db: SqlitePool,
    agent: Arc<dyn MuseAgent>,
    synth: Arc<dyn SynthesisService>,
    poller: Arc<JobStatusPoller>,
    /// Base URL used to build the per-foundry vendor callback address
    public_base_url: String,
}

impl TrackCreationOrchestrator {
    pub fn new(
        db: SqlitePool,
        agent: Arc<dyn MuseAgent>,
        synth: Arc<dyn SynthesisService>,
        poller: Arc<JobStatusPoller>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            db,
            agent,
            synth,
            poller,
            public_base_url: public_base_url.into(),
        }
    }

    /// Create a track from the user's creative prompt
    pub async fn create_track(
        &self,
        foundry_id: Uuid,
        user_prompt: &str,
    ) -> Result<CreateTrackOutcome> {
        let reply = self.agent.compose_brief(user_prompt).await?;
        let brief = parse_brief(&reply)?;

        info!(
            foundry_id = %foundry_id,
            title = %brief.title,
            "Agent produced track brief"
        );

        let request = SynthesisRequest {
            lyrics: brief.lyrics.clone(),
            style: brief.style.clone(),
            title: brief.title.clone(),
            callback_url: format!(
                "{}/api/foundry/{}/synthesis-callback",
                self.public_base_url, foundry_id
            ),
        };

        let job_id = match self.synth.submit(&request).await {
            Ok(job_id) => job_id,
            Err(e) => {
                // Partial success: the conversational reply still reaches
                // the caller, just without a job.
                warn!(foundry_id = %foundry_id, error = %e, "Synthesis submission failed");
                return Ok(CreateTrackOutcome {
                    reply,
                    brief,
                    job_id: None,
                });
            }
        };

        info!(foundry_id = %foundry_id, job_id = %job_id, "Synthesis job accepted");

        self.insert_provisional(foundry_id, &job_id, &brief).await;
        self.poller
            .start_polling(foundry_id, &job_id, &brief.title)
            .await;

        Ok(CreateTrackOutcome {
            reply,
            brief,
            job_id: Some(job_id),
        })
    }

    /// Create the provisional record the reconciler will later absorb the
    /// first produced asset into. Failure here is non-fatal: without a
    /// provisional record the reconciler simply creates fresh ones.
    async fn insert_provisional(&self, foundry_id: Uuid, job_id: &str, brief: &TrackBrief) {
        let mut track = TrackRecord::new(foundry_id, &brief.title);
        track.prompt = brief.prompt.clone();
        track.lyrics = brief.lyrics.clone();
        track.source_job_id = Some(job_id.to_string());

        if let Err(e) = db::tracks::insert_track(&self.db, &track).await {
            warn!(job_id = %job_id, error = %e, "Failed to create provisional track record");
        }
    }
}
