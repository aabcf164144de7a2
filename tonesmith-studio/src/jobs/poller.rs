//! Job status polling
//!
//! One spawned task per outstanding job, each on its own interval, so a
//! blocked status query stalls only its own job. Every observed status is
//! reported to the progress sink once per tick; success-terminal states
//! hand the asset list to the completion handler exactly once and stop the
//! loop; failure-terminal states stop the loop without persistence.
//! Transport failures are non-terminal: the next tick is the retry.

use crate::jobs::status::JobStatus;
use crate::models::{GenerationJob, ProducedAsset};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tonesmith_common::events::{EventChannel, ThinkingEvent};
use tonesmith_common::Result;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Observer of per-tick status transitions (UI state)
pub trait JobProgressSink: Send + Sync {
    /// Called exactly once per completed poll tick, terminal or not
    fn status_changed(&self, foundry_id: Uuid, job_id: &str, status: &JobStatus);
}

/// Receiver of a success-terminal job's produced assets
#[async_trait]
pub trait JobCompletionHandler: Send + Sync {
    async fn on_assets(
        &self,
        foundry_id: Uuid,
        job_id: &str,
        assets: &[ProducedAsset],
    ) -> Result<()>;
}

/// Progress sink that publishes ticks onto the foundry's event channel
///
/// Live UI subscribers see job progress interleaved with thinking events
/// on the same stream.
pub struct ChannelProgressSink {
    channel: Arc<EventChannel>,
}

impl ChannelProgressSink {
    pub fn new(channel: Arc<EventChannel>) -> Self {
        Self { channel }
    }
}

impl JobProgressSink for ChannelProgressSink {
    fn status_changed(&self, foundry_id: Uuid, job_id: &str, status: &JobStatus) {
        self.channel.publish(ThinkingEvent::new(
            foundry_id,
            "track_status",
            serde_json::json!({ "jobId": job_id, "status": status }),
        ));
    }
}

struct ActiveJob {
    job: GenerationJob,
    token: CancellationToken,
}

/// Drives the polling loops for all outstanding synthesis jobs
pub struct JobStatusPoller {
    synth: Arc<dyn crate::clients::SynthesisService>,
    sink: Arc<dyn JobProgressSink>,
    handler: Arc<dyn JobCompletionHandler>,
    poll_interval: Duration,
    jobs: Arc<RwLock<HashMap<String, ActiveJob>>>,
}

impl JobStatusPoller {
    pub fn new(
        synth: Arc<dyn crate::clients::SynthesisService>,
        sink: Arc<dyn JobProgressSink>,
        handler: Arc<dyn JobCompletionHandler>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            synth,
            sink,
            handler,
            poll_interval,
            jobs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register a job and start its polling loop
    ///
    /// Idempotent per job id: a second call for a job already being polled
    /// is a no-op.
    pub async fn start_polling(
        self: &Arc<Self>,
        foundry_id: Uuid,
        job_id: impl Into<String>,
        display_title: impl Into<String>,
    ) {
        let job_id = job_id.into();
        let token = CancellationToken::new();

        {
            let mut jobs = self.jobs.write().await;
            if jobs.contains_key(&job_id) {
                debug!(job_id = %job_id, "Job already being polled");
                return;
            }
            jobs.insert(
                job_id.clone(),
                ActiveJob {
                    job: GenerationJob {
                        job_id: job_id.clone(),
                        foundry_id,
                        status: JobStatus::Initializing,
                        title: display_title.into(),
                        created_at: chrono::Utc::now(),
                    },
                    token: token.clone(),
                },
            );
        }

        info!(job_id = %job_id, foundry_id = %foundry_id, "Started polling synthesis job");

        let poller = Arc::clone(self);
        tokio::spawn(async move {
            poller.poll_loop(foundry_id, job_id, token).await;
        });
    }

    /// Stop polling a job without waiting for a terminal state
    pub async fn cancel(&self, job_id: &str) {
        if let Some(active) = self.jobs.write().await.remove(job_id) {
            active.token.cancel();
            info!(job_id = %job_id, "Cancelled job polling");
        }
    }

    /// Snapshot of the jobs currently being polled
    pub async fn active_jobs(&self) -> Vec<GenerationJob> {
        self.jobs
            .read()
            .await
            .values()
            .map(|a| a.job.clone())
            .collect()
    }

    async fn poll_loop(&self, foundry_id: Uuid, job_id: String, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.poll_interval);
        // The vendor has just accepted the job; skip the immediate tick.
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(job_id = %job_id, "Polling loop cancelled");
                    return;
                }
                _ = interval.tick() => {}
            }

            let report = match self.synth.status(&job_id).await {
                Ok(report) => report,
                Err(e) => {
                    // Transport or vendor hiccup: not terminal, the next
                    // interval tick is the retry.
                    warn!(job_id = %job_id, error = %e, "Status query failed, will retry");
                    continue;
                }
            };

            let status = report.status.clone();
            self.record_status(&job_id, &status).await;
            self.sink.status_changed(foundry_id, &job_id, &status);

            if status.is_success() {
                info!(
                    job_id = %job_id,
                    status = %status,
                    assets = report.assets.len(),
                    "Job reached success, dispatching assets"
                );
                // The return below makes this dispatch at-most-once
                if let Err(e) = self
                    .handler
                    .on_assets(foundry_id, &job_id, &report.assets)
                    .await
                {
                    warn!(job_id = %job_id, error = %e, "Asset dispatch failed");
                }
                self.deregister(&job_id).await;
                return;
            }

            if status.is_failure() {
                warn!(job_id = %job_id, status = %status, "Job reached failure state");
                self.deregister(&job_id).await;
                return;
            }

            debug!(job_id = %job_id, status = %status, "Job still in progress");
        }
    }

    async fn record_status(&self, job_id: &str, status: &JobStatus) {
        if let Some(active) = self.jobs.write().await.get_mut(job_id) {
            active.job.status = status.clone();
        }
    }

    async fn deregister(&self, job_id: &str) {
        self.jobs.write().await.remove(job_id);
    }
}
