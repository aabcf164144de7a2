//! Track reconciliation
//!
//! Turns the produced assets of one completed synthesis job into persisted
//! track records without duplication. The webhook callback and the status
//! poller can both observe completion of the same job; a per-job lock
//! serializes those racing calls and the store-backed audio-URL check makes
//! the loser a no-op.

use crate::db;
use crate::db::tracks::TrackRecord;
use crate::models::ProducedAsset;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tonesmith_common::Result;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Placeholder prompt used when the vendor payload carries lyrics only
pub const DEFAULT_PROMPT: &str = "AI generated music";

/// Reconciles produced assets into track records
pub struct TrackReconciler {
    db: SqlitePool,
    /// Per-job reconciliation locks (webhook vs. poller race)
    job_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TrackReconciler {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            job_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Reconcile one job's produced assets, in arrival order
    ///
    /// The first asset updates the provisional record created at submission
    /// time when one exists; every other asset creates a new record, with
    /// "(Version N)" name disambiguation when one job yields several. An
    /// asset whose audio URL was already persisted (in this pass or any
    /// earlier one) is skipped, so repeated invocation with the same asset
    /// list creates nothing new. One asset's failure does not abort its
    /// siblings.
    pub async fn reconcile(
        &self,
        foundry_id: Uuid,
        job_id: &str,
        assets: &[ProducedAsset],
    ) -> Result<Vec<TrackRecord>> {
        let lock = self.job_lock(job_id).await;
        let guard = lock.lock().await;

        // The store decides whether a provisional record exists; memory is
        // never authoritative.
        let provisional = db::tracks::find_by_job_id(&self.db, job_id).await?;

        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut persisted = Vec::new();
        let mut ordinal = 0usize;

        for (index, asset) in assets.iter().enumerate() {
            if !seen_urls.insert(asset.audio_url.clone()) {
                debug!(
                    job_id = %job_id,
                    audio_url = %asset.audio_url,
                    "Duplicate asset entry within one completion payload, skipping"
                );
                continue;
            }
            ordinal += 1;

            let result = match (index, &provisional) {
                (0, Some(existing)) => self.absorb_into_provisional(existing.clone(), asset).await,
                _ => {
                    self.create_record(foundry_id, job_id, asset, index == 0, ordinal)
                        .await
                }
            };

            match result {
                Ok(Some(track)) => persisted.push(track),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        job_id = %job_id,
                        audio_url = %asset.audio_url,
                        error = %e,
                        "Failed to persist asset (non-fatal, continuing with siblings)"
                    );
                }
            }
        }

        info!(
            job_id = %job_id,
            assets = assets.len(),
            persisted = persisted.len(),
            "Reconciliation pass complete"
        );

        drop(guard);
        self.prune_lock(job_id, &lock).await;

        Ok(persisted)
    }

    /// First asset of a job: update the provisional record in place
    async fn absorb_into_provisional(
        &self,
        mut track: TrackRecord,
        asset: &ProducedAsset,
    ) -> Result<Option<TrackRecord>> {
        let (prompt, lyrics) = extract_fields(asset);
        if let Some(title) = asset.title.as_ref().filter(|t| !t.trim().is_empty()) {
            track.name = title.clone();
        }
        track.prompt = prompt;
        track.lyrics = lyrics;
        track.audio_url = asset.audio_url.clone();

        db::tracks::update_asset_fields(&self.db, &track).await?;
        debug!(track_id = %track.id, "Provisional record absorbed first asset");
        Ok(Some(track))
    }

    /// Create a new record for an asset, unless its URL is already persisted
    async fn create_record(
        &self,
        foundry_id: Uuid,
        job_id: &str,
        asset: &ProducedAsset,
        first: bool,
        ordinal: usize,
    ) -> Result<Option<TrackRecord>> {
        if let Some(existing) = db::tracks::find_by_audio_url(&self.db, &asset.audio_url).await? {
            debug!(
                track_id = %existing.id,
                audio_url = %asset.audio_url,
                "Asset already persisted in an earlier pass, skipping"
            );
            return Ok(None);
        }

        let title = asset
            .title
            .as_ref()
            .filter(|t| !t.trim().is_empty())
            .cloned()
            .unwrap_or_else(|| "Untitled".to_string());
        let name = if ordinal > 1 {
            format!("{} (Version {})", title, ordinal)
        } else {
            title
        };

        let (prompt, lyrics) = extract_fields(asset);

        let mut track = TrackRecord::new(foundry_id, name);
        track.prompt = prompt;
        track.lyrics = lyrics;
        track.audio_url = asset.audio_url.clone();
        // Only the first asset of a job carries the job linkage
        track.source_job_id = first.then(|| job_id.to_string());

        db::tracks::insert_track(&self.db, &track).await?;
        debug!(track_id = %track.id, name = %track.name, "Created track record");
        Ok(Some(track))
    }

    async fn job_lock(&self, job_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.job_locks.lock().await;
        locks
            .entry(job_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop a job's lock entry once no other pass holds a handle to it,
    /// so the map does not grow with every job ever reconciled
    async fn prune_lock(&self, job_id: &str, lock: &Arc<Mutex<()>>) {
        let mut locks = self.job_locks.lock().await;
        // Two handles: the map's entry and ours. Any concurrent pass for
        // the same job holds a third and keeps the entry alive.
        if Arc::strong_count(lock) == 2 {
            locks.remove(job_id);
        }
    }

    /// Number of per-job lock entries currently held (diagnostics)
    pub async fn job_lock_count(&self) -> usize {
        self.job_locks.lock().await.len()
    }
}

/// Split a payload that does not cleanly separate prompt and lyrics
///
/// Policy: a present `lyrics` field is used as-is; a lyric-shaped `prompt`
/// (line break or a verse/chorus/bridge/intro/outro marker) moves into
/// `lyrics` with the placeholder taking its place; otherwise the free text
/// stays a prompt. Lyrics are never synthesized from a prompt.
pub fn extract_fields(asset: &ProducedAsset) -> (String, String) {
    let prompt = asset.prompt.as_deref().filter(|p| !p.trim().is_empty());
    let lyrics = asset.lyrics.as_deref().filter(|l| !l.trim().is_empty());

    match (prompt, lyrics) {
        (Some(p), Some(l)) => (p.to_string(), l.to_string()),
        (None, Some(l)) => (DEFAULT_PROMPT.to_string(), l.to_string()),
        (Some(p), None) if looks_like_lyrics(p) => (DEFAULT_PROMPT.to_string(), p.to_string()),
        (Some(p), None) => (p.to_string(), String::new()),
        (None, None) => (DEFAULT_PROMPT.to_string(), String::new()),
    }
}

/// Heuristic for "this free text is actually sung lyrics"
fn looks_like_lyrics(text: &str) -> bool {
    if text.contains('\n') {
        return true;
    }
    let lowered = text.to_lowercase();
    ["verse", "chorus", "bridge", "intro", "outro"]
        .iter()
        .any(|marker| lowered.contains(marker))
}
