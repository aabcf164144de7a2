//! Asset materialization pipeline
//!
//! Downloads a reconciled track's audio into durable storage and generates
//! its cover image. The two steps fail independently: a missing cover
//! never blocks the audio, and a failed download leaves the record with
//! its vendor URL as fallback. Re-running overwrites with freshly
//! timestamped filenames, so the pipeline is safe to invoke again.

use crate::clients::{AudioFetcher, CoverArtist};
use crate::db;
use crate::db::tracks::TrackRecord;
use crate::jobs::poller::JobCompletionHandler;
use crate::models::ProducedAsset;
use crate::reconcile::TrackReconciler;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use tonesmith_common::Result;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Public URL prefix under which stored media is served
pub const MEDIA_PREFIX: &str = "/media/tracks";

/// Downloads audio and generates covers for persisted tracks
pub struct AssetPipeline {
    db: SqlitePool,
    storage_dir: PathBuf,
    audio: Arc<dyn AudioFetcher>,
    cover: Arc<dyn CoverArtist>,
}

impl AssetPipeline {
    pub fn new(
        db: SqlitePool,
        storage_dir: PathBuf,
        audio: Arc<dyn AudioFetcher>,
        cover: Arc<dyn CoverArtist>,
    ) -> Self {
        Self {
            db,
            storage_dir,
            audio,
            cover,
        }
    }

    /// Materialize one track: download its audio, then generate its cover
    ///
    /// Both steps are best-effort; the returned record reflects whichever
    /// paths were successfully stored.
    pub async fn materialize(&self, track: &TrackRecord) -> Result<TrackRecord> {
        let mut track = track.clone();

        match self.store_audio(&track).await {
            Ok(Some(public_path)) => {
                db::tracks::update_audio_path(&self.db, track.id, &public_path).await?;
                track.audio_path = Some(public_path);
            }
            Ok(None) => {}
            Err(e) => {
                warn!(
                    track_id = %track.id,
                    audio_url = %track.audio_url,
                    error = %e,
                    "Audio download failed; record keeps its vendor URL"
                );
            }
        }

        match self.store_cover(&track).await {
            Ok(public_path) => {
                db::tracks::update_cover_path(&self.db, track.id, &public_path).await?;
                track.cover_path = Some(public_path);
            }
            Err(e) => {
                warn!(
                    track_id = %track.id,
                    error = %e,
                    "Cover generation failed; track persists without a cover"
                );
            }
        }

        Ok(track)
    }

    async fn store_audio(&self, track: &TrackRecord) -> Result<Option<String>> {
        if track.audio_url.is_empty() {
            debug!(track_id = %track.id, "No audio URL yet, nothing to download");
            return Ok(None);
        }

        let bytes = self.audio.fetch(&track.audio_url).await?;
        let filename = timestamped_filename(&track.name, "mp3");
        let path = self.write_media(&filename, &bytes).await?;

        info!(
            track_id = %track.id,
            path = %path.display(),
            bytes = bytes.len(),
            "Stored track audio"
        );
        Ok(Some(format!("{}/{}", MEDIA_PREFIX, filename)))
    }

    async fn store_cover(&self, track: &TrackRecord) -> Result<String> {
        let prompt = cover_prompt(&track.name, &track.prompt);
        let bytes = self.cover.generate(&prompt).await?;
        let filename = timestamped_filename(&track.name, "png");
        let path = self.write_media(&filename, &bytes).await?;

        info!(track_id = %track.id, path = %path.display(), "Stored cover image");
        Ok(format!("{}/{}", MEDIA_PREFIX, filename))
    }

    async fn write_media(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.storage_dir).await?;
        let path = self.storage_dir.join(filename);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }
}

/// Reconcile-then-materialize glue
///
/// Both completion routes (status poller and vendor callback) feed through
/// this one path, so their dedup and persistence behavior is identical.
pub struct TrackAssembly {
    reconciler: Arc<TrackReconciler>,
    pipeline: Arc<AssetPipeline>,
}

impl TrackAssembly {
    pub fn new(reconciler: Arc<TrackReconciler>, pipeline: Arc<AssetPipeline>) -> Self {
        Self {
            reconciler,
            pipeline,
        }
    }

    /// Persist a completed job's assets and materialize each track
    pub async fn ingest(
        &self,
        foundry_id: Uuid,
        job_id: &str,
        assets: &[ProducedAsset],
    ) -> Result<Vec<TrackRecord>> {
        let tracks = self.reconciler.reconcile(foundry_id, job_id, assets).await?;

        let mut materialized = Vec::with_capacity(tracks.len());
        for track in &tracks {
            match self.pipeline.materialize(track).await {
                Ok(updated) => materialized.push(updated),
                Err(e) => {
                    // Sibling tracks still get their assets
                    warn!(track_id = %track.id, error = %e, "Materialization failed");
                    materialized.push(track.clone());
                }
            }
        }

        Ok(materialized)
    }
}

#[async_trait]
impl JobCompletionHandler for TrackAssembly {
    async fn on_assets(
        &self,
        foundry_id: Uuid,
        job_id: &str,
        assets: &[ProducedAsset],
    ) -> Result<()> {
        self.ingest(foundry_id, job_id, assets).await.map(|_| ())
    }
}

/// Build the cover-image prompt from the track's title and description
fn cover_prompt(name: &str, prompt: &str) -> String {
    if prompt.is_empty() {
        format!("Album cover art for a song titled \"{}\"", name)
    } else {
        format!("Album cover art for a song titled \"{}\". {}", name, prompt)
    }
}

/// Collision-resistant media filename from a sanitized title and timestamp
fn timestamped_filename(title: &str, extension: &str) -> String {
    format!(
        "{}_{}.{}",
        sanitize_title(title),
        chrono::Utc::now().timestamp_millis(),
        extension
    )
}

/// Reduce a display title to a safe filename stem
///
/// Keeps ASCII alphanumerics, `-` and `_`, maps whitespace runs to single
/// underscores, drops everything else, truncates, and never returns an
/// empty stem.
fn sanitize_title(title: &str) -> String {
    let mut stem = String::with_capacity(title.len());
    let mut last_was_separator = false;

    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
            stem.push(ch);
            last_was_separator = false;
        } else if ch.is_whitespace() && !last_was_separator && !stem.is_empty() {
            stem.push('_');
            last_was_separator = true;
        }
    }

    while stem.ends_with('_') {
        stem.pop();
    }
    stem.truncate(60);

    if stem.is_empty() {
        "track".to_string()
    } else {
        stem
    }
}
