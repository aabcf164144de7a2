//! AssetPipeline and TrackAssembly integration tests
//!
//! Verifies the failure isolation between audio download and cover
//! generation, and the full reconcile-then-materialize path shared by the
//! poller and the vendor callback.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use tempfile::TempDir;
use tonesmith_common::{Error, Result};
use tonesmith_studio::clients::{AudioFetcher, CoverArtist};
use tonesmith_studio::db;
use tonesmith_studio::db::tracks::TrackRecord;
use tonesmith_studio::models::ProducedAsset;
use tonesmith_studio::pipeline::{AssetPipeline, TrackAssembly, MEDIA_PREFIX};
use tonesmith_studio::reconcile::TrackReconciler;
use uuid::Uuid;

struct StubFetcher {
    outcome: Result<Vec<u8>>,
}

#[async_trait]
impl AudioFetcher for StubFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
        match &self.outcome {
            Ok(bytes) => Ok(bytes.clone()),
            Err(e) => Err(Error::Upstream(e.to_string())),
        }
    }
}

struct StubCover {
    outcome: Result<Vec<u8>>,
}

#[async_trait]
impl CoverArtist for StubCover {
    async fn generate(&self, _prompt: &str) -> Result<Vec<u8>> {
        match &self.outcome {
            Ok(bytes) => Ok(bytes.clone()),
            Err(e) => Err(Error::Upstream(e.to_string())),
        }
    }
}

async fn test_db(dir: &TempDir) -> SqlitePool {
    db::init_database_pool(&dir.path().join("test.db"))
        .await
        .unwrap()
}

fn pipeline(
    pool: &SqlitePool,
    dir: &TempDir,
    audio: Result<Vec<u8>>,
    cover: Result<Vec<u8>>,
) -> AssetPipeline {
    AssetPipeline::new(
        pool.clone(),
        dir.path().join("media"),
        Arc::new(StubFetcher { outcome: audio }),
        Arc::new(StubCover { outcome: cover }),
    )
}

async fn seeded_track(pool: &SqlitePool) -> TrackRecord {
    let mut track = TrackRecord::new(Uuid::new_v4(), "Nova");
    track.prompt = "An upbeat synth track".to_string();
    track.audio_url = "https://cdn/a1.mp3".to_string();
    db::tracks::insert_track(pool, &track).await.unwrap();
    track
}

/// Both steps succeed: record carries both public paths and the files exist
#[tokio::test]
async fn materialize_stores_audio_and_cover() {
    let dir = TempDir::new().unwrap();
    let pool = test_db(&dir).await;
    let pipeline = pipeline(&pool, &dir, Ok(vec![1, 2, 3]), Ok(vec![4, 5]));
    let track = seeded_track(&pool).await;

    let updated = pipeline.materialize(&track).await.unwrap();

    let audio_path = updated.audio_path.expect("audio path set");
    let cover_path = updated.cover_path.expect("cover path set");
    assert!(audio_path.starts_with(MEDIA_PREFIX));
    assert!(audio_path.ends_with(".mp3"));
    assert!(cover_path.ends_with(".png"));

    // Files landed under the storage directory
    let media = dir.path().join("media");
    let audio_file = media.join(audio_path.rsplit('/').next().unwrap());
    assert_eq!(std::fs::read(audio_file).unwrap(), vec![1, 2, 3]);

    // And the store was updated
    let stored = db::tracks::get_track(&pool, track.id).await.unwrap().unwrap();
    assert!(stored.audio_path.is_some());
    assert!(stored.cover_path.is_some());
}

/// A cover failure never blocks the audio
#[tokio::test]
async fn cover_failure_leaves_audio_intact() {
    let dir = TempDir::new().unwrap();
    let pool = test_db(&dir).await;
    let pipeline = pipeline(
        &pool,
        &dir,
        Ok(vec![1, 2, 3]),
        Err(Error::Upstream("image vendor down".to_string())),
    );
    let track = seeded_track(&pool).await;

    let updated = pipeline.materialize(&track).await.unwrap();

    assert!(updated.audio_path.is_some());
    assert!(updated.cover_path.is_none());

    let stored = db::tracks::get_track(&pool, track.id).await.unwrap().unwrap();
    assert!(stored.audio_path.is_some());
    assert!(stored.cover_path.is_none());
}

/// A failed download keeps the record with its vendor URL as fallback
#[tokio::test]
async fn audio_failure_keeps_record_with_vendor_url() {
    let dir = TempDir::new().unwrap();
    let pool = test_db(&dir).await;
    let pipeline = pipeline(
        &pool,
        &dir,
        Err(Error::Upstream("cdn timeout".to_string())),
        Ok(vec![4, 5]),
    );
    let track = seeded_track(&pool).await;

    let updated = pipeline.materialize(&track).await.unwrap();

    assert!(updated.audio_path.is_none());
    assert_eq!(updated.audio_url, "https://cdn/a1.mp3");
    // Cover generation still ran
    assert!(updated.cover_path.is_some());
}

/// A record with no audio URL yet skips the download without error
#[tokio::test]
async fn missing_audio_url_skips_download() {
    let dir = TempDir::new().unwrap();
    let pool = test_db(&dir).await;
    let pipeline = pipeline(&pool, &dir, Ok(vec![1]), Ok(vec![2]));

    let track = TrackRecord::new(Uuid::new_v4(), "Nova");
    db::tracks::insert_track(&pool, &track).await.unwrap();

    let updated = pipeline.materialize(&track).await.unwrap();
    assert!(updated.audio_path.is_none());
}

/// Full ingest path: two assets become two materialized records, and a
/// second delivery of the same completion adds nothing
#[tokio::test]
async fn ingest_reconciles_and_materializes_idempotently() {
    let dir = TempDir::new().unwrap();
    let pool = test_db(&dir).await;
    let foundry = Uuid::new_v4();

    let reconciler = Arc::new(TrackReconciler::new(pool.clone()));
    let pipeline = Arc::new(pipeline(&pool, &dir, Ok(vec![1, 2]), Ok(vec![3])));
    let assembly = TrackAssembly::new(reconciler, pipeline);

    let assets = vec![
        ProducedAsset {
            audio_url: "https://cdn/a1.mp3".to_string(),
            title: Some("Nova".to_string()),
            prompt: Some("An upbeat synth track".to_string()),
            lyrics: Some("La la la".to_string()),
            tags: None,
            duration: Some(180.0),
            source_job_id: "j1".to_string(),
        },
        ProducedAsset {
            audio_url: "https://cdn/a2.mp3".to_string(),
            title: Some("Nova".to_string()),
            prompt: Some("An upbeat synth track".to_string()),
            lyrics: Some("La la la".to_string()),
            tags: None,
            duration: Some(175.0),
            source_job_id: "j1".to_string(),
        },
    ];

    let tracks = assembly.ingest(foundry, "j1", &assets).await.unwrap();
    assert_eq!(tracks.len(), 2);
    assert!(tracks.iter().all(|t| t.audio_path.is_some()));
    assert!(tracks.iter().all(|t| t.cover_path.is_some()));

    let mut names: Vec<_> = tracks.iter().map(|t| t.name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["Nova", "Nova (Version 2)"]);

    // Second delivery (the callback/poller race) creates no new records
    assembly.ingest(foundry, "j1", &assets).await.unwrap();

    let stored = db::tracks::list_for_foundry(&pool, foundry).await.unwrap();
    assert_eq!(stored.len(), 2);
}
