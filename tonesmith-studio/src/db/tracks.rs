//! Track record persistence
//!
//! The `tracks` table is the single source of truth for which records
//! exist; reconciliation decisions are always made against it, never
//! against an in-memory cache.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use tonesmith_common::{Error, Result};
use uuid::Uuid;

/// Durable, user-visible track entity
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TrackRecord {
    pub id: Uuid,
    pub foundry_id: Uuid,
    pub name: String,
    pub prompt: String,
    pub lyrics: String,
    /// Vendor URL of the source audio; dedup key and download fallback
    pub audio_url: String,
    /// Local public path, set once the audio has been downloaded
    pub audio_path: Option<String>,
    /// Local public path of the generated cover image, if any
    pub cover_path: Option<String>,
    /// Set only on the first asset reconciled for a job
    pub source_job_id: Option<String>,
    /// Reaction symbol → count
    pub reactions: HashMap<String, i64>,
    pub created_at: DateTime<Utc>,
}

impl TrackRecord {
    /// Build a new record (id and created_at assigned here)
    pub fn new(foundry_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            foundry_id,
            name: name.into(),
            prompt: String::new(),
            lyrics: String::new(),
            audio_url: String::new(),
            audio_path: None,
            cover_path: None,
            source_job_id: None,
            reactions: HashMap::new(),
            created_at: Utc::now(),
        }
    }
}

/// Insert a track record
pub async fn insert_track(pool: &SqlitePool, track: &TrackRecord) -> Result<()> {
    let reactions = serde_json::to_string(&track.reactions)
        .map_err(|e| Error::Internal(format!("Failed to serialize reactions: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO tracks (
            id, foundry_id, name, prompt, lyrics,
            audio_url, audio_path, cover_path, source_job_id,
            reactions, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(track.id.to_string())
    .bind(track.foundry_id.to_string())
    .bind(&track.name)
    .bind(&track.prompt)
    .bind(&track.lyrics)
    .bind(&track.audio_url)
    .bind(&track.audio_path)
    .bind(&track.cover_path)
    .bind(&track.source_job_id)
    .bind(&reactions)
    .bind(track.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a track by id
pub async fn get_track(pool: &SqlitePool, id: Uuid) -> Result<Option<TrackRecord>> {
    let row = sqlx::query("SELECT * FROM tracks WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(row_to_track).transpose()
}

/// Find the provisional record created when a job was submitted
pub async fn find_by_job_id(pool: &SqlitePool, job_id: &str) -> Result<Option<TrackRecord>> {
    let row = sqlx::query("SELECT * FROM tracks WHERE source_job_id = ? LIMIT 1")
        .bind(job_id)
        .fetch_optional(pool)
        .await?;

    row.map(row_to_track).transpose()
}

/// Find a record already persisted for a produced audio URL
pub async fn find_by_audio_url(pool: &SqlitePool, audio_url: &str) -> Result<Option<TrackRecord>> {
    let row = sqlx::query("SELECT * FROM tracks WHERE audio_url = ? LIMIT 1")
        .bind(audio_url)
        .fetch_optional(pool)
        .await?;

    row.map(row_to_track).transpose()
}

/// Write asset-derived fields onto an existing (provisional) record
pub async fn update_asset_fields(pool: &SqlitePool, track: &TrackRecord) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE tracks
        SET name = ?, prompt = ?, lyrics = ?, audio_url = ?
        WHERE id = ?
        "#,
    )
    .bind(&track.name)
    .bind(&track.prompt)
    .bind(&track.lyrics)
    .bind(&track.audio_url)
    .bind(track.id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Record the local public path of the downloaded audio
pub async fn update_audio_path(pool: &SqlitePool, id: Uuid, audio_path: &str) -> Result<()> {
    sqlx::query("UPDATE tracks SET audio_path = ? WHERE id = ?")
        .bind(audio_path)
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

/// Record the local public path of the generated cover image
pub async fn update_cover_path(pool: &SqlitePool, id: Uuid, cover_path: &str) -> Result<()> {
    sqlx::query("UPDATE tracks SET cover_path = ? WHERE id = ?")
        .bind(cover_path)
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(())
}

/// List a foundry's tracks, newest first
pub async fn list_for_foundry(pool: &SqlitePool, foundry_id: Uuid) -> Result<Vec<TrackRecord>> {
    let rows = sqlx::query("SELECT * FROM tracks WHERE foundry_id = ? ORDER BY created_at DESC")
        .bind(foundry_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(row_to_track).collect()
}

/// Increment a reaction counter, returning the updated record
pub async fn add_reaction(pool: &SqlitePool, id: Uuid, symbol: &str) -> Result<TrackRecord> {
    let mut track = get_track(pool, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("track {}", id)))?;

    *track.reactions.entry(symbol.to_string()).or_insert(0) += 1;

    let reactions = serde_json::to_string(&track.reactions)
        .map_err(|e| Error::Internal(format!("Failed to serialize reactions: {}", e)))?;

    sqlx::query("UPDATE tracks SET reactions = ? WHERE id = ?")
        .bind(&reactions)
        .bind(id.to_string())
        .execute(pool)
        .await?;

    Ok(track)
}

fn row_to_track(row: sqlx::sqlite::SqliteRow) -> Result<TrackRecord> {
    let id: String = row.get("id");
    let foundry_id: String = row.get("foundry_id");
    let reactions: String = row.get("reactions");
    let created_at: String = row.get("created_at");

    Ok(TrackRecord {
        id: Uuid::parse_str(&id)
            .map_err(|e| Error::Internal(format!("Invalid track id in database: {}", e)))?,
        foundry_id: Uuid::parse_str(&foundry_id)
            .map_err(|e| Error::Internal(format!("Invalid foundry id in database: {}", e)))?,
        name: row.get("name"),
        prompt: row.get("prompt"),
        lyrics: row.get("lyrics"),
        audio_url: row.get("audio_url"),
        audio_path: row.get("audio_path"),
        cover_path: row.get("cover_path"),
        source_job_id: row.get("source_job_id"),
        reactions: serde_json::from_str(&reactions)
            .map_err(|e| Error::Internal(format!("Invalid reactions in database: {}", e)))?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| Error::Internal(format!("Invalid timestamp in database: {}", e)))?
            .with_timezone(&Utc),
    })
}
