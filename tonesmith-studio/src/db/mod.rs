//! Database access for the studio service
//!
//! Single shared SQLite database holding the durable track records.

pub mod tracks;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
///
/// Creates the database file (and parent directory) if missing and runs
/// table initialization.
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create studio tables if they don't exist
async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tracks (
            id TEXT PRIMARY KEY,
            foundry_id TEXT NOT NULL,
            name TEXT NOT NULL,
            prompt TEXT NOT NULL DEFAULT '',
            lyrics TEXT NOT NULL DEFAULT '',
            audio_url TEXT NOT NULL DEFAULT '',
            audio_path TEXT,
            cover_path TEXT,
            source_job_id TEXT,
            reactions TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tracks_foundry ON tracks(foundry_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_tracks_job ON tracks(source_job_id)")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized (tracks)");

    Ok(())
}
