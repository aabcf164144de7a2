//! tonesmith-studio - AI musician studio service
//!
//! Hosts the track-generation pipeline for foundry personas: track
//! creation via the conversational agent and synthesis vendor, job status
//! polling, completion callbacks, asset persistence, and the live
//! thinking-event stream for UIs.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tonesmith_common::config::StudioConfig;
use tonesmith_common::events::EventChannel;
use tonesmith_studio::clients::{
    CoverArtClient, HttpAudioFetcher, MuseAgentClient, SynthClient,
};
use tonesmith_studio::AppState;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting tonesmith-studio");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = StudioConfig::load().map_err(|e| anyhow::anyhow!("{}", e))?;
    config.validate().map_err(|e| anyhow::anyhow!("{}", e))?;

    std::fs::create_dir_all(&config.studio.storage_dir)?;
    info!("Media storage: {}", config.studio.storage_dir.display());

    let db = tonesmith_studio::db::init_database_pool(&config.studio.database_path).await?;
    info!("Database connection established");

    let events = Arc::new(EventChannel::new(256));

    let agent = Arc::new(MuseAgentClient::new(
        config.agent.api_base.clone(),
        config.agent.api_key.clone(),
        config.agent.model.clone(),
    ));
    let synth = Arc::new(SynthClient::new(
        config.synthesis.api_base.clone(),
        config.synthesis.api_key.clone(),
    ));
    let cover = Arc::new(CoverArtClient::new(
        config.cover.api_base.clone(),
        config.cover.api_key.clone(),
        config.cover.model.clone(),
    ));
    let audio = Arc::new(HttpAudioFetcher::new());

    let state = AppState::new(
        db,
        events,
        agent,
        synth,
        cover,
        audio,
        config.studio.storage_dir.clone(),
        config.studio.public_base_url.clone(),
        Duration::from_secs(config.jobs.poll_interval_secs),
    );

    let app = tonesmith_studio::build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!("Listening on http://{}", config.bind_addr());
    info!("Health check: http://{}/health", config.bind_addr());

    axum::serve(listener, app).await?;

    Ok(())
}
