//! HTTP API integration tests
//!
//! Full router wired over stand-in clients and a temp-file database,
//! exercised with tower::ServiceExt::oneshot.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use futures::StreamExt;
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tonesmith_common::events::{EventChannel, ThinkingEvent};
use tonesmith_common::{Error, Result};
use tonesmith_studio::clients::{
    AudioFetcher, CoverArtist, JobStatusReport, MuseAgent, SynthesisRequest, SynthesisService,
};
use tonesmith_studio::db;
use tonesmith_studio::db::tracks::TrackRecord;
use tonesmith_studio::jobs::JobStatus;
use tonesmith_studio::{build_router, AppState};
use tower::ServiceExt;
use uuid::Uuid;

const BRIEF_REPLY: &str = r#"{"prompt":"An upbeat synth anthem","style":"synthwave, energetic","title":"Nova","lyrics":"Verse 1:\nHello world"}"#;

struct StubAgent {
    reply: String,
}

#[async_trait]
impl MuseAgent for StubAgent {
    async fn compose_brief(&self, _user_prompt: &str) -> Result<String> {
        Ok(self.reply.clone())
    }
}

struct StubSynth {
    /// Job id to hand out, or None to fail the submission
    submit_job_id: Option<String>,
    status_raw: serde_json::Value,
}

#[async_trait]
impl SynthesisService for StubSynth {
    async fn submit(&self, _request: &SynthesisRequest) -> Result<String> {
        self.submit_job_id
            .clone()
            .ok_or_else(|| Error::Upstream("vendor unavailable".to_string()))
    }

    async fn status(&self, _job_id: &str) -> Result<JobStatusReport> {
        Ok(JobStatusReport {
            status: JobStatus::Pending,
            assets: vec![],
            raw: self.status_raw.clone(),
        })
    }
}

struct StubCover;

#[async_trait]
impl CoverArtist for StubCover {
    async fn generate(&self, _prompt: &str) -> Result<Vec<u8>> {
        Ok(vec![0xff, 0xd8])
    }
}

struct StubFetcher;

#[async_trait]
impl AudioFetcher for StubFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
        Ok(vec![0x49, 0x44, 0x33])
    }
}

struct TestApp {
    _dir: TempDir,
    pool: sqlx::SqlitePool,
    state: AppState,
    router: Router,
}

async fn test_app(agent_reply: &str, submit_job_id: Option<&str>) -> TestApp {
    let dir = TempDir::new().unwrap();
    let pool = db::init_database_pool(&dir.path().join("test.db"))
        .await
        .unwrap();

    let state = AppState::new(
        pool.clone(),
        Arc::new(EventChannel::new(64)),
        Arc::new(StubAgent {
            reply: agent_reply.to_string(),
        }),
        Arc::new(StubSynth {
            submit_job_id: submit_job_id.map(String::from),
            status_raw: serde_json::json!({ "code": 200, "data": { "status": "PENDING" } }),
        }),
        Arc::new(StubCover),
        Arc::new(StubFetcher),
        dir.path().join("media"),
        "http://localhost:5840".to_string(),
        // Long interval keeps the poller quiet during request tests
        Duration::from_secs(600),
    );

    let router = build_router(state.clone());
    TestApp {
        _dir: dir,
        pool,
        state,
        router,
    }
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_reports_service_identity() {
    let app = test_app(BRIEF_REPLY, Some("j1")).await;

    let response = app.router.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "tonesmith-studio");
}

#[tokio::test]
async fn thinking_step_without_step_field_is_rejected() {
    let app = test_app(BRIEF_REPLY, Some("j1")).await;
    let foundry = Uuid::new_v4();

    let response = app
        .router
        .oneshot(post_json(
            &format!("/api/foundry/{}/thinking", foundry),
            serde_json::json!({ "content": { "detail": "no step" } }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn thinking_step_reaches_live_subscribers() {
    let app = test_app(BRIEF_REPLY, Some("j1")).await;
    let foundry = Uuid::new_v4();

    let mut rx = app.state.events.subscribe(foundry);

    let response = app
        .router
        .oneshot(post_json(
            &format!("/api/foundry/{}/thinking", foundry),
            serde_json::json!({ "step": "composing", "content": { "detail": "picking a key" } }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], true);

    let event = rx.try_recv().unwrap();
    assert_eq!(event.step, "composing");
    assert_eq!(event.content["detail"], "picking a key");
}

/// Given: a client opens the foundry's live stream
/// Then: the first frame is the synthetic connection acknowledgement, and
/// events published afterwards arrive verbatim; dropping the stream
/// unsubscribes
#[tokio::test]
async fn stream_opens_with_connection_frame_then_forwards_events() {
    let app = test_app(BRIEF_REPLY, Some("j1")).await;
    let foundry = Uuid::new_v4();

    let response = app
        .router
        .oneshot(get(&format!("/api/foundry/{}/stream", foundry)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let mut frames = response.into_body().into_data_stream();

    let first = String::from_utf8(frames.next().await.unwrap().unwrap().to_vec()).unwrap();
    assert!(first.starts_with("data:"));
    assert!(first.contains("\"type\":\"connection\""));
    assert!(first.contains(&foundry.to_string()));

    // The handler's subscription is live; a published event is the next frame
    let delivered = app.state.events.publish(ThinkingEvent::new(
        foundry,
        "keywords",
        serde_json::json!({ "keywords": ["synthwave"] }),
    ));
    assert_eq!(delivered, 1);

    let second = String::from_utf8(frames.next().await.unwrap().unwrap().to_vec()).unwrap();
    assert!(second.contains("\"step\":\"keywords\""));
    assert!(second.contains("synthwave"));

    // Disconnecting drops the receiver and unsubscribes
    drop(frames);
    assert_eq!(app.state.events.subscriber_count(foundry), 0);
}

#[tokio::test]
async fn create_track_returns_job_and_provisional_record() {
    let app = test_app(BRIEF_REPLY, Some("job-42")).await;
    let foundry = Uuid::new_v4();

    let response = app
        .router
        .oneshot(post_json(
            &format!("/api/foundry/{}/tracks", foundry),
            serde_json::json!({ "prompt": "an upbeat synthwave song" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["job_id"], "job-42");
    assert_eq!(body["brief"]["title"], "Nova");

    // Provisional record created at submission time
    let tracks = db::tracks::list_for_foundry(&app.pool, foundry).await.unwrap();
    assert_eq!(tracks.len(), 1);
    assert_eq!(tracks[0].name, "Nova");
    assert_eq!(tracks[0].source_job_id.as_deref(), Some("job-42"));

    // And the poller picked the job up
    let jobs = app.state.poller.active_jobs().await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_id, "job-42");
}

#[tokio::test]
async fn create_track_partial_success_when_submission_fails() {
    let app = test_app(BRIEF_REPLY, None).await;
    let foundry = Uuid::new_v4();

    let response = app
        .router
        .oneshot(post_json(
            &format!("/api/foundry/{}/tracks", foundry),
            serde_json::json!({ "prompt": "an upbeat synthwave song" }),
        ))
        .await
        .unwrap();

    // The agent's reply still reaches the caller
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert!(body["job_id"].is_null());
    assert_eq!(body["brief"]["title"], "Nova");

    // Nothing was persisted and nothing is being polled
    let tracks = db::tracks::list_for_foundry(&app.pool, foundry).await.unwrap();
    assert!(tracks.is_empty());
    assert!(app.state.poller.active_jobs().await.is_empty());
}

#[tokio::test]
async fn create_track_with_unparseable_brief_is_rejected() {
    let app = test_app("Sure! Here is your song:", Some("j1")).await;
    let foundry = Uuid::new_v4();

    let response = app
        .router
        .oneshot(post_json(
            &format!("/api/foundry/{}/tracks", foundry),
            serde_json::json!({ "prompt": "an upbeat synthwave song" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let tracks = db::tracks::list_for_foundry(&app.pool, foundry).await.unwrap();
    assert!(tracks.is_empty());
}

#[tokio::test]
async fn create_track_without_prompt_is_rejected() {
    let app = test_app(BRIEF_REPLY, Some("j1")).await;
    let foundry = Uuid::new_v4();

    let response = app
        .router
        .oneshot(post_json(
            &format!("/api/foundry/{}/tracks", foundry),
            serde_json::json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn synthesis_callback_persists_assets() {
    let app = test_app(BRIEF_REPLY, Some("j1")).await;
    let foundry = Uuid::new_v4();

    let response = app
        .router
        .oneshot(post_json(
            &format!("/api/foundry/{}/synthesis-callback", foundry),
            serde_json::json!({
                "code": 200,
                "data": {
                    "task_id": "job-7",
                    "callbackType": "complete",
                    "data": [
                        { "audio_url": "https://cdn/a1.mp3", "title": "Nova", "prompt": "synth anthem" },
                        { "audio_url": "https://cdn/a2.mp3", "title": "Nova" }
                    ]
                }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let tracks = db::tracks::list_for_foundry(&app.pool, foundry).await.unwrap();
    assert_eq!(tracks.len(), 2);
    let mut names: Vec<_> = tracks.iter().map(|t| t.name.clone()).collect();
    names.sort();
    assert_eq!(names, vec!["Nova", "Nova (Version 2)"]);
}

#[tokio::test]
async fn failure_callback_is_acknowledged_without_persistence() {
    let app = test_app(BRIEF_REPLY, Some("j1")).await;
    let foundry = Uuid::new_v4();

    let response = app
        .router
        .oneshot(post_json(
            &format!("/api/foundry/{}/synthesis-callback", foundry),
            serde_json::json!({ "code": 500, "msg": "generation failed" }),
        ))
        .await
        .unwrap();

    // Acknowledged so the vendor stops retrying
    assert_eq!(response.status(), StatusCode::OK);
    let tracks = db::tracks::list_for_foundry(&app.pool, foundry).await.unwrap();
    assert!(tracks.is_empty());
}

#[tokio::test]
async fn callback_without_assets_is_rejected() {
    let app = test_app(BRIEF_REPLY, Some("j1")).await;
    let foundry = Uuid::new_v4();

    let response = app
        .router
        .oneshot(post_json(
            &format!("/api/foundry/{}/synthesis-callback", foundry),
            serde_json::json!({ "code": 200, "data": { "task_id": "j9", "data": [] } }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn job_status_requires_job_id() {
    let app = test_app(BRIEF_REPLY, Some("j1")).await;

    let response = app
        .router
        .oneshot(get("/api/tracks/status"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn job_status_reflects_vendor_envelope() {
    let app = test_app(BRIEF_REPLY, Some("j1")).await;

    let response = app
        .router
        .oneshot(get("/api/tracks/status?job_id=j1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["status"], "PENDING");
}

#[tokio::test]
async fn list_tracks_returns_foundry_records_only() {
    let app = test_app(BRIEF_REPLY, Some("j1")).await;
    let foundry = Uuid::new_v4();
    let other = Uuid::new_v4();

    db::tracks::insert_track(&app.pool, &TrackRecord::new(foundry, "Nova"))
        .await
        .unwrap();
    db::tracks::insert_track(&app.pool, &TrackRecord::new(other, "Echoes"))
        .await
        .unwrap();

    let response = app
        .router
        .oneshot(get(&format!("/api/foundry/{}/tracks", foundry)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["name"], "Nova");
}

#[tokio::test]
async fn reactions_accumulate_per_symbol() {
    let app = test_app(BRIEF_REPLY, Some("j1")).await;
    let foundry = Uuid::new_v4();

    let track = TrackRecord::new(foundry, "Nova");
    db::tracks::insert_track(&app.pool, &track).await.unwrap();

    let uri = format!("/api/tracks/{}/reactions", track.id);
    app.router
        .clone()
        .oneshot(post_json(&uri, serde_json::json!({ "symbol": "fire" })))
        .await
        .unwrap();
    let response = app
        .router
        .oneshot(post_json(&uri, serde_json::json!({ "symbol": "fire" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["reactions"]["fire"], 2);
}

#[tokio::test]
async fn reaction_on_unknown_track_is_not_found() {
    let app = test_app(BRIEF_REPLY, Some("j1")).await;

    let response = app
        .router
        .oneshot(post_json(
            &format!("/api/tracks/{}/reactions", Uuid::new_v4()),
            serde_json::json!({ "symbol": "fire" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
