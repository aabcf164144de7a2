//! Live event stream gateway
//!
//! One long-lived SSE response per connected UI session. On open the
//! client immediately receives a synthetic `connection` acknowledgement,
//! then every event published for its foundry, verbatim. The broadcast
//! receiver lives inside the response stream, so a client disconnect drops
//! it and unsubscribes; handlers never accumulate.

use crate::AppState;
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// GET /api/foundry/:foundry_id/stream
///
/// SSE stream of the foundry's thinking events.
pub async fn foundry_event_stream(
    State(state): State<AppState>,
    Path(foundry_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(foundry_id = %foundry_id, "New live-stream client connected");

    let mut rx = state.events.subscribe(foundry_id);

    let stream = async_stream::stream! {
        // Synthetic acknowledgement so the client knows the subscription
        // is live before any real event arrives.
        let ack = serde_json::json!({
            "type": "connection",
            "message": "connected",
            "foundryId": foundry_id,
            "timestamp": chrono::Utc::now(),
        });
        yield Ok(Event::default().data(ack.to_string()));

        loop {
            tokio::select! {
                // Heartbeat comments keep proxies from closing idle streams
                _ = tokio::time::sleep(Duration::from_secs(15)) => {
                    yield Ok(Event::default().comment("heartbeat"));
                }

                received = rx.recv() => {
                    match received {
                        Ok(event) => {
                            match serde_json::to_string(&event) {
                                Ok(json) => yield Ok(Event::default().data(json)),
                                Err(e) => {
                                    warn!(foundry_id = %foundry_id, error = %e, "Failed to serialize event");
                                }
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                            // Slow client fell behind the buffer; resume
                            // with current events.
                            warn!(foundry_id = %foundry_id, missed, "Stream client lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                            debug!(foundry_id = %foundry_id, "Event channel closed, ending stream");
                            break;
                        }
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}

/// Build live-stream routes
pub fn stream_routes() -> Router<AppState> {
    Router::new().route("/api/foundry/:foundry_id/stream", get(foundry_event_stream))
}
