//! Event types and the per-foundry event channel
//!
//! A foundry's background agent pushes "thinking step" events while it
//! works; live UI clients subscribe to a foundry and receive those events
//! over SSE. The channel is an explicitly constructed value injected into
//! application state, not a process-wide singleton, so tests can create
//! isolated instances.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// One step emitted by a foundry's background agent
///
/// Ephemeral: exists only in transit through the [`EventChannel`], never
/// persisted. `content` is free-form JSON (the agent decides its shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThinkingEvent {
    /// Owning foundry (routing key)
    #[serde(rename = "foundryId")]
    pub foundry_id: Uuid,
    /// Free-form step tag, e.g. "keywords", "dream", "initiative"
    pub step: String,
    /// Structured or free-text step content
    pub content: serde_json::Value,
    /// When the step was ingested
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ThinkingEvent {
    pub fn new(foundry_id: Uuid, step: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            foundry_id,
            step: step.into(),
            content,
            timestamp: chrono::Utc::now(),
        }
    }
}

/// In-process publish/subscribe bus keyed by foundry id
///
/// Backed by one `tokio::broadcast` channel per foundry. Subscribers
/// registered after an event was published never see it (no replay
/// buffer). Dropping a receiver unsubscribes; sender entries whose last
/// receiver is gone are pruned on the next publish for that foundry.
pub struct EventChannel {
    channels: RwLock<HashMap<Uuid, broadcast::Sender<ThinkingEvent>>>,
    capacity: usize,
}

impl EventChannel {
    /// Create a new event channel
    ///
    /// `capacity` is the per-foundry broadcast buffer size; a slow
    /// subscriber that falls more than `capacity` events behind starts
    /// losing the oldest ones.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Publish an event to every live subscriber of its foundry
    ///
    /// Returns the number of subscribers that received the event. Zero
    /// subscribers is not an error: events for foundries nobody is
    /// watching are simply dropped.
    pub fn publish(&self, event: ThinkingEvent) -> usize {
        let foundry_id = event.foundry_id;

        // Fast path: existing sender with live receivers
        {
            let channels = self.channels.read().expect("event channel lock poisoned");
            if let Some(tx) = channels.get(&foundry_id) {
                match tx.send(event) {
                    Ok(count) => return count,
                    Err(_) => {
                        debug!(foundry_id = %foundry_id, "No live subscribers, pruning channel");
                    }
                }
            } else {
                debug!(foundry_id = %foundry_id, "No subscribers for foundry, dropping event");
                return 0;
            }
        }

        // Last receiver is gone; drop the dead sender so the map does not
        // accumulate one entry per foundry ever observed.
        let mut channels = self.channels.write().expect("event channel lock poisoned");
        if let Some(tx) = channels.get(&foundry_id) {
            if tx.receiver_count() == 0 {
                channels.remove(&foundry_id);
            }
        }
        0
    }

    /// Subscribe to all future events for one foundry
    ///
    /// Dropping the returned receiver unsubscribes.
    pub fn subscribe(&self, foundry_id: Uuid) -> broadcast::Receiver<ThinkingEvent> {
        let mut channels = self.channels.write().expect("event channel lock poisoned");
        channels
            .entry(foundry_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Number of live subscribers for a foundry (diagnostics)
    pub fn subscriber_count(&self, foundry_id: Uuid) -> usize {
        self.channels
            .read()
            .expect("event channel lock poisoned")
            .get(&foundry_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}
