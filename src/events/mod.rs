//! Viewer events: small JSON messages fanned out to passive observers.
//!
//! Producers (speech pipeline, listener, presence monitor) call
//! [`EventBus::broadcast`] from any thread. Delivery never blocks and having
//! no observers is not an error.

pub mod server;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub use server::EventServer;

/// An event pushed to viewers, serialized as `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ViewerEvent {
    /// Audio for a speech chunk is about to play.
    SpeakStart,
    /// Audio for a speech chunk finished or was cut off.
    SpeakStop,
    /// Normalized face position: `x` left→right and `y` bottom→top, both in -1..1.
    FaceTrack { x: f32, y: f32 },
    /// Listener state shown by the viewer ("Listening...", "Processing...").
    Status { state: String },
    /// An unrecognized face has lingered past the sentry threshold.
    Sentry { active: bool },
}

impl ViewerEvent {
    /// Wire name of the event type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SpeakStart => "speak_start",
            Self::SpeakStop => "speak_stop",
            Self::FaceTrack { .. } => "face_track",
            Self::Status { .. } => "status",
            Self::Sentry { .. } => "sentry",
        }
    }

    /// JSON text frame for this event.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"type\":\"{}\"}}", self.kind()))
    }
}

/// Fan-out channel for viewer events.
///
/// Cheap to clone; every clone publishes into the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ViewerEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventBus {
    /// Create a bus whose slow subscribers may lag `capacity` events behind.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Deliver an event to every current subscriber.
    pub fn broadcast(&self, event: ViewerEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ViewerEvent> {
        self.tx.subscribe()
    }

    /// Number of connected subscribers.
    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
