//! Presence monitor: reacts to face observations from a camera producer.
//!
//! Each observation may carry an identity, an emotion label and a face
//! bounding box. The monitor feeds the emotion window, forwards the face
//! position to viewers, greets the configured user (rate limited) and
//! raises a sentry flag when an unknown face lingers.

use crate::config::PresenceConfig;
use crate::context::AssistantContext;
use crate::events::ViewerEvent;
use crate::pipeline::Voice;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Identity reported for a face that matched nobody.
pub const UNKNOWN_FACE: &str = "Unknown";

/// Face bounding box in pixels, with the frame size it was measured in.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub frame_width: f32,
    pub frame_height: f32,
}

impl FaceBox {
    /// Box center mapped to -1..1 on both axes, with +y pointing up.
    pub fn normalized_center(&self) -> Option<(f32, f32)> {
        if self.frame_width <= 0.0 || self.frame_height <= 0.0 {
            return None;
        }
        let cx = self.x + self.width / 2.0;
        let cy = self.y + self.height / 2.0;
        let nx = (cx / self.frame_width) * 2.0 - 1.0;
        let ny = -((cy / self.frame_height) * 2.0 - 1.0);
        Some((nx.clamp(-1.0, 1.0), ny.clamp(-1.0, 1.0)))
    }
}

/// One result from the face analysis producer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FaceObservation {
    /// Recognized identity or [`UNKNOWN_FACE`].
    pub name: String,
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub position: Option<FaceBox>,
}

#[derive(Debug, Default)]
struct PresenceState {
    unknown_run: u32,
    sentry: bool,
    last_greeting: Option<Instant>,
}

pub struct PresenceMonitor {
    context: Arc<AssistantContext>,
    voice: Arc<dyn Voice>,
    user_name: Option<String>,
    cooldown: Duration,
    sentry_threshold: u32,
    state: Mutex<PresenceState>,
}

impl PresenceMonitor {
    pub fn new(context: Arc<AssistantContext>, voice: Arc<dyn Voice>, config: &PresenceConfig) -> Self {
        Self {
            context,
            voice,
            user_name: config.user_name.clone().filter(|n| !n.trim().is_empty()),
            cooldown: Duration::from_secs(config.greeting_cooldown_secs),
            sentry_threshold: config.sentry_threshold,
            state: Mutex::new(PresenceState::default()),
        }
    }

    /// Whether the sentry flag is currently raised.
    pub fn sentry_active(&self) -> bool {
        self.state.lock().map(|s| s.sentry).unwrap_or(false)
    }

    /// Apply one observation seen at `now`.
    pub fn observe(&self, observation: &FaceObservation, now: Instant) {
        if let Some(label) = observation.emotion.as_deref() {
            let current = self.context.emotion.update(label);
            debug!("emotion observed '{label}', smoothed '{current}'");
        }

        if let Some((x, y)) = observation.position.and_then(|p| p.normalized_center()) {
            self.context.events.broadcast(ViewerEvent::FaceTrack { x, y });
        }

        let mut state = match self.state.lock() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        };

        if observation.name == UNKNOWN_FACE {
            state.unknown_run = state.unknown_run.saturating_add(1);
        } else {
            state.unknown_run = 0;
        }
        let sentry = state.unknown_run > self.sentry_threshold;
        if sentry != state.sentry {
            state.sentry = sentry;
            if sentry {
                warn!("unknown face present for {} observations", state.unknown_run);
            } else {
                info!("sentry cleared");
            }
            self.context.events.broadcast(ViewerEvent::Sentry { active: sentry });
        }

        let is_user = self
            .user_name
            .as_deref()
            .is_some_and(|user| observation.name.eq_ignore_ascii_case(user));
        if is_user {
            let due = state
                .last_greeting
                .is_none_or(|last| now.saturating_duration_since(last) > self.cooldown);
            if due {
                state.last_greeting = Some(now);
                drop(state);
                info!("greeting {}", observation.name);
                self.voice.speak(&format!("Hi {}, whats up", observation.name));
            }
        }
    }

    /// Consume observations until the channel closes or `cancel` fires.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<FaceObservation>, cancel: CancellationToken) {
        info!("presence monitor started");
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                observation = rx.recv() => match observation {
                    Some(obs) => self.observe(&obs, Instant::now()),
                    None => break,
                },
            }
        }
        info!("presence monitor stopped");
    }
}
