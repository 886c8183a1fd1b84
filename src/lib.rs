//! Jarvis: an always-listening desktop voice assistant.
//!
//! ```text
//! Microphone → Segmenter → STT → Gate → Router → handler / chat → Speech pipeline → Speaker
//! ```
//!
//! # Architecture
//!
//! - **Audio**: cpal capture, energy-based segmentation with barge-in,
//!   spectral denoising and cpal playback ([`audio`]).
//! - **Gate**: wake word or a 60 second conversation window ([`gate`]).
//! - **Router**: ordered command predicates dispatching to handlers
//!   ([`router`]).
//! - **Speech**: two-stage synthesis and playback pipeline cancelled by a
//!   generation counter ([`pipeline`]).
//! - **Events**: WebSocket fan-out to a viewer ([`events`]).
//! - **Collaborators**: speech, chat and lookup services behind traits
//!   ([`services`]).

pub mod app_dirs;
pub mod assistant;
pub mod audio;
pub mod config;
pub mod context;
pub mod emotion;
pub mod error;
pub mod events;
pub mod gate;
pub mod pipeline;
pub mod presence;
pub mod reminders;
pub mod router;
pub mod services;
pub mod settings;
pub mod tasks;

#[cfg(test)]
pub(crate) mod test_utils;

pub use assistant::Assistant;
pub use config::AssistantConfig;
pub use error::{AssistantError, Result};
pub use router::RouteOutcome;
