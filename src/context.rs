//! Process-wide state shared by the assistant's workers.
//!
//! Everything that more than one worker reads or writes lives here behind a
//! small synchronized accessor: the playback generation, the conversation
//! window, the emotion window, the viewer event bus and the settings.

use crate::emotion::EmotionWindow;
use crate::events::EventBus;
use crate::gate::ConversationWindow;
use crate::pipeline::generation::PlaybackGeneration;
use crate::settings::{Settings, SettingsStore};
use std::time::Duration;

#[derive(Debug)]
pub struct AssistantContext {
    /// Invalidates in-flight speech on interrupt.
    pub generation: PlaybackGeneration,
    /// Last accepted command time.
    pub window: ConversationWindow,
    /// Smoothed user emotion.
    pub emotion: EmotionWindow,
    /// Viewer event fan-out.
    pub events: EventBus,
    /// Voice and wake-word settings.
    pub settings: SettingsStore,
}

impl AssistantContext {
    pub fn new(settings: SettingsStore, events: EventBus, window_length: Duration) -> Self {
        Self {
            generation: PlaybackGeneration::new(),
            window: ConversationWindow::new(window_length),
            emotion: EmotionWindow::new(),
            events,
            settings,
        }
    }

    /// Context with in-memory settings and a 60 second window.
    pub fn ephemeral() -> Self {
        Self::new(
            SettingsStore::in_memory(Settings::default()),
            EventBus::default(),
            Duration::from_secs(60),
        )
    }
}
