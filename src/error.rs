//! Error types for the assistant.

/// Top-level error type for the voice assistant.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    /// Audio device or stream error.
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text transcription error (service unreachable, bad response).
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech synthesis error.
    #[error("TTS error: {0}")]
    Tts(String),

    /// Conversational model error.
    #[error("chat error: {0}")]
    Chat(String),

    /// Lookup service error (search, knowledge, weather, vision, ...).
    #[error("service error: {0}")]
    Service(String),

    /// Capability is not available on this machine.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Settings / reminder persistence error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Speech pipeline coordination error.
    #[error("pipeline error: {0}")]
    Pipeline(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AssistantError>;
