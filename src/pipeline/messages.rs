//! Message types passed between assistant stages.

use bytes::Bytes;
use std::time::Instant;

/// A transcribed utterance from the microphone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Raw transcribed text.
    pub text: String,
    /// When the utterance was handed to the gate.
    pub received_at: Instant,
}

impl Utterance {
    pub fn now(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            received_at: Instant::now(),
        }
    }
}

/// Text waiting for synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    /// Preprocessed, speakable text.
    pub text: String,
    /// Playback generation at submission time.
    pub generation: u64,
}

/// Encoded audio waiting for playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Encoded audio as returned by the synthesizer (e.g. MP3).
    pub bytes: Bytes,
    /// Generation inherited from the source [`SpeechRequest`].
    pub generation: u64,
}

/// A complete utterance of microphone audio, ready for transcription.
#[derive(Debug, Clone)]
pub struct SpeechSegment {
    /// Mono f32 samples in \[-1, 1\].
    pub samples: Vec<f32>,
    /// Sample rate of `samples` in Hz.
    pub sample_rate: u32,
    /// When speech onset was detected.
    pub started_at: Instant,
}
