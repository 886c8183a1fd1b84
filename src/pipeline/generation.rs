//! Playback generation counter.
//!
//! Every speech request and audio chunk carries the generation that was live
//! when it was created. Interrupting advances the counter; anything tagged
//! with an older value is stale and must be dropped wherever a worker next
//! looks at it. Nothing is cancelled explicitly.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct PlaybackGeneration {
    value: AtomicU64,
}

impl PlaybackGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live generation.
    pub fn current(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }

    /// Invalidate all in-flight work. Returns the new generation.
    pub fn advance(&self) -> u64 {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Whether work tagged `generation` may still produce output.
    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.current()
    }
}
