//! Speech output: message types, generation counter, text shaping and the
//! two-stage streaming pipeline.

pub mod generation;
pub mod messages;
pub mod speech;
pub mod text;

/// Something the assistant can talk through.
///
/// Implemented by [`speech::SpeechPipeline`]; handlers and the listener only
/// depend on this trait.
pub trait Voice: Send + Sync {
    /// Queue `text` for speaking. Never blocks.
    fn speak(&self, text: &str);
    /// Stop talking now and drop everything queued.
    fn interrupt(&self);
    /// Whether audio is audible right now.
    fn is_playing(&self) -> bool;
}
