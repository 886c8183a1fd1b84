//! Streaming speech output.
//!
//! ```text
//! speak() ──▶ [text queue] ──▶ generation stage ──▶ [audio queue] ──▶ playback stage ──▶ sink
//!                                 (synthesize)                         (load/start/poll)
//! ```
//!
//! Both stages run on dedicated threads. Cancellation is cooperative: each
//! stage compares an item's generation against the live counter when it pops
//! the item, after synthesis completes, and on every playback poll.

use super::Voice;
use super::messages::{AudioChunk, SpeechRequest};
use super::text::prepare_for_speech;
use crate::config::SpeechConfig;
use crate::context::AssistantContext;
use crate::error::{AssistantError, Result};
use crate::events::ViewerEvent;
use crate::services::{AudioSink, Synthesizer};
use crossbeam_channel::{Receiver, RecvTimeoutError, SendTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How long a stage waits on an empty queue before re-checking shutdown.
const QUEUE_WAIT: Duration = Duration::from_millis(250);

/// Two-stage text → audio → speaker pipeline.
pub struct SpeechPipeline {
    context: Arc<AssistantContext>,
    synthesizer: Arc<dyn Synthesizer>,
    sink: Arc<dyn AudioSink>,
    config: SpeechConfig,
    text_tx: Sender<SpeechRequest>,
    text_rx: Receiver<SpeechRequest>,
    audio_tx: Sender<AudioChunk>,
    audio_rx: Receiver<AudioChunk>,
    /// Items popped by a stage and not yet finished with.
    in_flight: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl SpeechPipeline {
    /// Create the pipeline. Stages do not run until [`start`](Self::start).
    pub fn new(
        context: Arc<AssistantContext>,
        synthesizer: Arc<dyn Synthesizer>,
        sink: Arc<dyn AudioSink>,
        config: SpeechConfig,
    ) -> Self {
        let (text_tx, text_rx) = crossbeam_channel::bounded(config.text_queue_capacity.max(1));
        let (audio_tx, audio_rx) = crossbeam_channel::bounded(config.audio_queue_capacity.max(1));
        Self {
            context,
            synthesizer,
            sink,
            config,
            text_tx,
            text_rx,
            audio_tx,
            audio_rx,
            in_flight: Arc::new(AtomicUsize::new(0)),
            shutdown: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the generation and playback stages.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker thread cannot be spawned.
    pub fn start(&self) -> Result<()> {
        let generation = GenerationStage {
            context: Arc::clone(&self.context),
            synthesizer: Arc::clone(&self.synthesizer),
            text_rx: self.text_rx.clone(),
            audio_tx: self.audio_tx.clone(),
            in_flight: Arc::clone(&self.in_flight),
            shutdown: Arc::clone(&self.shutdown),
        };
        let playback = PlaybackStage {
            context: Arc::clone(&self.context),
            sink: Arc::clone(&self.sink),
            audio_rx: self.audio_rx.clone(),
            poll: Duration::from_millis(self.config.playback_poll_ms.max(1)),
            in_flight: Arc::clone(&self.in_flight),
            shutdown: Arc::clone(&self.shutdown),
        };

        let gen_handle = std::thread::Builder::new()
            .name("speech-generation".into())
            .spawn(move || generation.run())
            .map_err(|e| AssistantError::Pipeline(format!("cannot spawn generation stage: {e}")))?;
        let play_handle = std::thread::Builder::new()
            .name("speech-playback".into())
            .spawn(move || playback.run())
            .map_err(|e| AssistantError::Pipeline(format!("cannot spawn playback stage: {e}")))?;

        if let Ok(mut workers) = self.workers.lock() {
            workers.push(gen_handle);
            workers.push(play_handle);
        }
        info!("speech pipeline started");
        Ok(())
    }

    /// Stop both stages and wait for them to exit.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.sink.stop();
        let handles = match self.workers.lock() {
            Ok(mut w) => std::mem::take(&mut *w),
            Err(_) => Vec::new(),
        };
        for handle in handles {
            if handle.join().is_err() {
                error!("speech stage panicked");
            }
        }
    }

    /// Requests waiting for synthesis.
    pub fn pending_text(&self) -> usize {
        self.text_rx.len()
    }

    /// Chunks waiting for playback.
    pub fn pending_audio(&self) -> usize {
        self.audio_rx.len()
    }

    /// Nothing queued, nothing being synthesized and nothing audible.
    pub fn is_idle(&self) -> bool {
        self.text_rx.is_empty()
            && self.audio_rx.is_empty()
            && self.in_flight.load(Ordering::SeqCst) == 0
            && !self.sink.is_busy()
    }
}

impl Voice for SpeechPipeline {
    fn speak(&self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        info!("Assistant: {text}");

        let emotion = self.context.emotion.current();
        let prepared = prepare_for_speech(text, &emotion, self.config.angry_length_threshold);
        if prepared.is_empty() {
            return;
        }

        let request = SpeechRequest {
            text: prepared,
            generation: self.context.generation.current(),
        };
        match self.text_tx.try_send(request) {
            Ok(()) => {}
            Err(TrySendError::Full(req)) => {
                warn!("speech queue full, dropping: {}", req.text);
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("speech queue closed");
            }
        }
    }

    fn interrupt(&self) {
        let generation = self.context.generation.advance();
        let dropped_text = self.text_rx.try_iter().count();
        let dropped_audio = self.audio_rx.try_iter().count();
        self.sink.stop();
        info!(
            "speech interrupted (generation {generation}, dropped {dropped_text} text / {dropped_audio} audio)"
        );
    }

    fn is_playing(&self) -> bool {
        self.sink.is_busy()
    }
}

impl Drop for SpeechPipeline {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

// ── Generation stage ─────────────────────────────────────────────────────

struct GenerationStage {
    context: Arc<AssistantContext>,
    synthesizer: Arc<dyn Synthesizer>,
    text_rx: Receiver<SpeechRequest>,
    audio_tx: Sender<AudioChunk>,
    in_flight: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
}

impl GenerationStage {
    fn run(self) {
        // The synthesizer is async; this thread drives it on its own runtime.
        let rt = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                error!("speech generation runtime failed: {e}");
                return;
            }
        };

        while !self.shutdown.load(Ordering::SeqCst) {
            let request = match self.text_rx.recv_timeout(QUEUE_WAIT) {
                Ok(r) => r,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            self.process(&rt, request);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        debug!("speech generation stage exited");
    }

    fn process(&self, rt: &tokio::runtime::Runtime, request: SpeechRequest) {
        let generation = &self.context.generation;
        if !generation.is_current(request.generation) {
            debug!("dropping stale speech request: {}", request.text);
            return;
        }

        let voice = self.context.settings.voice();
        let audio = match rt.block_on(self.synthesizer.synthesize(&request.text, &voice)) {
            Ok(a) => a,
            Err(e) => {
                warn!("synthesis failed: {e}");
                return;
            }
        };

        if audio.is_empty() || !generation.is_current(request.generation) {
            return;
        }

        let mut chunk = AudioChunk {
            bytes: audio,
            generation: request.generation,
        };
        loop {
            match self.audio_tx.send_timeout(chunk, QUEUE_WAIT) {
                Ok(()) => return,
                Err(SendTimeoutError::Timeout(c)) => {
                    if self.shutdown.load(Ordering::SeqCst) || !generation.is_current(c.generation) {
                        return;
                    }
                    chunk = c;
                }
                Err(SendTimeoutError::Disconnected(_)) => return,
            }
        }
    }
}

// ── Playback stage ───────────────────────────────────────────────────────

struct PlaybackStage {
    context: Arc<AssistantContext>,
    sink: Arc<dyn AudioSink>,
    audio_rx: Receiver<AudioChunk>,
    poll: Duration,
    in_flight: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
}

impl PlaybackStage {
    fn run(self) {
        while !self.shutdown.load(Ordering::SeqCst) {
            let chunk = match self.audio_rx.recv_timeout(QUEUE_WAIT) {
                Ok(c) => c,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            self.in_flight.fetch_add(1, Ordering::SeqCst);
            if let Err(e) = self.play(&chunk) {
                warn!("playback failed: {e}");
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        debug!("speech playback stage exited");
    }

    fn play(&self, chunk: &AudioChunk) -> Result<()> {
        let generation = &self.context.generation;
        if !generation.is_current(chunk.generation) {
            debug!("dropping stale audio chunk");
            return Ok(());
        }

        self.sink.load(&chunk.bytes)?;
        self.context.events.broadcast(ViewerEvent::SpeakStart);

        let started = self.sink.start();
        if started.is_ok() {
            while self.sink.is_busy() {
                if !generation.is_current(chunk.generation) || self.shutdown.load(Ordering::SeqCst) {
                    self.sink.stop();
                    break;
                }
                std::thread::sleep(self.poll);
            }
        }

        self.context.events.broadcast(ViewerEvent::SpeakStop);
        started
    }
}
