//! The always-on capture loop.
//!
//! ```text
//! open mic ─▶ calibrate ─▶ frames ─▶ segmenter ─▶ (barge-in?) ─▶ denoise ─▶ transcribe ─▶ handler
//!    ▲                                                                                       │
//!    └──────────── stream error / closed: reopen after reconnect delay ◀──────────── exit ◀──┘
//! ```
//!
//! Sensitivity follows the speaker: while the assistant is audible the
//! energy threshold is pinned high so its own voice does not trigger a
//! phrase, and a phrase detected in that state interrupts playback before
//! transcription starts.

use super::capture::{MicSession, Microphone};
use super::denoise::reduce_noise_or_raw;
use super::segmenter::{SegmentEvent, Segmenter};
use crate::config::ListenerConfig;
use crate::events::{EventBus, ViewerEvent};
use crate::pipeline::Voice;
use crate::pipeline::messages::{SpeechSegment, Utterance};
use crate::router::RouteOutcome;
use crate::services::{Transcript, Transcriber};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const STATUS_CALIBRATING: &str = "Adjusting noise...";
pub const STATUS_LISTENING: &str = "Listening...";
pub const STATUS_BARGE_IN: &str = "Listening (Barge-in)...";
pub const STATUS_PROCESSING: &str = "Processing...";
pub const STATUS_RETRYING: &str = "retrying...";
pub const STATUS_IDLE: &str = "Idle";

const CONNECTION_ERROR: &str = "Connection error.";

/// Receives every transcribed utterance.
#[async_trait]
pub trait UtteranceHandler: Send + Sync {
    async fn handle(&self, utterance: Utterance) -> RouteOutcome;
}

enum SessionEnd {
    Exit,
    Reopen,
}

pub struct Listener {
    config: ListenerConfig,
    voice: Arc<dyn Voice>,
    transcriber: Arc<dyn Transcriber>,
    events: EventBus,
}

impl Listener {
    pub fn new(
        config: ListenerConfig,
        voice: Arc<dyn Voice>,
        transcriber: Arc<dyn Transcriber>,
        events: EventBus,
    ) -> Self {
        Self {
            config,
            voice,
            transcriber,
            events,
        }
    }

    fn status(&self, state: &str) {
        debug!("listener: {state}");
        self.events.broadcast(ViewerEvent::Status {
            state: state.to_owned(),
        });
    }

    async fn pause(&self, delay: Duration, cancel: &CancellationToken) {
        tokio::select! {
            () = cancel.cancelled() => {}
            () = tokio::time::sleep(delay) => {}
        }
    }

    /// Listen until the handler returns [`RouteOutcome::Exit`] or `cancel`
    /// fires. Microphone failures are retried forever.
    pub async fn run(
        &self,
        microphone: &dyn Microphone,
        handler: &dyn UtteranceHandler,
        cancel: CancellationToken,
    ) {
        let reconnect = Duration::from_millis(self.config.reconnect_delay_ms);
        info!("listener started");

        while !cancel.is_cancelled() {
            self.status(STATUS_CALIBRATING);
            let session = match microphone.open().await {
                Ok(session) => session,
                Err(e) => {
                    warn!("microphone unavailable: {e}");
                    self.status(STATUS_RETRYING);
                    self.pause(reconnect, &cancel).await;
                    continue;
                }
            };
            info!("microphone session opened at {}Hz", session.sample_rate);

            match self.listen_session(session, handler, &cancel).await {
                SessionEnd::Exit => break,
                SessionEnd::Reopen => {
                    self.status(STATUS_RETRYING);
                    self.pause(reconnect, &cancel).await;
                }
            }
        }

        self.status(STATUS_IDLE);
        info!("listener stopped");
    }

    async fn listen_session(
        &self,
        mut session: MicSession,
        handler: &dyn UtteranceHandler,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        let mut segmenter = Segmenter::new(&self.config, session.sample_rate);
        let calibration = u64::from(self.config.calibration_ms) * u64::from(session.sample_rate) / 1000;
        let mut calibrated = 0u64;
        let mut announced: Option<&'static str> = None;

        loop {
            let frame = tokio::select! {
                () = cancel.cancelled() => return SessionEnd::Exit,
                frame = session.frames.recv() => frame,
            };
            let frame = match frame {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    warn!("stream error, restarting microphone: {e}");
                    return SessionEnd::Reopen;
                }
                None => {
                    warn!("microphone stream closed, restarting");
                    return SessionEnd::Reopen;
                }
            };

            if calibrated < calibration {
                segmenter.calibrate(&frame);
                calibrated += frame.len() as u64;
                if calibrated >= calibration {
                    debug!("calibrated threshold {:.0}", segmenter.energy_threshold());
                }
                continue;
            }

            // Sensitivity only changes between phrases.
            if segmenter.is_idle() {
                let speaking = self.voice.is_playing();
                segmenter.set_playback_active(speaking);
                let state = if speaking { STATUS_BARGE_IN } else { STATUS_LISTENING };
                if announced != Some(state) {
                    self.status(state);
                    announced = Some(state);
                }
            }

            match segmenter.push(&frame) {
                Some(SegmentEvent::SpeechConfirmed) => {
                    if self.voice.is_playing() {
                        info!("barge-in detected, stopping speech");
                        self.voice.interrupt();
                    }
                }
                Some(SegmentEvent::Completed(segment)) => {
                    announced = None;
                    if self.process(segment, handler, cancel).await == RouteOutcome::Exit {
                        return SessionEnd::Exit;
                    }
                }
                None => {}
            }
        }
    }

    async fn process(
        &self,
        mut segment: SpeechSegment,
        handler: &dyn UtteranceHandler,
        cancel: &CancellationToken,
    ) -> RouteOutcome {
        if self.config.denoise {
            segment.samples = reduce_noise_or_raw(std::mem::take(&mut segment.samples));
        }

        self.status(STATUS_PROCESSING);
        match self.transcriber.transcribe(&segment).await {
            Ok(Transcript::Text(text)) => {
                info!("heard: {text}");
                handler.handle(Utterance::now(text.to_lowercase())).await
            }
            Ok(Transcript::NoSpeech) => {
                debug!("no speech in segment");
                RouteOutcome::Continue
            }
            Ok(Transcript::Unintelligible) => {
                debug!("segment not understood");
                RouteOutcome::Continue
            }
            Err(e) => {
                warn!("transcription failed: {e}");
                self.voice.speak(CONNECTION_ERROR);
                self.pause(Duration::from_millis(self.config.connection_backoff_ms), cancel)
                    .await;
                RouteOutcome::Continue
            }
        }
    }
}
