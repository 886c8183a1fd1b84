//! Energy-based utterance segmentation.
//!
//! Frames are scored by RMS on the 16-bit sample scale. While waiting for
//! speech the threshold can track the ambient floor:
//!
//! ```text
//! damping   = 0.15 ^ frame_seconds
//! threshold = threshold * damping + (energy * 1.5) * (1 - damping)
//! ```
//!
//! An utterance starts on the first frame above the threshold, is confirmed
//! once it holds at least [`MIN_PHRASE`] of voiced audio, and closes after
//! `pause_threshold` of continuous quiet. A short pre-roll is kept so the
//! first syllable is not clipped.

use crate::config::ListenerConfig;
use crate::pipeline::messages::SpeechSegment;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

const DAMPING: f32 = 0.15;
const DYNAMIC_RATIO: f32 = 1.5;
/// Minimum voiced audio for a phrase to count as speech.
pub const MIN_PHRASE: Duration = Duration::from_millis(300);
const PRE_ROLL: Duration = Duration::from_millis(500);

/// What one frame changed.
#[derive(Debug, Clone)]
pub enum SegmentEvent {
    /// The current phrase just became long enough to be speech.
    SpeechConfirmed,
    /// A complete utterance.
    Completed(SpeechSegment),
}

/// RMS of `frame` on the 16-bit scale.
pub fn frame_energy(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let mean_sq = frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32;
    mean_sq.sqrt() * 32_768.0
}

struct Phrase {
    samples: Vec<f32>,
    started_at: Instant,
    voiced: Duration,
    trailing_quiet: Duration,
    confirmed: bool,
}

pub struct Segmenter {
    sample_rate: u32,
    idle_threshold: f32,
    speaking_threshold: f32,
    dynamic_when_idle: bool,
    pause: Duration,
    energy_threshold: f32,
    dynamic: bool,
    playback_mode: bool,
    pre_roll: VecDeque<Vec<f32>>,
    pre_roll_len: usize,
    phrase: Option<Phrase>,
}

impl Segmenter {
    pub fn new(config: &ListenerConfig, sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            idle_threshold: config.idle_energy_threshold,
            speaking_threshold: config.speaking_energy_threshold,
            dynamic_when_idle: config.dynamic_energy,
            pause: Duration::from_millis(u64::from(config.pause_threshold_ms)),
            energy_threshold: config.idle_energy_threshold,
            dynamic: config.dynamic_energy,
            playback_mode: false,
            pre_roll: VecDeque::new(),
            pre_roll_len: 0,
            phrase: None,
        }
    }

    pub fn energy_threshold(&self) -> f32 {
        self.energy_threshold
    }

    /// No phrase is in progress.
    pub fn is_idle(&self) -> bool {
        self.phrase.is_none()
    }

    fn frame_duration(&self, frame: &[f32]) -> Duration {
        Duration::from_nanos(frame.len() as u64 * 1_000_000_000 / u64::from(self.sample_rate))
    }

    fn adapt(&mut self, energy: f32, frame_secs: f32) {
        let damping = DAMPING.powf(frame_secs);
        let target = energy * DYNAMIC_RATIO;
        self.energy_threshold = self.energy_threshold * damping + target * (1.0 - damping);
    }

    /// Feed one frame of ambient audio during calibration.
    pub fn calibrate(&mut self, frame: &[f32]) {
        let secs = self.frame_duration(frame).as_secs_f32();
        self.adapt(frame_energy(frame), secs);
    }

    /// Switch sensitivity for "the assistant is talking".
    ///
    /// While playback is active the threshold is pinned to the speaking
    /// value and does not adapt. Leaving playback restores the idle value.
    pub fn set_playback_active(&mut self, active: bool) {
        if active == self.playback_mode {
            return;
        }
        self.playback_mode = active;
        if active {
            self.dynamic = false;
            self.energy_threshold = self.speaking_threshold;
        } else {
            self.dynamic = self.dynamic_when_idle;
            self.energy_threshold = self.idle_threshold;
        }
    }

    pub fn playback_active(&self) -> bool {
        self.playback_mode
    }

    /// Feed one captured frame.
    pub fn push(&mut self, frame: &[f32]) -> Option<SegmentEvent> {
        let energy = frame_energy(frame);
        let frame_len = self.frame_duration(frame);
        let loud = energy > self.energy_threshold;

        let Some(phrase) = self.phrase.as_mut() else {
            if !loud {
                if self.dynamic {
                    self.adapt(energy, frame_len.as_secs_f32());
                }
                self.remember_pre_roll(frame);
                return None;
            }
            let mut samples: Vec<f32> = self.pre_roll.drain(..).flatten().collect();
            self.pre_roll_len = 0;
            samples.extend_from_slice(frame);
            let confirmed = frame_len >= MIN_PHRASE;
            self.phrase = Some(Phrase {
                samples,
                started_at: Instant::now(),
                voiced: frame_len,
                trailing_quiet: Duration::ZERO,
                confirmed,
            });
            return confirmed.then_some(SegmentEvent::SpeechConfirmed);
        };

        phrase.samples.extend_from_slice(frame);
        if loud {
            phrase.voiced += frame_len;
            phrase.trailing_quiet = Duration::ZERO;
        } else {
            phrase.trailing_quiet += frame_len;
        }

        if phrase.trailing_quiet >= self.pause {
            let phrase = self.phrase.take()?;
            if !phrase.confirmed {
                // Too short: a click or a cough.
                return None;
            }
            return Some(SegmentEvent::Completed(SpeechSegment {
                samples: phrase.samples,
                sample_rate: self.sample_rate,
                started_at: phrase.started_at,
            }));
        }

        if !phrase.confirmed && phrase.voiced >= MIN_PHRASE {
            phrase.confirmed = true;
            return Some(SegmentEvent::SpeechConfirmed);
        }
        None
    }

    fn remember_pre_roll(&mut self, frame: &[f32]) {
        let max = (PRE_ROLL.as_secs_f64() * f64::from(self.sample_rate)) as usize;
        self.pre_roll.push_back(frame.to_vec());
        self.pre_roll_len += frame.len();
        while self.pre_roll_len > max {
            match self.pre_roll.pop_front() {
                Some(old) => self.pre_roll_len -= old.len(),
                None => break,
            }
        }
    }
}
