//! Speaker output via cpal, exposed as an [`AudioSink`].
//!
//! A dedicated thread owns the output stream. Clips are decoded with
//! symphonia, resampled to the device rate and read by the stream callback
//! from a shared buffer. When the device reports an error the thread tears
//! the stream down and rebuilds it with exponential backoff.

use super::decode::{decode_clip, resample_linear};
use crate::config::AudioConfig;
use crate::error::{AssistantError, Result};
use crate::services::AudioSink;
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{error, info, warn};

const REINIT_BACKOFF_START: Duration = Duration::from_millis(500);
const REINIT_BACKOFF_MAX: Duration = Duration::from_secs(8);
const SUPERVISE_TICK: Duration = Duration::from_millis(50);

#[derive(Default)]
struct Clip {
    staged: Option<Vec<f32>>,
    samples: Vec<f32>,
    position: usize,
    playing: bool,
}

struct Shared {
    clip: Mutex<Clip>,
    device_rate: AtomicU32,
    needs_reinit: AtomicBool,
    shutdown: AtomicBool,
}

impl Shared {
    fn clip(&self) -> std::sync::MutexGuard<'_, Clip> {
        match self.clip.lock() {
            Ok(c) => c,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Output device playback.
pub struct CpalPlayback {
    shared: Arc<Shared>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl CpalPlayback {
    /// Open the output device and start the supervising thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the device cannot be opened the first time.
    pub fn new(config: &AudioConfig) -> Result<Self> {
        let shared = Arc::new(Shared {
            clip: Mutex::new(Clip::default()),
            device_rate: AtomicU32::new(0),
            needs_reinit: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
        });
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let device_name = config.output_device.clone();
        let thread_shared = Arc::clone(&shared);

        let handle = std::thread::Builder::new()
            .name("speaker".into())
            .spawn(move || supervise(device_name, thread_shared, ready_tx))
            .map_err(|e| AssistantError::Audio(format!("cannot spawn speaker thread: {e}")))?;

        ready_rx
            .recv()
            .map_err(|_| AssistantError::Audio("speaker thread exited during setup".into()))??;

        Ok(Self {
            shared,
            supervisor: Mutex::new(Some(handle)),
        })
    }

    /// List available output devices.
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be enumerated.
    pub fn list_output_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| AssistantError::Audio(format!("cannot enumerate devices: {e}")))?;
        Ok(devices
            .filter_map(|d| d.description().ok().map(|desc| desc.name().to_owned()))
            .collect())
    }
}

impl Drop for CpalPlayback {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        let handle = self.supervisor.lock().ok().and_then(|mut h| h.take());
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            error!("speaker thread panicked");
        }
    }
}

impl AudioSink for CpalPlayback {
    fn load(&self, audio: &[u8]) -> Result<()> {
        let decoded = decode_clip(audio)?;
        let device_rate = self.shared.device_rate.load(Ordering::SeqCst);
        let samples = resample_linear(&decoded.samples, decoded.sample_rate, device_rate);
        let mut clip = self.shared.clip();
        clip.playing = false;
        clip.samples.clear();
        clip.position = 0;
        clip.staged = Some(samples);
        Ok(())
    }

    fn start(&self) -> Result<()> {
        let mut clip = self.shared.clip();
        let samples = clip
            .staged
            .take()
            .ok_or_else(|| AssistantError::Audio("no clip loaded".into()))?;
        clip.samples = samples;
        clip.position = 0;
        clip.playing = true;
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.shared.clip().playing
    }

    fn stop(&self) {
        let mut clip = self.shared.clip();
        clip.playing = false;
        clip.samples.clear();
        clip.position = 0;
    }
}

fn supervise(
    device_name: Option<String>,
    shared: Arc<Shared>,
    ready: std::sync::mpsc::Sender<Result<()>>,
) {
    let mut ready = Some(ready);
    let mut backoff = REINIT_BACKOFF_START;

    while !shared.shutdown.load(Ordering::SeqCst) {
        let stream = match build_stream(device_name.as_deref(), &shared) {
            Ok(stream) => {
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Ok(()));
                }
                backoff = REINIT_BACKOFF_START;
                stream
            }
            Err(e) => {
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Err(e));
                    return;
                }
                warn!("speaker reinit failed, retrying in {backoff:?}: {e}");
                std::thread::sleep(backoff);
                backoff = (backoff * 2).min(REINIT_BACKOFF_MAX);
                continue;
            }
        };

        while !shared.shutdown.load(Ordering::SeqCst)
            && !shared.needs_reinit.load(Ordering::SeqCst)
        {
            std::thread::sleep(SUPERVISE_TICK);
        }
        drop(stream);

        if shared.needs_reinit.swap(false, Ordering::SeqCst) {
            warn!("speaker stream failed, reinitializing in {backoff:?}");
            // The clip in flight is lost with the stream.
            let mut clip = shared.clip();
            clip.playing = false;
            clip.samples.clear();
            drop(clip);
            std::thread::sleep(backoff);
            backoff = (backoff * 2).min(REINIT_BACKOFF_MAX);
        }
    }
    info!("speaker thread stopped");
}

fn build_stream(device_name: Option<&str>, shared: &Arc<Shared>) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => host
            .output_devices()
            .map_err(|e| AssistantError::Audio(format!("cannot enumerate devices: {e}")))?
            .find(|d| {
                d.description()
                    .ok()
                    .is_some_and(|desc| desc.name() == name)
            })
            .ok_or_else(|| AssistantError::Audio(format!("output device '{name}' not found")))?,
        None => host
            .default_output_device()
            .ok_or_else(|| AssistantError::Audio("no default output device".into()))?,
    };

    let default_config = device
        .default_output_config()
        .map_err(|e| AssistantError::Audio(format!("no default output config: {e}")))?;
    let channels = usize::from(default_config.channels().max(1));
    let stream_config = StreamConfig {
        channels: default_config.channels(),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };
    shared
        .device_rate
        .store(default_config.sample_rate(), Ordering::SeqCst);

    let label = device
        .description()
        .map(|d| d.name().to_owned())
        .unwrap_or_else(|_| "<unknown>".into());
    info!(
        "speaker '{label}': {}Hz x{channels}",
        default_config.sample_rate()
    );

    let cb_shared = Arc::clone(shared);
    let err_shared = Arc::clone(shared);
    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let Ok(mut clip) = cb_shared.clip.try_lock() else {
                    data.fill(0.0);
                    return;
                };
                for frame in data.chunks_mut(channels) {
                    let sample = if clip.playing && clip.position < clip.samples.len() {
                        let s = clip.samples[clip.position];
                        clip.position += 1;
                        s
                    } else {
                        if clip.playing {
                            clip.playing = false;
                        }
                        0.0
                    };
                    frame.fill(sample);
                }
            },
            move |err| {
                error!("audio output stream error: {err}");
                err_shared.needs_reinit.store(true, Ordering::SeqCst);
            },
            None,
        )
        .map_err(|e| AssistantError::Audio(format!("failed to build output stream: {e}")))?;

    stream
        .play()
        .map_err(|e| AssistantError::Audio(format!("failed to start output stream: {e}")))?;
    Ok(stream)
}
