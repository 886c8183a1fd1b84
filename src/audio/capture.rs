//! Microphone capture using cpal.
//!
//! Captures at the device's native rate and channel count, then downmixes
//! and downsamples to the configured input rate. A cpal stream cannot leave
//! the thread that built it, so each session owns a small thread that holds
//! the stream until the session's receiver is dropped.

use crate::config::AudioConfig;
use crate::error::{AssistantError, Result};
use async_trait::async_trait;
use cpal::StreamConfig;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Frames buffered between the audio callback and the listener.
const FRAME_QUEUE: usize = 256;

/// One open microphone session.
///
/// The frame channel yields `Ok(frame)` per callback and `Err` when the
/// device reports a stream error. A closed channel means the stream ended.
pub struct MicSession {
    pub frames: mpsc::Receiver<Result<Vec<f32>>>,
    pub sample_rate: u32,
}

/// Something that can open microphone sessions.
#[async_trait]
pub trait Microphone: Send + Sync {
    /// Open a fresh session.
    async fn open(&self) -> Result<MicSession>;
}

/// Default-or-named input device via cpal.
pub struct CpalMicrophone {
    device_name: Option<String>,
    target_sample_rate: u32,
}

impl CpalMicrophone {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            device_name: config.input_device.clone(),
            target_sample_rate: config.input_sample_rate,
        }
    }

    /// List available input devices.
    ///
    /// # Errors
    ///
    /// Returns an error if devices cannot be enumerated.
    pub fn list_input_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| AssistantError::Audio(format!("cannot enumerate devices: {e}")))?;
        Ok(devices
            .filter_map(|d| d.description().ok().map(|desc| desc.name().to_owned()))
            .collect())
    }
}

fn find_input_device(name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();
    match name {
        Some(name) => host
            .input_devices()
            .map_err(|e| AssistantError::Audio(format!("cannot enumerate devices: {e}")))?
            .find(|d| {
                d.description()
                    .ok()
                    .is_some_and(|desc| desc.name() == name)
            })
            .ok_or_else(|| AssistantError::Audio(format!("input device '{name}' not found"))),
        None => host
            .default_input_device()
            .ok_or_else(|| AssistantError::Audio("no default input device".into())),
    }
}

#[async_trait]
impl Microphone for CpalMicrophone {
    async fn open(&self) -> Result<MicSession> {
        let (tx, rx) = mpsc::channel(FRAME_QUEUE);
        let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();
        let device_name = self.device_name.clone();
        let target_rate = self.target_sample_rate;

        std::thread::Builder::new()
            .name("mic-session".into())
            .spawn(move || {
                let stream = match build_stream(device_name.as_deref(), target_rate, tx.clone()) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                while !tx.is_closed() {
                    std::thread::sleep(Duration::from_millis(100));
                }
                drop(stream);
                info!("microphone session closed");
            })
            .map_err(|e| AssistantError::Audio(format!("cannot spawn mic thread: {e}")))?;

        ready_rx
            .await
            .map_err(|_| AssistantError::Audio("mic thread exited during setup".into()))??;

        Ok(MicSession {
            frames: rx,
            sample_rate: target_rate,
        })
    }
}

fn build_stream(
    device_name: Option<&str>,
    target_rate: u32,
    tx: mpsc::Sender<Result<Vec<f32>>>,
) -> Result<cpal::Stream> {
    let device = find_input_device(device_name)?;
    let label = device
        .description()
        .map(|d| d.name().to_owned())
        .unwrap_or_else(|_| "<unknown>".into());

    let default_config = device
        .default_input_config()
        .map_err(|e| AssistantError::Audio(format!("no default input config: {e}")))?;
    let native_rate = default_config.sample_rate();
    let native_channels = default_config.channels();
    let stream_config = StreamConfig {
        channels: native_channels,
        sample_rate: native_rate,
        buffer_size: cpal::BufferSize::Default,
    };
    info!("microphone '{label}': {native_rate}Hz x{native_channels} -> {target_rate}Hz");

    let err_tx = tx.clone();
    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                let mono = if native_channels > 1 {
                    to_mono(data, native_channels)
                } else {
                    data.to_vec()
                };
                let samples = downsample(&mono, native_rate, target_rate);
                // Never block the audio thread.
                if tx.try_send(Ok(samples)).is_err() {
                    debug!("frame queue full, dropping frame");
                }
            },
            move |err| {
                error!("audio input stream error: {err}");
                let _ = err_tx.try_send(Err(AssistantError::Audio(err.to_string())));
            },
            None,
        )
        .map_err(|e| AssistantError::Audio(format!("failed to build input stream: {e}")))?;

    stream
        .play()
        .map_err(|e| AssistantError::Audio(format!("failed to start input stream: {e}")))?;
    Ok(stream)
}

/// Average interleaved channels into mono.
pub(crate) fn to_mono(data: &[f32], channels: u16) -> Vec<f32> {
    let ch = usize::from(channels.max(1));
    data.chunks_exact(ch)
        .map(|frame| frame.iter().sum::<f32>() / ch as f32)
        .collect()
}

/// Linear-interpolation downsampler. Speech energy sits below 8 kHz, so no
/// anti-alias filter is applied for 48 kHz → 16 kHz.
pub(crate) fn downsample(samples: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || samples.is_empty() || dst_rate == 0 {
        return samples.to_vec();
    }

    let ratio = f64::from(src_rate) / f64::from(dst_rate);
    let out_len = (samples.len() as f64 / ratio) as usize;
    let mut output = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 * ratio;
        let idx = src_pos as usize;
        let frac = src_pos - idx as f64;

        let sample = if idx + 1 < samples.len() {
            f64::from(samples[idx]) * (1.0 - frac) + f64::from(samples[idx + 1]) * frac
        } else {
            f64::from(samples[idx.min(samples.len() - 1)])
        };
        output.push(sample as f32);
    }
    output
}
