//! Stationary spectral gating.
//!
//! Each frequency bin gets a gate at `mean + 1.5 * std` of its dB level over
//! the whole clip. STFT cells below their bin's gate are attenuated, the rest
//! pass untouched, and the clip is rebuilt by weighted overlap-add.

use crate::error::{AssistantError, Result};
use rustfft::FftPlanner;
use rustfft::num_complex::Complex;

const FRAME_SIZE: usize = 512;
const HOP_SIZE: usize = 128;
const STD_THRESHOLD: f32 = 1.5;
/// Gain applied to gated cells.
const FLOOR_GAIN: f32 = 0.05;

fn hann(n: usize) -> f32 {
    0.5 * (1.0 - (2.0 * std::f32::consts::PI * n as f32 / FRAME_SIZE as f32).cos())
}

/// Reduce stationary background noise in `samples`.
///
/// # Errors
///
/// Fails when the clip is shorter than one analysis frame or the result is
/// not finite. Callers keep the raw waveform in that case.
pub fn reduce_noise(samples: &[f32]) -> Result<Vec<f32>> {
    if samples.len() < FRAME_SIZE {
        return Err(AssistantError::Audio(format!(
            "clip too short to denoise ({} samples)",
            samples.len()
        )));
    }

    let num_frames = (samples.len() - FRAME_SIZE) / HOP_SIZE + 1;
    let bins = FRAME_SIZE / 2 + 1;
    let window: Vec<f32> = (0..FRAME_SIZE).map(hann).collect();

    let mut planner = FftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(FRAME_SIZE);
    let inverse = planner.plan_fft_inverse(FRAME_SIZE);

    let mut spectra: Vec<Vec<Complex<f32>>> = Vec::with_capacity(num_frames);
    for i in 0..num_frames {
        let start = i * HOP_SIZE;
        let mut frame: Vec<Complex<f32>> = samples[start..start + FRAME_SIZE]
            .iter()
            .zip(&window)
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();
        forward.process(&mut frame);
        spectra.push(frame);
    }

    let db = |c: &Complex<f32>| 20.0 * c.norm().max(1e-10).log10();

    let mut gates = vec![0.0f32; bins];
    for (bin, gate) in gates.iter_mut().enumerate() {
        let levels: Vec<f32> = spectra.iter().map(|s| db(&s[bin])).collect();
        let mean = levels.iter().sum::<f32>() / levels.len() as f32;
        let var = levels.iter().map(|l| (l - mean).powi(2)).sum::<f32>() / levels.len() as f32;
        *gate = mean + STD_THRESHOLD * var.sqrt();
    }

    let mut output = vec![0.0f32; samples.len()];
    let mut weight = vec![0.0f32; samples.len()];
    for (i, spectrum) in spectra.iter_mut().enumerate() {
        for bin in 0..bins {
            let gain = if db(&spectrum[bin]) > gates[bin] {
                1.0
            } else {
                FLOOR_GAIN
            };
            spectrum[bin] *= gain;
            // Keep the spectrum Hermitian so the inverse stays real.
            if bin != 0 && bin != FRAME_SIZE / 2 {
                spectrum[FRAME_SIZE - bin] *= gain;
            }
        }
        inverse.process(spectrum);

        let start = i * HOP_SIZE;
        for (n, c) in spectrum.iter().enumerate() {
            output[start + n] += c.re / FRAME_SIZE as f32 * window[n];
            weight[start + n] += window[n] * window[n];
        }
    }

    // Edges the frames never covered keep their input.
    for ((out, w), &raw) in output.iter_mut().zip(&weight).zip(samples) {
        if *w > 1e-3 {
            *out /= w;
        } else {
            *out = raw;
        }
    }

    if output.iter().any(|s| !s.is_finite()) {
        return Err(AssistantError::Audio("denoised clip is not finite".into()));
    }
    Ok(output)
}

/// Denoise, falling back to the raw waveform on any failure.
pub fn reduce_noise_or_raw(samples: Vec<f32>) -> Vec<f32> {
    match reduce_noise(&samples) {
        Ok(clean) => clean,
        Err(e) => {
            tracing::debug!("denoise skipped: {e}");
            samples
        }
    }
}
