//! Microphone capture, utterance segmentation, noise reduction and speaker
//! playback via cpal.

pub mod capture;
pub mod decode;
pub mod denoise;
pub mod listener;
pub mod playback;
pub mod segmenter;
