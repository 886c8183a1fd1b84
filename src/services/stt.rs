//! Speech-to-text over an OpenAI-compatible transcription endpoint.

use super::{Transcriber, Transcript};
use crate::config::SttConfig;
use crate::error::{AssistantError, Result};
use crate::pipeline::messages::SpeechSegment;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error};

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Whisper-style transcription client.
pub struct WhisperTranscriber {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    language: String,
    api_key: Option<String>,
}

impl WhisperTranscriber {
    /// Build from config. The API key is read from the configured env var;
    /// local servers usually do not need one.
    pub fn new(config: &SttConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: format!(
                "{}/v1/audio/transcriptions",
                config.base_url.trim_end_matches('/')
            ),
            model: config.model.clone(),
            language: config.language.clone(),
            api_key: std::env::var(&config.api_key_env)
                .ok()
                .filter(|k| !k.is_empty()),
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, segment: &SpeechSegment) -> Result<Transcript> {
        let wav = samples_to_wav(&segment.samples, segment.sample_rate)?;
        debug!(wav_bytes = wav.len(), "sending segment for transcription");

        let part = reqwest::multipart::Part::bytes(wav)
            .file_name("speech.wav")
            .mime_str("audio/wav")
            .map_err(|e| AssistantError::Stt(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("language", self.language.clone());

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AssistantError::Stt(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, "transcription service error: {body}");
            return Err(AssistantError::Stt(format!("HTTP {status}: {body}")));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::Stt(format!("bad response: {e}")))?;
        Ok(classify(&parsed.text))
    }
}

/// Map raw service text onto a transcript outcome.
fn classify(text: &str) -> Transcript {
    let text = text.trim();
    if text.is_empty() {
        Transcript::NoSpeech
    } else if !text.chars().any(char::is_alphanumeric) {
        Transcript::Unintelligible
    } else {
        Transcript::Text(text.to_owned())
    }
}

/// Encode mono f32 samples as 16-bit PCM WAV.
///
/// # Errors
///
/// Returns an error if the WAV writer fails.
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| AssistantError::Audio(e.to_string()))?;
        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let pcm = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(pcm)
                .map_err(|e| AssistantError::Audio(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| AssistantError::Audio(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}
