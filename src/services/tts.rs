//! Text-to-speech over an OpenAI-compatible `/v1/audio/speech` endpoint.
//!
//! The default base URL points at a local edge-tts bridge, which accepts the
//! neural voice ids listed in settings.

use super::Synthesizer;
use crate::config::TtsConfig;
use crate::error::{AssistantError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, error};

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

/// HTTP speech synthesizer.
pub struct HttpSynthesizer {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    response_format: String,
    api_key: Option<String>,
}

impl HttpSynthesizer {
    pub fn new(config: &TtsConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: format!("{}/v1/audio/speech", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            response_format: config.response_format.clone(),
            api_key: std::env::var(&config.api_key_env)
                .ok()
                .filter(|k| !k.is_empty()),
        }
    }
}

#[async_trait]
impl Synthesizer for HttpSynthesizer {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Bytes> {
        debug!(chars = text.len(), voice, "synthesizing");
        let body = SpeechRequest {
            model: &self.model,
            input: text,
            voice,
            response_format: &self.response_format,
        };
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| AssistantError::Tts(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, "speech service error: {body}");
            return Err(AssistantError::Tts(format!("HTTP {status}: {body}")));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| AssistantError::Tts(format!("reading audio: {e}")))?;
        if audio.is_empty() {
            return Err(AssistantError::Tts("empty audio response".into()));
        }
        Ok(audio)
    }
}
