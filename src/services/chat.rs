//! Conversational replies.
//!
//! [`OllamaChat`] streams from a local Ollama server and hands each finished
//! sentence to the caller while the rest is still generating.
//! [`keyword_reply`] is the canned fallback used when no model is configured.

use super::{ChatMessage, ChatModel};
use crate::config::ChatConfig;
use crate::error::{AssistantError, Result};
use crate::pipeline::text::sentence_end;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

/// Streaming client for Ollama's `/api/chat`.
pub struct OllamaChat {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OllamaChat {
    pub fn new(config: &ChatConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: format!("{}/api/chat", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl ChatModel for OllamaChat {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        on_sentence: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role,
                    content: &m.content,
                })
                .collect(),
            stream: true,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AssistantError::Chat(format!("request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, "chat model error: {body}");
            return Err(AssistantError::Chat(format!("HTTP {status}: {body}")));
        }

        let mut stream = response.bytes_stream();
        let mut lines = LineBuffer::default();
        let mut sentences = SentenceSplitter::default();
        let mut done = false;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| AssistantError::Chat(format!("stream error: {e}")))?;
            lines.extend(&chunk);

            while let Some(line) = lines.next_line() {
                if parse_line(&line, &mut sentences, on_sentence)? {
                    done = true;
                }
            }
            if done {
                break;
            }
        }
        if !done && let Some(rest) = lines.remainder() {
            parse_line(&rest, &mut sentences, on_sentence)?;
        }

        let full = sentences.finish(on_sentence);
        debug!(chars = full.len(), "chat reply complete");
        Ok(full)
    }
}

/// Raw stream bytes split on `\n`.
///
/// Lines are decoded only once complete so a character split across two
/// network chunks survives intact.
#[derive(Default)]
struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn next_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.buf.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Trailing bytes without a final newline, if any are non-blank.
    fn remainder(&mut self) -> Option<String> {
        let rest = String::from_utf8_lossy(&std::mem::take(&mut self.buf)).into_owned();
        (!rest.trim().is_empty()).then_some(rest)
    }
}

/// Feed one NDJSON line. Returns `true` once the model reports completion.
fn parse_line(
    line: &str,
    sentences: &mut SentenceSplitter,
    on_sentence: &(dyn Fn(&str) + Send + Sync),
) -> Result<bool> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(false);
    }
    let chunk: ChatChunk = serde_json::from_str(line)
        .map_err(|e| AssistantError::Chat(format!("bad stream chunk: {e}")))?;
    if let Some(err) = chunk.error {
        return Err(AssistantError::Chat(err));
    }
    if let Some(message) = chunk.message {
        sentences.push(&message.content, on_sentence);
    }
    Ok(chunk.done)
}

/// Accumulates streamed tokens and emits whole sentences.
#[derive(Default)]
struct SentenceSplitter {
    pending: String,
    full: String,
}

impl SentenceSplitter {
    fn push(&mut self, token: &str, on_sentence: &(dyn Fn(&str) + Send + Sync)) {
        self.pending.push_str(token);
        self.full.push_str(token);
        while let Some(end) = sentence_end(&self.pending) {
            let sentence: String = self.pending.drain(..end).collect();
            let sentence = sentence.trim();
            if !sentence.is_empty() {
                on_sentence(sentence);
            }
        }
    }

    fn finish(self, on_sentence: &(dyn Fn(&str) + Send + Sync)) -> String {
        let rest = self.pending.trim();
        if !rest.is_empty() {
            on_sentence(rest);
        }
        self.full
    }
}

/// Canned reply for small talk when no chat model is available.
pub fn keyword_reply(text: &str) -> &'static str {
    let text = text.to_lowercase();
    let has_word = |w: &str| {
        text.split(|c: char| !c.is_alphanumeric())
            .any(|word| word == w)
    };

    if ["hello", "hi", "hey"].iter().any(|w| has_word(w)) {
        "Hello there! How can I help you today?"
    } else if text.contains("how are you") {
        "I'm functioning perfectly, thank you for asking! How are you doing?"
    } else if ["i am fine", "i am good", "doing good", "doing well"]
        .iter()
        .any(|p| text.contains(p))
    {
        "That is wonderful to hear!"
    } else if text.contains("not good") || has_word("bad") || has_word("sad") {
        "I am sorry to hear that. I hope I can make your day a little better."
    } else if text.contains("your name") {
        "I don't have a name yet, but I am your personal assistant."
    } else if text.contains("who are you") {
        "I am an AI assistant designed to help you with things."
    } else if text.contains("cute") {
        "Aww, thank you! You are too kind."
    } else if text.contains("thank") {
        "You are very welcome!"
    } else if text.contains("love you") {
        "That is so sweet! I think you are great too."
    } else {
        "I heard you, but I'm not sure how to reply to that specific thing yet."
    }
}
