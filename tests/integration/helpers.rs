//! Shared helpers for integration tests.

use async_trait::async_trait;
use bytes::Bytes;
use jarvis::config::{AssistantConfig, ServicesConfig};
use jarvis::error::Result;
use jarvis::pipeline::Voice;
use jarvis::services::knowledge::Wikipedia;
use jarvis::services::network::HttpNetworkInfo;
use jarvis::services::search::DuckDuckGo;
use jarvis::services::{AudioSink, Services, Synthesizer};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use wiremock::MockServer;

/// Voice that records every line instead of speaking it.
#[derive(Default)]
pub(crate) struct RecordingVoice {
    lines: Mutex<Vec<String>>,
}

impl RecordingVoice {
    pub(crate) fn spoken(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

impl Voice for RecordingVoice {
    fn speak(&self, text: &str) {
        self.lines.lock().unwrap().push(text.to_owned());
    }

    fn interrupt(&self) {}

    fn is_playing(&self) -> bool {
        false
    }
}

/// Synthesizer that returns the text bytes and remembers `(text, voice)`.
#[derive(Default)]
pub(crate) struct EchoSynthesizer {
    requests: Mutex<Vec<(String, String)>>,
}

impl EchoSynthesizer {
    pub(crate) fn texts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(text, _)| text.clone())
            .collect()
    }

    pub(crate) fn voices(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, voice)| voice.clone())
            .collect()
    }
}

#[async_trait]
impl Synthesizer for EchoSynthesizer {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Bytes> {
        self.requests
            .lock()
            .unwrap()
            .push((text.to_owned(), voice.to_owned()));
        Ok(Bytes::copy_from_slice(text.as_bytes()))
    }
}

/// Sink whose clips finish the instant they start.
#[derive(Default)]
pub(crate) struct InstantSink {
    played: Mutex<Vec<Vec<u8>>>,
    staged: Mutex<Option<Vec<u8>>>,
}

impl InstantSink {
    pub(crate) fn played(&self) -> usize {
        self.played.lock().unwrap().len()
    }
}

impl AudioSink for InstantSink {
    fn load(&self, audio: &[u8]) -> Result<()> {
        *self.staged.lock().unwrap() = Some(audio.to_vec());
        Ok(())
    }

    fn start(&self) -> Result<()> {
        if let Some(clip) = self.staged.lock().unwrap().take() {
            self.played.lock().unwrap().push(clip);
        }
        Ok(())
    }

    fn is_busy(&self) -> bool {
        false
    }

    fn stop(&self) {
        self.staged.lock().unwrap().take();
    }
}

/// Service URLs pointing at `server`.
pub(crate) fn services_config(server: &MockServer) -> ServicesConfig {
    let base = server.uri();
    ServicesConfig {
        wikipedia_url: format!("{base}/wiki"),
        search_url: format!("{base}/html/"),
        ip_url: format!("{base}/ip"),
        location_url: format!("{base}/geo"),
        weather_url: format!("{base}/weather"),
        vision_url: None,
        app_launch: false,
        timeout_secs: 5,
    }
}

/// HTTP-backed knowledge, search and network collaborators against `server`;
/// every optional capability left out.
pub(crate) fn http_services(server: &MockServer) -> Services {
    let config = services_config(server);
    let client = jarvis::services::http_client(config.timeout_secs);
    Services {
        chat: None,
        knowledge: Arc::new(Wikipedia::new(&config.wikipedia_url, client.clone())),
        search: Arc::new(DuckDuckGo::new(&config.search_url, client.clone())),
        network: Arc::new(HttpNetworkInfo::new(&config, client)),
        vision: None,
        opener: None,
        launcher: None,
        system_control: None,
        system_monitor: None,
    }
}

/// Config rooted in `dir` with the viewer server off.
pub(crate) fn temp_config(dir: &std::path::Path, server: &MockServer) -> AssistantConfig {
    let mut config = AssistantConfig::default();
    config.data_dir = Some(dir.to_path_buf());
    config.events.enabled = false;
    config.chat.enabled = false;
    config.services = services_config(server);
    config
}

/// Poll `cond` every 10 ms until it holds or `timeout` elapses.
pub(crate) async fn eventually(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

/// A minimal DuckDuckGo HTML results page. `ads` are marked as sponsored.
pub(crate) fn results_page(snippets: &[&str], ads: &[&str]) -> String {
    let mut body = String::from("<html><body><div id=\"links\">");
    for ad in ads {
        body.push_str(&format!(
            "<div class=\"result result--ad\"><a class=\"result__snippet\">{ad}</a></div>"
        ));
    }
    for snippet in snippets {
        body.push_str(&format!(
            "<div class=\"result results_links web-result\"><a class=\"result__snippet\">{snippet}</a></div>"
        ));
    }
    body.push_str("</div></body></html>");
    body
}
