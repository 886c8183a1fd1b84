//! Shared fakes for unit tests.

use crate::error::{AssistantError, Result};
use crate::pipeline::Voice;
use crate::services::{
    AppLauncher, AudioSink, CenterObject, ChatMessage, ChatModel, Knowledge, KnowledgeBase,
    NetworkInfo, Services, Synthesizer, SystemAction, SystemControl, SystemMonitor, UrlOpener,
    Vision, WebSearch,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Poll `cond` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

/// Synthesizer that "encodes" text as its UTF-8 bytes.
pub struct FakeSynthesizer {
    requests: Mutex<Vec<String>>,
    delay: Duration,
    fail: bool,
}

impl FakeSynthesizer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            fail: false,
        })
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            delay,
            fail: false,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            fail: true,
        })
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str, _voice: &str) -> Result<Bytes> {
        if let Ok(mut r) = self.requests.lock() {
            r.push(text.to_owned());
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(AssistantError::Tts("synthesizer offline".into()));
        }
        Ok(Bytes::copy_from_slice(text.as_bytes()))
    }
}

#[derive(Default)]
struct SinkState {
    staged: Option<String>,
    playing_until: Option<Instant>,
    played: Vec<String>,
}

/// Sink that "plays" each clip for a fixed duration.
pub struct FakeSink {
    state: Mutex<SinkState>,
    duration: Duration,
}

impl FakeSink {
    pub fn new() -> Arc<Self> {
        Self::with_duration(Duration::from_millis(1))
    }

    pub fn with_duration(duration: Duration) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SinkState::default()),
            duration,
        })
    }

    /// Clips that were started, decoded back to text.
    pub fn played(&self) -> Vec<String> {
        self.state.lock().map(|s| s.played.clone()).unwrap_or_default()
    }
}

impl AudioSink for FakeSink {
    fn load(&self, audio: &[u8]) -> Result<()> {
        let mut s = self
            .state
            .lock()
            .map_err(|_| AssistantError::Audio("poisoned".into()))?;
        s.staged = Some(String::from_utf8_lossy(audio).into_owned());
        s.playing_until = None;
        Ok(())
    }

    fn start(&self) -> Result<()> {
        let mut s = self
            .state
            .lock()
            .map_err(|_| AssistantError::Audio("poisoned".into()))?;
        if let Some(clip) = s.staged.take() {
            s.played.push(clip);
            s.playing_until = Some(Instant::now() + self.duration);
        }
        Ok(())
    }

    fn is_busy(&self) -> bool {
        self.state
            .lock()
            .map(|s| s.playing_until.is_some_and(|t| Instant::now() < t))
            .unwrap_or(false)
    }

    fn stop(&self) {
        if let Ok(mut s) = self.state.lock() {
            s.playing_until = None;
        }
    }
}

/// Voice that records what it was asked to say.
#[derive(Default)]
pub struct RecordingVoice {
    spoken: Mutex<Vec<String>>,
    interrupts: AtomicUsize,
    playing: AtomicBool,
}

impl RecordingVoice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn interrupts(&self) -> usize {
        self.interrupts.load(Ordering::SeqCst)
    }

    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::SeqCst);
    }
}

impl Voice for RecordingVoice {
    fn speak(&self, text: &str) {
        if let Ok(mut s) = self.spoken.lock() {
            s.push(text.to_owned());
        }
    }

    fn interrupt(&self) {
        self.interrupts.fetch_add(1, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

struct FakeState {
    opened: Vec<String>,
    launched: Vec<String>,
    launch_fails: bool,
    knowledge: Knowledge,
    knowledge_queries: Vec<String>,
    search_results: Vec<String>,
    search_queries: Vec<String>,
    location: Option<String>,
    center: Option<CenterObject>,
    chat_requests: Vec<Vec<ChatMessage>>,
    chat_fails: bool,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            opened: Vec::new(),
            launched: Vec::new(),
            launch_fails: false,
            knowledge: Knowledge::NotFound,
            knowledge_queries: Vec::new(),
            search_results: Vec::new(),
            search_queries: Vec::new(),
            location: Some("Lyon, Auvergne-Rhone-Alpes, France".to_owned()),
            center: None,
            chat_requests: Vec::new(),
            chat_fails: false,
        }
    }
}

/// One object standing in for every router collaborator.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

impl FakeBackend {
    fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        match self.state.lock() {
            Ok(mut s) => f(&mut s),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl ChatModel for FakeBackend {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        on_sentence: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<String> {
        let fails = self.with(|s| {
            s.chat_requests.push(messages.to_vec());
            s.chat_fails
        });
        if fails {
            return Err(AssistantError::Chat("model offline".into()));
        }
        on_sentence("Once upon a time.");
        on_sentence("The end.");
        Ok("Once upon a time. The end.".to_owned())
    }
}

#[async_trait]
impl KnowledgeBase for FakeBackend {
    async fn lookup(&self, query: &str) -> Result<Knowledge> {
        Ok(self.with(|s| {
            s.knowledge_queries.push(query.to_owned());
            s.knowledge.clone()
        }))
    }
}

#[async_trait]
impl WebSearch for FakeBackend {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>> {
        Ok(self.with(|s| {
            s.search_queries.push(query.to_owned());
            s.search_results.iter().take(max_results).cloned().collect()
        }))
    }
}

#[async_trait]
impl NetworkInfo for FakeBackend {
    async fn public_ip(&self) -> Result<String> {
        Ok("203.0.113.7".to_owned())
    }

    async fn location(&self) -> Result<Option<String>> {
        Ok(self.with(|s| s.location.clone()))
    }

    async fn weather(&self, _city: &str) -> Result<Option<String>> {
        Ok(Some("Sunny +20°C".to_owned()))
    }
}

#[async_trait]
impl Vision for FakeBackend {
    async fn center_object(&self) -> Result<Option<CenterObject>> {
        Ok(self.with(|s| s.center.clone()))
    }

    async fn object_names(&self) -> Result<Vec<String>> {
        Ok(vec!["cup".to_owned(), "laptop".to_owned()])
    }

    async fn describe_scene(&self) -> Result<String> {
        Ok("I see a cup and a laptop.".to_owned())
    }
}

impl UrlOpener for FakeBackend {
    fn open_url(&self, url: &str) -> Result<()> {
        self.with(|s| s.opened.push(url.to_owned()));
        Ok(())
    }
}

impl AppLauncher for FakeBackend {
    fn launch(&self, app_name: &str) -> Result<()> {
        let fails = self.with(|s| {
            s.launched.push(app_name.to_owned());
            s.launch_fails
        });
        if fails {
            return Err(AssistantError::Unavailable(app_name.to_owned()));
        }
        Ok(())
    }
}

impl SystemControl for FakeBackend {
    fn perform(&self, action: SystemAction) -> Result<String> {
        Ok(match action {
            SystemAction::Screenshot => "Screenshot taken.",
            SystemAction::VolumeUp => "Volume increased.",
            SystemAction::VolumeDown => "Volume decreased.",
            SystemAction::Mute => "System muted.",
        }
        .to_owned())
    }
}

impl SystemMonitor for FakeBackend {
    fn status_report(&self) -> Result<String> {
        Ok("CPU usage is at 12.5 percent. Memory usage is at 40.0 percent.".to_owned())
    }
}

/// Builder for a [`Services`] set backed by [`FakeBackend`].
pub struct FakeServices {
    backend: Arc<FakeBackend>,
    chat: bool,
    vision: bool,
    desktop: bool,
}

impl Default for FakeServices {
    fn default() -> Self {
        Self {
            backend: Arc::new(FakeBackend::default()),
            chat: true,
            vision: true,
            desktop: true,
        }
    }
}

impl FakeServices {
    pub fn services(&self) -> Services {
        let b = &self.backend;
        Services {
            chat: self.chat.then(|| Arc::clone(b) as Arc<dyn ChatModel>),
            knowledge: Arc::clone(b) as Arc<dyn KnowledgeBase>,
            search: Arc::clone(b) as Arc<dyn WebSearch>,
            network: Arc::clone(b) as Arc<dyn NetworkInfo>,
            vision: self.vision.then(|| Arc::clone(b) as Arc<dyn Vision>),
            opener: self.desktop.then(|| Arc::clone(b) as Arc<dyn UrlOpener>),
            launcher: self.desktop.then(|| Arc::clone(b) as Arc<dyn AppLauncher>),
            system_control: self.desktop.then(|| Arc::clone(b) as Arc<dyn SystemControl>),
            system_monitor: self.desktop.then(|| Arc::clone(b) as Arc<dyn SystemMonitor>),
        }
    }

    pub fn without_chat(&mut self) {
        self.chat = false;
    }

    pub fn without_vision(&mut self) {
        self.vision = false;
    }

    /// Drop the opener, launcher, system control and monitor.
    pub fn without_desktop(&mut self) {
        self.desktop = false;
    }

    pub fn fail_launch(&self) {
        self.backend.with(|s| s.launch_fails = true);
    }

    pub fn fail_chat(&self) {
        self.backend.with(|s| s.chat_fails = true);
    }

    pub fn set_knowledge(&self, knowledge: Knowledge) {
        self.backend.with(|s| s.knowledge = knowledge);
    }

    pub fn set_search_results(&self, results: Vec<String>) {
        self.backend.with(|s| s.search_results = results);
    }

    pub fn set_location(&self, location: Option<String>) {
        self.backend.with(|s| s.location = location);
    }

    pub fn set_center_object(&self, object: Option<CenterObject>) {
        self.backend.with(|s| s.center = object);
    }

    pub fn opened(&self) -> Vec<String> {
        self.backend.with(|s| s.opened.clone())
    }

    pub fn launched(&self) -> Vec<String> {
        self.backend.with(|s| s.launched.clone())
    }

    pub fn knowledge_queries(&self) -> Vec<String> {
        self.backend.with(|s| s.knowledge_queries.clone())
    }

    pub fn search_queries(&self) -> Vec<String> {
        self.backend.with(|s| s.search_queries.clone())
    }

    pub fn chat_requests(&self) -> Vec<Vec<ChatMessage>> {
        self.backend.with(|s| s.chat_requests.clone())
    }
}
