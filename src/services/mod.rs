//! External collaborators and the capability registry.
//!
//! Each collaborator is a trait so the pipeline, router and listener can be
//! driven by fakes in tests. [`Services::resolve`] builds the production set
//! once at startup; optional collaborators that cannot be set up on this
//! machine are left as `None` and the router answers with a spoken
//! "not available" line instead.

pub mod chat;
pub mod desktop;
pub mod knowledge;
pub mod network;
pub mod search;
pub mod stt;
pub mod tts;
pub mod vision;

use crate::config::AssistantConfig;
use crate::error::Result;
use crate::pipeline::messages::SpeechSegment;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Outcome of a transcription attempt that reached the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transcript {
    /// Recognized text.
    Text(String),
    /// The segment contained no speech.
    NoSpeech,
    /// Speech was present but could not be understood.
    Unintelligible,
}

/// Speech-to-text.
///
/// Errors mean the service could not be reached or answered garbage.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, segment: &SpeechSegment) -> Result<Transcript>;
}

/// Text-to-speech: returns encoded audio for `text` in `voice`.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Bytes>;
}

/// Output device for encoded audio.
///
/// Mirrors a music mixer: load a clip, start it, poll whether it is still
/// playing, stop it early.
pub trait AudioSink: Send + Sync {
    /// Decode and stage `audio`, replacing anything staged or playing.
    fn load(&self, audio: &[u8]) -> Result<()>;
    /// Start playing the staged clip. Returns immediately.
    fn start(&self) -> Result<()>;
    /// Whether a clip is currently audible.
    fn is_busy(&self) -> bool;
    /// Silence output and discard the current clip.
    fn stop(&self);
}

/// One message of chat context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant",
            content: content.into(),
        }
    }
}

/// Conversational model that streams its reply sentence by sentence.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a reply, calling `on_sentence` as each sentence completes.
    /// Returns the full reply text.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        on_sentence: &(dyn for<'a> Fn(&'a str) + Send + Sync),
    ) -> Result<String>;
}

/// Encyclopedia lookup result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Knowledge {
    /// Short summary (first two sentences).
    Summary(String),
    /// The subject matches several pages.
    Ambiguous,
    /// Nothing found.
    NotFound,
}

#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn lookup(&self, query: &str) -> Result<Knowledge>;
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Up to `max_results` result snippets, best first.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>>;
}

/// IP, location and weather lookups.
#[async_trait]
pub trait NetworkInfo: Send + Sync {
    /// Public IP address of this network.
    async fn public_ip(&self) -> Result<String>;
    /// Approximate location as "City, Region, Country".
    async fn location(&self) -> Result<Option<String>>;
    /// Short weather line for `city`, e.g. "Sunny +21°C".
    ///
    /// `Ok(None)` means the service answered but had nothing usable;
    /// `Err` means it could not be reached.
    async fn weather(&self, city: &str) -> Result<Option<String>>;
}

/// Object in the middle of the camera frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CenterObject {
    pub label: String,
    pub color: Option<String>,
}

/// Camera-based object recognition.
#[async_trait]
pub trait Vision: Send + Sync {
    async fn center_object(&self) -> Result<Option<CenterObject>>;
    async fn object_names(&self) -> Result<Vec<String>>;
    /// Spoken summary of the whole frame.
    async fn describe_scene(&self) -> Result<String>;
}

/// Opens URLs in the default browser.
pub trait UrlOpener: Send + Sync {
    fn open_url(&self, url: &str) -> Result<()>;
}

/// Launches installed applications by spoken name.
pub trait AppLauncher: Send + Sync {
    fn launch(&self, app_name: &str) -> Result<()>;
}

/// Screen and volume actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemAction {
    Screenshot,
    VolumeUp,
    VolumeDown,
    Mute,
}

pub trait SystemControl: Send + Sync {
    /// Perform `action`, returning the line to speak.
    fn perform(&self, action: SystemAction) -> Result<String>;
}

/// CPU / memory / battery readings.
pub trait SystemMonitor: Send + Sync {
    fn status_report(&self) -> Result<String>;
}

/// An optional collaborator the router may have to do without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Chat,
    Vision,
    AppLaunch,
    UrlOpen,
    SystemControl,
    SystemStatus,
}

/// Which optional capabilities resolved at startup.
///
/// The router checks this before dispatching a command that needs one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub chat: bool,
    pub vision: bool,
    pub app_launch: bool,
    pub url_open: bool,
    pub system_control: bool,
    pub system_status: bool,
}

impl Capabilities {
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Chat => self.chat,
            Capability::Vision => self.vision,
            Capability::AppLaunch => self.app_launch,
            Capability::UrlOpen => self.url_open,
            Capability::SystemControl => self.system_control,
            Capability::SystemStatus => self.system_status,
        }
    }
}

/// The full collaborator set used by the router.
#[derive(Clone)]
pub struct Services {
    pub chat: Option<Arc<dyn ChatModel>>,
    pub knowledge: Arc<dyn KnowledgeBase>,
    pub search: Arc<dyn WebSearch>,
    pub network: Arc<dyn NetworkInfo>,
    pub vision: Option<Arc<dyn Vision>>,
    pub opener: Option<Arc<dyn UrlOpener>>,
    pub launcher: Option<Arc<dyn AppLauncher>>,
    pub system_control: Option<Arc<dyn SystemControl>>,
    pub system_monitor: Option<Arc<dyn SystemMonitor>>,
}

impl Services {
    /// Build the production collaborators and probe optional ones.
    pub fn resolve(config: &AssistantConfig) -> Self {
        let client = http_client(config.services.timeout_secs);
        let screenshots = config.resolved_data_dir().join("screenshots");

        let services = Self {
            chat: config
                .chat
                .enabled
                .then(|| Arc::new(chat::OllamaChat::new(&config.chat, client.clone())) as Arc<dyn ChatModel>),
            knowledge: Arc::new(knowledge::Wikipedia::new(
                &config.services.wikipedia_url,
                client.clone(),
            )),
            search: Arc::new(search::DuckDuckGo::new(&config.services.search_url, client.clone())),
            network: Arc::new(network::HttpNetworkInfo::new(&config.services, client.clone())),
            vision: config
                .services
                .vision_url
                .as_deref()
                .map(|url| Arc::new(vision::HttpVision::new(url, client)) as Arc<dyn Vision>),
            opener: desktop::SystemOpener::detect().map(|o| Arc::new(o) as Arc<dyn UrlOpener>),
            launcher: config
                .services
                .app_launch
                .then(desktop::PathLauncher::detect)
                .flatten()
                .map(|l| Arc::new(l) as Arc<dyn AppLauncher>),
            system_control: desktop::CommandSystemControl::detect(screenshots)
                .map(|c| Arc::new(c) as Arc<dyn SystemControl>),
            system_monitor: crate::tasks::system_status::ProcSystemMonitor::detect()
                .map(|m| Arc::new(m) as Arc<dyn SystemMonitor>),
        };

        let caps = services.capabilities();
        info!(
            "capabilities: chat={} vision={} apps={} browser={} system_control={} system_status={}",
            caps.chat, caps.vision, caps.app_launch, caps.url_open, caps.system_control, caps.system_status
        );
        services
    }

    /// Presence check per optional capability.
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            chat: self.chat.is_some(),
            vision: self.vision.is_some(),
            app_launch: self.launcher.is_some(),
            url_open: self.opener.is_some(),
            system_control: self.system_control.is_some(),
            system_status: self.system_monitor.is_some(),
        }
    }
}

/// Shared HTTP client with a per-request timeout.
pub fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .user_agent(concat!("jarvis/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}
