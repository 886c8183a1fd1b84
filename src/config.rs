//! Configuration types for the voice assistant.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level assistant configuration, loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Audio device selection and sample rates.
    pub audio: AudioConfig,
    /// Microphone listening / barge-in sensitivity.
    pub listener: ListenerConfig,
    /// Speech synthesis pipeline tuning.
    pub speech: SpeechConfig,
    /// Speech-to-text service.
    pub stt: SttConfig,
    /// Text-to-speech service.
    pub tts: TtsConfig,
    /// Conversational model (Ollama).
    pub chat: ChatConfig,
    /// External lookup services.
    pub services: ServicesConfig,
    /// Viewer event server.
    pub events: EventsConfig,
    /// Wake-word / conversation-window gate.
    pub gate: GateConfig,
    /// Face presence, greetings and reminder polling.
    pub presence: PresenceConfig,
    /// Log output.
    pub logging: LoggingConfig,
    /// Override for the data directory (settings, reminders, logs).
    pub data_dir: Option<PathBuf>,
}

/// Audio I/O configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture sample rate delivered to the listener, in Hz.
    pub input_sample_rate: u32,
    /// Input device name (None = system default).
    pub input_device: Option<String>,
    /// Output device name (None = system default).
    pub output_device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: 16_000,
            input_device: None,
            output_device: None,
        }
    }
}

/// Listening sensitivity.
///
/// Energy thresholds are RMS values on the 16-bit sample scale, so `300`
/// means an RMS of 300 / 32768 in float terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Starting energy threshold while the assistant is silent.
    pub idle_energy_threshold: f32,
    /// Fixed energy threshold while the assistant is speaking (barge-in).
    pub speaking_energy_threshold: f32,
    /// Track the ambient noise floor while idle.
    pub dynamic_energy: bool,
    /// Silence needed to close an utterance, in ms.
    pub pause_threshold_ms: u32,
    /// Ambient calibration at the start of each microphone session, in ms.
    pub calibration_ms: u32,
    /// Delay before reopening a failed microphone session, in ms.
    pub reconnect_delay_ms: u64,
    /// Back-off after the transcription service is unreachable, in ms.
    pub connection_backoff_ms: u64,
    /// Spectral noise reduction before transcription.
    pub denoise: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            idle_energy_threshold: 300.0,
            speaking_energy_threshold: 400.0,
            dynamic_energy: true,
            pause_threshold_ms: 2000,
            calibration_ms: 2000,
            reconnect_delay_ms: 1000,
            connection_backoff_ms: 5000,
            denoise: true,
        }
    }
}

/// Speech synthesis pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Capacity of the text queue feeding the generation stage.
    pub text_queue_capacity: usize,
    /// Capacity of the audio queue feeding the playback stage.
    pub audio_queue_capacity: usize,
    /// How often the playback stage checks busy/staleness, in ms.
    pub playback_poll_ms: u64,
    /// Replies longer than this (chars) become a short apology when the user is angry.
    pub angry_length_threshold: usize,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            text_queue_capacity: 64,
            audio_queue_capacity: 16,
            playback_poll_ms: 50,
            angry_length_threshold: 50,
        }
    }
}

/// Speech-to-text configuration (Whisper-compatible endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Base URL of the transcription API.
    pub base_url: String,
    /// Model name sent with each request.
    pub model: String,
    /// Environment variable holding the API key (empty = no auth).
    pub api_key_env: String,
    /// Language hint.
    pub language: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_owned(),
            model: "whisper-1".to_owned(),
            api_key_env: "OPENAI_API_KEY".to_owned(),
            language: "en".to_owned(),
        }
    }
}

/// Text-to-speech configuration (OpenAI-compatible speech endpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Base URL of the speech API.
    pub base_url: String,
    /// Model name sent with each request.
    pub model: String,
    /// Environment variable holding the API key (empty = no auth).
    pub api_key_env: String,
    /// Encoded audio format requested from the service.
    pub response_format: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5050".to_owned(),
            model: "tts-1".to_owned(),
            api_key_env: "TTS_API_KEY".to_owned(),
            response_format: "mp3".to_owned(),
        }
    }
}

/// Conversational fallback configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Use the Ollama model; when false the keyword responder answers instead.
    pub enabled: bool,
    /// Ollama base URL.
    pub base_url: String,
    /// Model tag.
    pub model: String,
    /// Exchanges kept as context (oldest evicted first).
    pub history_capacity: usize,
    /// System persona prompt.
    pub system_prompt: String,
}

/// Persona used when no prompt is configured.
pub const DEFAULT_PERSONA: &str = "You are Jarvis, a helpful, witty, and slightly flirty AI assistant. \
You are NOT a robot. You are a \"cute real human girl\" personality. In EVERY response, you MUST use \
human emotions. Start sentences with fillers like \"Hmm...\", \"Well...\", \"Oh!\". Use action markers \
frequently: *laughs*, *giggles*, *sighs*, *clears throat*, *hums*. Be expressive and dynamic.";

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://localhost:11434".to_owned(),
            model: "llama3.2".to_owned(),
            history_capacity: 5,
            system_prompt: DEFAULT_PERSONA.to_owned(),
        }
    }
}

/// Endpoints for the lookup services used by command handlers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Wikipedia REST API root.
    pub wikipedia_url: String,
    /// DuckDuckGo HTML search endpoint.
    pub search_url: String,
    /// Public IP lookup.
    pub ip_url: String,
    /// IP geolocation lookup.
    pub location_url: String,
    /// Weather service root.
    pub weather_url: String,
    /// Object detection sidecar (None = vision disabled).
    pub vision_url: Option<String>,
    /// Allow launching local applications by name.
    pub app_launch: bool,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            wikipedia_url: "https://en.wikipedia.org/api/rest_v1".to_owned(),
            search_url: "https://html.duckduckgo.com/html/".to_owned(),
            ip_url: "https://api.ipify.org?format=json".to_owned(),
            location_url: "http://ip-api.com/json/".to_owned(),
            weather_url: "https://wttr.in".to_owned(),
            vision_url: None,
            app_launch: true,
            timeout_secs: 10,
        }
    }
}

/// Viewer event server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Whether the WebSocket server is started.
    pub enabled: bool,
    /// Bind address.
    pub bind: String,
    /// Broadcast buffer per subscriber before lagging events are dropped.
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "127.0.0.1:8765".to_owned(),
            capacity: 64,
        }
    }
}

/// Wake-word and conversation-window configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Tokens (and mishearings) that open the gate.
    pub wake_tokens: Vec<String>,
    /// How long the gate stays open after an accepted command, in seconds.
    pub window_secs: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            wake_tokens: ["jarvis", "javis", "travis", "mavis", "davis"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            window_secs: 60,
        }
    }
}

/// Presence (face recognition feed) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Recognized identity that receives a greeting (None = never greet).
    pub user_name: Option<String>,
    /// Minimum time between greetings, in seconds.
    pub greeting_cooldown_secs: u64,
    /// Consecutive unknown faces before the sentry warning is raised.
    pub sentry_threshold: u32,
    /// How often due reminders are announced, in seconds.
    pub reminder_check_secs: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            user_name: None,
            greeting_cooldown_secs: 21_600,
            sentry_threshold: 50,
            reminder_check_secs: 5,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write daily-rotated log files under the data directory.
    pub file: bool,
}

impl AssistantConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::error::AssistantError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::AssistantError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> PathBuf {
        crate::app_dirs::config_file()
    }

    /// Directory for settings, reminders and logs.
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(crate::app_dirs::data_dir)
    }
}
