//! User-facing settings persisted as `settings.json`.
//!
//! The file is read once at startup and rewritten on every change. A missing
//! or partially-shaped file is tolerated: absent fields take defaults and
//! unknown fields are carried through untouched.

use crate::error::{AssistantError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{info, warn};

/// A selectable synthesis voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceProfile {
    /// Menu key spoken by the user ("1".."6").
    pub key: &'static str,
    /// Voice identifier passed to the synthesizer.
    pub id: &'static str,
    /// Human readable name.
    pub name: &'static str,
}

/// Built-in voices, in menu order.
pub const VOICES: [VoiceProfile; 6] = [
    VoiceProfile {
        key: "1",
        id: "en-US-AnaNeural",
        name: "Ana (Female, Cute)",
    },
    VoiceProfile {
        key: "2",
        id: "en-US-ChristopherNeural",
        name: "Christopher (Male, Mature)",
    },
    VoiceProfile {
        key: "3",
        id: "en-US-AriaNeural",
        name: "Aria (Female, Professional)",
    },
    VoiceProfile {
        key: "4",
        id: "en-US-GuyNeural",
        name: "Guy (Male, Professional)",
    },
    VoiceProfile {
        key: "5",
        id: "en-US-JennyNeural",
        name: "Jenny (Female, Soft)",
    },
    VoiceProfile {
        key: "6",
        id: "en-US-EricNeural",
        name: "Eric (Male, Assertive)",
    },
];

/// Look up a voice by its menu key.
pub fn voice_by_key(key: &str) -> Option<&'static VoiceProfile> {
    VOICES.iter().find(|v| v.key == key)
}

/// Serialized entry of the `voice_list` map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceEntry {
    pub id: String,
    pub name: String,
}

/// On-disk settings record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Active synthesis voice id.
    pub voice: String,
    /// The selectable voices, kept in the file so users can see them.
    pub voice_list: BTreeMap<String, VoiceEntry>,
    /// When false, every utterance is treated as addressed to the assistant.
    pub require_wake_word: bool,
    /// Fields written by other tools.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            voice: VOICES[0].id.to_owned(),
            voice_list: builtin_voice_list(),
            require_wake_word: true,
            extra: BTreeMap::new(),
        }
    }
}

fn builtin_voice_list() -> BTreeMap<String, VoiceEntry> {
    VOICES
        .iter()
        .map(|v| {
            (
                v.key.to_owned(),
                VoiceEntry {
                    id: v.id.to_owned(),
                    name: v.name.to_owned(),
                },
            )
        })
        .collect()
}

/// Thread-safe settings holder with write-through persistence.
#[derive(Debug)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    current: RwLock<Settings>,
}

impl SettingsStore {
    /// Load settings from `path`, falling back to defaults, then write the
    /// merged result back so the file always lists every field.
    pub fn open(path: &Path) -> Self {
        let mut settings = load_settings(path);
        settings.voice_list = builtin_voice_list();
        let store = Self {
            path: Some(path.to_path_buf()),
            current: RwLock::new(settings),
        };
        if let Err(e) = store.save() {
            warn!("could not write settings to {}: {e}", path.display());
        }
        store
    }

    /// Settings that live only in memory (never written).
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            path: None,
            current: RwLock::new(settings),
        }
    }

    /// Snapshot of the current settings.
    pub fn snapshot(&self) -> Settings {
        match self.current.read() {
            Ok(s) => s.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Active voice id.
    pub fn voice(&self) -> String {
        match self.current.read() {
            Ok(s) => s.voice.clone(),
            Err(poisoned) => poisoned.into_inner().voice.clone(),
        }
    }

    pub fn require_wake_word(&self) -> bool {
        match self.current.read() {
            Ok(s) => s.require_wake_word,
            Err(poisoned) => poisoned.into_inner().require_wake_word,
        }
    }

    /// Switch the active voice and persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file cannot be written.
    pub fn set_voice(&self, voice_id: &str) -> Result<()> {
        self.update(|s| s.voice = voice_id.to_owned())
    }

    /// Toggle the wake-word requirement and persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings file cannot be written.
    pub fn set_require_wake_word(&self, required: bool) -> Result<()> {
        self.update(|s| s.require_wake_word = required)
    }

    fn update(&self, f: impl FnOnce(&mut Settings)) -> Result<()> {
        {
            let mut guard = self
                .current
                .write()
                .map_err(|e| AssistantError::Storage(format!("settings lock poisoned: {e}")))?;
            f(&mut guard);
        }
        self.save()
    }

    fn save(&self) -> Result<()> {
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let settings = self.snapshot();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&settings)?;
        std::fs::write(path, json)?;
        info!("settings saved to {}", path.display());
        Ok(())
    }
}

fn load_settings(path: &Path) -> Settings {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Settings::default(),
        Err(e) => {
            warn!("failed to read settings {}: {e}", path.display());
            return Settings::default();
        }
    };
    match serde_json::from_str::<Settings>(&content) {
        Ok(s) => s,
        Err(e) => {
            warn!("ignoring malformed settings {}: {e}", path.display());
            Settings::default()
        }
    }
}
