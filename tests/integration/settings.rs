//! Settings and configuration files on disk.

use jarvis::config::AssistantConfig;
use jarvis::settings::{SettingsStore, VOICES, voice_by_key};

#[test]
fn foreign_fields_survive_a_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{"voice": "en-US-JennyNeural", "require_wake_word": false, "viewer_theme": "dark"}"#,
    )
    .unwrap();

    let store = SettingsStore::open(&path);
    assert_eq!(store.voice(), "en-US-JennyNeural");
    assert!(!store.require_wake_word());

    store.set_require_wake_word(true).unwrap();
    let on_disk: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk["viewer_theme"], "dark");
    assert_eq!(on_disk["require_wake_word"], true);
    assert_eq!(on_disk["voice_list"].as_object().unwrap().len(), VOICES.len());
}

#[test]
fn malformed_settings_fall_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "voice = not json").unwrap();

    let store = SettingsStore::open(&path);
    assert_eq!(store.voice(), voice_by_key("1").unwrap().id);
    assert!(store.require_wake_word());
}

#[test]
fn partial_config_file_keeps_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[gate]
wake_tokens = ["friday"]

[chat]
enabled = false
"#,
    )
    .unwrap();

    let config = AssistantConfig::from_file(&path).unwrap();
    assert_eq!(config.gate.wake_tokens, vec!["friday"]);
    assert_eq!(config.gate.window_secs, 60);
    assert!(!config.chat.enabled);
    assert_eq!(config.chat.model, "llama3.2");
    assert_eq!(config.listener.pause_threshold_ms, 2000);
}

#[test]
fn config_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let mut config = AssistantConfig::default();
    config.events.bind = "0.0.0.0:9000".to_owned();
    config.data_dir = Some(dir.path().join("data"));
    config.save_to_file(&path).unwrap();

    let loaded = AssistantConfig::from_file(&path).unwrap();
    assert_eq!(loaded.events.bind, "0.0.0.0:9000");
    assert_eq!(loaded.resolved_data_dir(), dir.path().join("data"));
}

#[test]
fn invalid_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[gate\nwake_tokens = 3").unwrap();
    assert!(AssistantConfig::from_file(&path).is_err());
}
