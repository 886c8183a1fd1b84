//! HTTP collaborators against a local mock server.

use crate::helpers::{results_page, services_config};
use jarvis::config::{ChatConfig, SttConfig, TtsConfig};
use jarvis::pipeline::messages::SpeechSegment;
use jarvis::services::chat::OllamaChat;
use jarvis::services::knowledge::Wikipedia;
use jarvis::services::network::HttpNetworkInfo;
use jarvis::services::search::DuckDuckGo;
use jarvis::services::stt::WhisperTranscriber;
use jarvis::services::tts::HttpSynthesizer;
use jarvis::services::{
    ChatMessage, ChatModel, Knowledge, KnowledgeBase, NetworkInfo, Synthesizer, Transcriber,
    Transcript, WebSearch,
};
use serde_json::json;
use std::sync::Mutex;
use std::time::Instant;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> reqwest::Client {
    jarvis::services::http_client(5)
}

// ─── Wikipedia ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn wikipedia_summary_keeps_two_sentences() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/wiki/page/summary/ada_lovelace"))
        .and(query_param("redirect", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "standard",
            "extract": "Ada Lovelace was a mathematician. She wrote the first program. She died in 1852."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let wiki = Wikipedia::new(&format!("{}/wiki", server.uri()), client());
    let result = wiki.lookup("ada lovelace").await.unwrap();
    assert_eq!(
        result,
        Knowledge::Summary(
            "Ada Lovelace was a mathematician. She wrote the first program.".to_owned()
        )
    );
}

#[tokio::test]
async fn wikipedia_disambiguation_and_missing_pages() {
    let server = MockServer::start().await;
    Mock::given(path("/wiki/page/summary/mercury"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "disambiguation",
            "extract": "Mercury may refer to:"
        })))
        .mount(&server)
        .await;
    Mock::given(path("/wiki/page/summary/qwxzv"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let wiki = Wikipedia::new(&format!("{}/wiki", server.uri()), client());
    assert_eq!(wiki.lookup("mercury").await.unwrap(), Knowledge::Ambiguous);
    assert_eq!(wiki.lookup("qwxzv").await.unwrap(), Knowledge::NotFound);
}

#[tokio::test]
async fn wikipedia_server_error_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let wiki = Wikipedia::new(&format!("{}/wiki", server.uri()), client());
    assert!(wiki.lookup("anything").await.is_err());
}

// ─── DuckDuckGo ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn search_posts_query_and_skips_ads() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/html/"))
        .and(body_string_contains("q=rust+language"))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_page(
            &["Rust is fast.", "Rust is  safe...", "Rust is fun."],
            &["Buy Rust now!"],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let search = DuckDuckGo::new(&format!("{}/html/", server.uri()), client());
    let snippets = search.search("rust language", 2).await.unwrap();
    assert_eq!(snippets, vec!["Rust is fast.", "Rust is safe..."]);
    assert_eq!(
        jarvis::services::search::summarize(&snippets).as_deref(),
        Some("Here is what I found. Rust is fast. Also, Rust is safe.")
    );
}

#[tokio::test]
async fn search_http_error_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let search = DuckDuckGo::new(&format!("{}/html/", server.uri()), client());
    assert!(search.search("anything", 2).await.is_err());
}

// ─── Network info ───────────────────────────────────────────────────────────

#[tokio::test]
async fn public_ip_location_and_weather() {
    let server = MockServer::start().await;
    Mock::given(path("/ip"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ip": "203.0.113.7"})))
        .mount(&server)
        .await;
    Mock::given(path("/geo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "city": "Paris",
            "regionName": "Ile-de-France",
            "country": "France"
        })))
        .mount(&server)
        .await;
    Mock::given(path("/weather/Paris"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Partly cloudy +14°C\n"))
        .mount(&server)
        .await;

    let network = HttpNetworkInfo::new(&services_config(&server), client());
    assert_eq!(network.public_ip().await.unwrap(), "203.0.113.7");
    assert_eq!(
        network.location().await.unwrap().as_deref(),
        Some("Paris, Ile-de-France, France")
    );
    assert_eq!(
        network.weather("Paris").await.unwrap().as_deref(),
        Some("Partly cloudy +14°C")
    );
}

#[tokio::test]
async fn weather_non_success_is_empty_not_error() {
    let server = MockServer::start().await;
    Mock::given(path("/weather/Atlantis"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let network = HttpNetworkInfo::new(&services_config(&server), client());
    assert_eq!(network.weather("Atlantis").await.unwrap(), None);
}

#[tokio::test]
async fn failed_geolocation_is_none() {
    let server = MockServer::start().await;
    Mock::given(path("/geo"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "fail", "message": "reserved range"})),
        )
        .mount(&server)
        .await;

    let network = HttpNetworkInfo::new(&services_config(&server), client());
    assert_eq!(network.location().await.unwrap(), None);
}

// ─── Chat ───────────────────────────────────────────────────────────────────

fn chat_config(server: &MockServer) -> ChatConfig {
    ChatConfig {
        base_url: server.uri(),
        ..ChatConfig::default()
    }
}

#[tokio::test]
async fn chat_streams_sentences_as_they_complete() {
    let server = MockServer::start().await;
    let ndjson = [
        json!({"message": {"role": "assistant", "content": "Hello "}, "done": false}),
        json!({"message": {"role": "assistant", "content": "there. How "}, "done": false}),
        json!({"message": {"role": "assistant", "content": "can I help?"}, "done": false}),
        json!({"message": {"role": "assistant", "content": ""}, "done": true}),
    ]
    .iter()
    .map(|v| format!("{v}\n"))
    .collect::<String>();
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"model": "llama3.2", "stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/x-ndjson")
                .set_body_string(ndjson),
        )
        .expect(1)
        .mount(&server)
        .await;

    let chat = OllamaChat::new(&chat_config(&server), client());
    let sentences = Mutex::new(Vec::new());
    let on_sentence = |s: &str| sentences.lock().unwrap().push(s.to_owned());
    let full = chat
        .chat(
            &[
                ChatMessage::system("Be brief."),
                ChatMessage::user("hello"),
            ],
            &on_sentence,
        )
        .await
        .unwrap();

    assert_eq!(full, "Hello there. How can I help?");
    assert_eq!(
        sentences.into_inner().unwrap(),
        vec!["Hello there.", "How can I help?"]
    );
}

#[tokio::test]
async fn chat_reports_model_errors() {
    let server = MockServer::start().await;
    Mock::given(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("{\"error\":\"model not found\"}\n"),
        )
        .mount(&server)
        .await;

    let chat = OllamaChat::new(&chat_config(&server), client());
    let err = chat
        .chat(&[ChatMessage::user("hello")], &|_: &str| {})
        .await
        .unwrap_err();
    assert!(err.to_string().contains("model not found"));
}

#[tokio::test]
async fn chat_http_error_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let chat = OllamaChat::new(&chat_config(&server), client());
    assert!(
        chat.chat(&[ChatMessage::user("hello")], &|_: &str| {})
            .await
            .is_err()
    );
}

// ─── Speech services ────────────────────────────────────────────────────────

fn stt_config(server: &MockServer) -> SttConfig {
    SttConfig {
        base_url: server.uri(),
        api_key_env: "JARVIS_TEST_STT_KEY_UNSET".to_owned(),
        ..SttConfig::default()
    }
}

fn segment() -> SpeechSegment {
    let samples = (0..8_000)
        .map(|i| (i as f32 * 0.05).sin() * 0.3)
        .collect();
    SpeechSegment {
        samples,
        sample_rate: 16_000,
        started_at: Instant::now(),
    }
}

#[tokio::test]
async fn transcription_uploads_wav_and_classifies_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": " Hey Jarvis. "})))
        .expect(1)
        .mount(&server)
        .await;

    let stt = WhisperTranscriber::new(&stt_config(&server), client());
    assert_eq!(
        stt.transcribe(&segment()).await.unwrap(),
        Transcript::Text("Hey Jarvis.".to_owned())
    );

    // Multipart bodies carry binary WAV data, so inspect them lossily.
    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("filename=\"speech.wav\""));
    assert!(body.contains("whisper-1"));
    assert!(body.contains("RIFF"));
}

#[tokio::test]
async fn transcription_outcomes_for_silence_and_noise() {
    let server = MockServer::start().await;
    Mock::given(path("/v1/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "  "})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(path("/v1/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "..."})))
        .mount(&server)
        .await;

    let stt = WhisperTranscriber::new(&stt_config(&server), client());
    assert_eq!(stt.transcribe(&segment()).await.unwrap(), Transcript::NoSpeech);
    assert_eq!(
        stt.transcribe(&segment()).await.unwrap(),
        Transcript::Unintelligible
    );
}

#[tokio::test]
async fn transcription_service_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(path("/v1/audio/transcriptions"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let stt = WhisperTranscriber::new(&stt_config(&server), client());
    assert!(stt.transcribe(&segment()).await.is_err());
}

fn tts_config(server: &MockServer) -> TtsConfig {
    TtsConfig {
        base_url: server.uri(),
        api_key_env: "JARVIS_TEST_TTS_KEY_UNSET".to_owned(),
        ..TtsConfig::default()
    }
}

#[tokio::test]
async fn synthesis_sends_text_and_voice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/audio/speech"))
        .and(body_partial_json(json!({
            "input": "Good morning.",
            "voice": "en-US-AriaNeural",
            "response_format": "mp3"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xFB, 0x90, 0x00]))
        .expect(1)
        .mount(&server)
        .await;

    let tts = HttpSynthesizer::new(&tts_config(&server), client());
    let audio = tts
        .synthesize("Good morning.", "en-US-AriaNeural")
        .await
        .unwrap();
    assert_eq!(audio.as_ref(), &[0xFF, 0xFB, 0x90, 0x00]);
}

#[tokio::test]
async fn synthesis_rejects_empty_audio_and_errors() {
    let server = MockServer::start().await;
    Mock::given(path("/v1/audio/speech"))
        .respond_with(ResponseTemplate::new(200))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(path("/v1/audio/speech"))
        .respond_with(ResponseTemplate::new(500).set_body_string("voice not found"))
        .mount(&server)
        .await;

    let tts = HttpSynthesizer::new(&tts_config(&server), client());
    assert!(tts.synthesize("hi", "x").await.is_err());
    assert!(tts.synthesize("hi", "x").await.is_err());
}
