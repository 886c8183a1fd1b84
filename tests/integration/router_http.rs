//! Router handlers backed by real HTTP collaborators.

use crate::helpers::{RecordingVoice, http_services, results_page};
use jarvis::config::ChatConfig;
use jarvis::context::AssistantContext;
use jarvis::reminders::ReminderStore;
use jarvis::router::{CommandRouter, RouteOutcome, RouterPaths};
use jarvis::services::Services;
use jarvis::services::chat::OllamaChat;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Fixture {
    router: CommandRouter,
    voice: Arc<RecordingVoice>,
    _dir: tempfile::TempDir,
}

fn fixture(services: Services) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let voice = Arc::new(RecordingVoice::default());
    let router = CommandRouter::new(
        Arc::new(AssistantContext::ephemeral()),
        voice.clone(),
        services,
        Arc::new(ReminderStore::new(dir.path().join("reminders.json"))),
        &ChatConfig::default(),
    )
    .with_paths(RouterPaths::default());
    Fixture {
        router,
        voice,
        _dir: dir,
    }
}

#[tokio::test]
async fn knowledge_question_reads_summary() {
    let server = MockServer::start().await;
    Mock::given(path("/wiki/page/summary/ada_lovelace"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "standard",
            "extract": "Ada Lovelace was a mathematician. She wrote the first program. More."
        })))
        .mount(&server)
        .await;

    let f = fixture(http_services(&server));
    f.router.route("tell me about ada lovelace").await;
    assert_eq!(
        f.voice.spoken(),
        vec![
            "Searching for ada lovelace...",
            "Ada Lovelace was a mathematician. She wrote the first program.",
        ]
    );
}

#[tokio::test]
async fn knowledge_outage_apologizes() {
    let server = MockServer::start().await;
    Mock::given(path("/wiki/page/summary/ada_lovelace"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let f = fixture(http_services(&server));
    let outcome = f.router.route("tell me about ada lovelace").await;
    assert_eq!(outcome, RouteOutcome::Continue);
    assert_eq!(
        f.voice.spoken(),
        vec![
            "Searching for ada lovelace...",
            "Something went wrong with the search.",
        ]
    );
}

#[tokio::test]
async fn web_search_reads_top_two_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/html/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(results_page(
            &["Tokio is an async runtime…", "It powers many services."],
            &[],
        )))
        .mount(&server)
        .await;

    let f = fixture(http_services(&server));
    f.router.route("search web for tokio scheduler").await;
    assert_eq!(
        f.voice.spoken(),
        vec![
            "Searching the web for tokio scheduler...",
            "Here is what I found. Tokio is an async runtime. Also, It powers many services.",
        ]
    );
}

#[tokio::test]
async fn search_outage_is_spoken() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let f = fixture(http_services(&server));
    f.router.route("search online for rust").await;
    assert_eq!(
        f.voice.spoken().last().map(String::as_str),
        Some("I am having trouble connecting to the internet search.")
    );
}

#[tokio::test]
async fn public_ip_and_location_weather() {
    let server = MockServer::start().await;
    Mock::given(path("/ip"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ip": "198.51.100.4"})))
        .mount(&server)
        .await;
    Mock::given(path("/geo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "city": "Oslo",
            "regionName": "Oslo",
            "country": "Norway"
        })))
        .mount(&server)
        .await;
    Mock::given(path("/weather/Oslo"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Light snow -3°C"))
        .mount(&server)
        .await;

    let f = fixture(http_services(&server));
    f.router.route("what's my ip").await;
    f.router.route("how is the weather").await;
    f.router.route("where am i").await;
    assert_eq!(
        f.voice.spoken(),
        vec![
            "Your public IP address is 198.51.100.4",
            "The weather in Oslo is Light snow -3°C",
            "You are currently in Oslo, Oslo, Norway",
        ]
    );
}

#[tokio::test]
async fn weather_without_report_is_spoken() {
    let server = MockServer::start().await;
    Mock::given(path("/weather/rome"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let f = fixture(http_services(&server));
    f.router.route("how is the weather in rome").await;
    assert_eq!(
        f.voice.spoken().last().map(String::as_str),
        Some("I couldn't fetch the weather.")
    );
}

#[tokio::test]
async fn streamed_chat_reply_is_spoken_and_remembered() {
    let server = MockServer::start().await;
    let ndjson = [
        json!({"message": {"content": "Once upon a time. "}, "done": false}),
        json!({"message": {"content": "The end."}, "done": false}),
        json!({"done": true}),
    ]
    .iter()
    .map(|v| format!("{v}\n"))
    .collect::<String>();
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ndjson))
        .mount(&server)
        .await;

    let mut services = http_services(&server);
    let chat_config = ChatConfig {
        base_url: server.uri(),
        ..ChatConfig::default()
    };
    services.chat = Some(Arc::new(OllamaChat::new(
        &chat_config,
        jarvis::services::http_client(5),
    )));

    let f = fixture(services);
    let outcome = f.router.route("tell a short story").await;
    f.router.route("what did i say").await;
    assert_eq!(outcome, RouteOutcome::Continue);
    assert_eq!(
        f.voice.spoken(),
        vec![
            "Once upon a time.",
            "The end.",
            "You just said: tell a short story",
        ]
    );
}

#[tokio::test]
async fn chat_outage_apologizes() {
    let server = MockServer::start().await;
    Mock::given(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut services = http_services(&server);
    let chat_config = ChatConfig {
        base_url: server.uri(),
        ..ChatConfig::default()
    };
    services.chat = Some(Arc::new(OllamaChat::new(
        &chat_config,
        jarvis::services::http_client(5),
    )));

    let f = fixture(services);
    f.router.route("sing me a song").await;
    assert_eq!(
        f.voice.spoken(),
        vec!["I am having trouble thinking. Please ensure Ollama is running."]
    );
}
