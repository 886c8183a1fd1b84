//! Viewer event server over real WebSocket connections.

use crate::helpers::eventually;
use futures_util::{SinkExt, StreamExt};
use jarvis::events::{EventBus, EventServer, ViewerEvent};
use jarvis::presence::FaceObservation;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn connect(server: &EventServer) -> Client {
    let (ws, _) = connect_async(format!("ws://{}/", server.addr()))
        .await
        .expect("websocket handshake");
    ws
}

/// Next text frame as JSON.
async fn next_json(client: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(WAIT, client.next())
            .await
            .expect("frame before timeout")
            .expect("stream open")
            .expect("valid frame");
        if msg.is_text() {
            let text = msg.into_text().unwrap();
            return serde_json::from_str(&text).unwrap();
        }
    }
}

#[tokio::test]
async fn every_viewer_receives_each_event() {
    let bus = EventBus::new(16);
    let server = EventServer::start("127.0.0.1:0", bus.clone(), None)
        .await
        .unwrap();
    let mut first = connect(&server).await;
    let mut second = connect(&server).await;
    assert!(eventually(WAIT, || bus.observer_count() == 2).await);

    bus.broadcast(ViewerEvent::SpeakStart);
    bus.broadcast(ViewerEvent::FaceTrack { x: 0.5, y: -0.25 });

    for client in [&mut first, &mut second] {
        assert_eq!(next_json(client).await, json!({"type": "speak_start"}));
        assert_eq!(
            next_json(client).await,
            json!({"type": "face_track", "data": {"x": 0.5, "y": -0.25}})
        );
    }
}

#[tokio::test]
async fn disconnected_viewer_does_not_affect_others() {
    let bus = EventBus::new(16);
    let server = EventServer::start("127.0.0.1:0", bus.clone(), None)
        .await
        .unwrap();
    let mut leaving = connect(&server).await;
    let mut staying = connect(&server).await;
    assert!(eventually(WAIT, || bus.observer_count() == 2).await);

    leaving.close(None).await.unwrap();
    drop(leaving);
    assert!(eventually(WAIT, || bus.observer_count() == 1).await);

    bus.broadcast(ViewerEvent::Status {
        state: "Listening...".to_owned(),
    });
    assert_eq!(
        next_json(&mut staying).await,
        json!({"type": "status", "data": {"state": "Listening..."}})
    );
}

#[tokio::test]
async fn broadcasting_without_viewers_is_harmless() {
    let bus = EventBus::new(4);
    let server = EventServer::start("127.0.0.1:0", bus.clone(), None)
        .await
        .unwrap();
    for _ in 0..10 {
        bus.broadcast(ViewerEvent::SpeakStop);
    }

    let mut late = connect(&server).await;
    assert!(eventually(WAIT, || bus.observer_count() == 1).await);
    bus.broadcast(ViewerEvent::Sentry { active: true });
    assert_eq!(
        next_json(&mut late).await,
        json!({"type": "sentry", "data": {"active": true}})
    );
}

#[tokio::test]
async fn face_observations_are_forwarded_upstream() {
    let bus = EventBus::new(16);
    let (tx, mut rx) = mpsc::channel(4);
    let server = EventServer::start("127.0.0.1:0", bus, Some(tx))
        .await
        .unwrap();
    let mut client = connect(&server).await;

    client
        .send(Message::text("not json at all"))
        .await
        .unwrap();
    let frame = json!({
        "type": "face_observation",
        "data": {"name": "Unknown", "emotion": "happy"}
    });
    client
        .send(Message::text(frame.to_string()))
        .await
        .unwrap();

    let observation: FaceObservation = tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("observation before timeout")
        .expect("channel open");
    assert_eq!(observation.name, "Unknown");
    assert_eq!(observation.emotion.as_deref(), Some("happy"));
    assert!(observation.position.is_none());
}

#[tokio::test]
async fn bind_failure_is_reported() {
    let bus = EventBus::default();
    let first = EventServer::start("127.0.0.1:0", bus.clone(), None)
        .await
        .unwrap();
    let taken = first.addr().to_string();
    assert!(EventServer::start(&taken, bus, None).await.is_err());
}
