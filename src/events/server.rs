//! WebSocket server that pushes viewer events to connected clients.
//!
//! Every connection gets its own broadcast subscription, so a client that
//! disconnects (or fails a send) is dropped without touching the others.
//! Clients may also push face observations upstream as
//! `{"type":"face_observation","data":{...}}` text frames.

use super::EventBus;
use crate::error::{AssistantError, Result};
use crate::presence::FaceObservation;
use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, info, warn};

/// Shared state for the WebSocket handler.
#[derive(Clone)]
struct AppState {
    bus: EventBus,
    observations: Option<mpsc::Sender<FaceObservation>>,
}

/// Upstream messages a client may send.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
enum ClientMessage {
    FaceObservation(FaceObservation),
}

/// Viewer event server bound to a local address.
pub struct EventServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl EventServer {
    /// Bind `bind` (e.g. `127.0.0.1:8765`, port `0` for auto-assign) and
    /// start serving in a background task.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot bind.
    pub async fn start(
        bind: &str,
        bus: EventBus,
        observations: Option<mpsc::Sender<FaceObservation>>,
    ) -> Result<Self> {
        let state = AppState { bus, observations };
        let app = Router::new()
            .route("/", get(handle_upgrade))
            .with_state(state);

        let listener = TcpListener::bind(bind)
            .await
            .map_err(|e| AssistantError::Config(format!("event server bind {bind} failed: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| AssistantError::Config(format!("failed to get local addr: {e}")))?;

        info!("viewer event server running on ws://{addr}");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("event server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    /// Address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Abort the server task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for EventServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_client(socket, state))
}

async fn serve_client(socket: WebSocket, state: AppState) {
    let mut events = BroadcastStream::new(state.bus.subscribe());
    let (mut sink, mut stream) = socket.split();
    debug!("viewer connected ({} observers)", state.bus.observer_count());

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(Ok(event)) => {
                    if sink.send(Message::Text(event.to_json().into())).await.is_err() {
                        break;
                    }
                }
                Some(Err(BroadcastStreamRecvError::Lagged(n))) => {
                    warn!("viewer lagging, skipped {n} events");
                }
                None => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => forward_client_message(&state, text.as_str()).await,
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    debug!("viewer disconnected");
}

async fn forward_client_message(state: &AppState, text: &str) {
    let Some(tx) = state.observations.as_ref() else {
        return;
    };
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::FaceObservation(obs)) => {
            if tx.send(obs).await.is_err() {
                debug!("presence monitor gone, dropping observation");
            }
        }
        Err(e) => debug!("ignoring client message: {e}"),
    }
}

