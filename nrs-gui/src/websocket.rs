//! WebSocket event stream
//!
//! Pushes every graph event to connected front-end clients as JSON, so
//! editor views stay current without polling.

use crate::app::AppManager;
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use nrs_libs::GraphEvent;
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Handler for GET /ws
pub async fn websocket_handler(ws: WebSocketUpgrade, State(app): State<AppManager>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, app))
}

/// What to do with a text frame from a client
#[derive(Debug, PartialEq)]
enum ClientCommand {
    Ping,
    Unknown(String),
    Invalid,
}

fn parse_client_message(text: &str) -> ClientCommand {
    match serde_json::from_str::<Value>(text) {
        Ok(json) => match json.get("type").and_then(Value::as_str) {
            Some("ping") => ClientCommand::Ping,
            Some(other) => ClientCommand::Unknown(other.to_string()),
            None => ClientCommand::Unknown(String::new()),
        },
        Err(_) => ClientCommand::Invalid,
    }
}

fn event_frame(event: &GraphEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(text) => Some(Message::Text(text)),
        Err(e) => {
            warn!("Failed to serialize {} event: {}", event.kind(), e);
            None
        }
    }
}

/// Serve one client until it leaves or the event stream closes
async fn handle_socket(socket: WebSocket, app: AppManager) {
    let client_id = Uuid::new_v4();
    info!("New WebSocket client connected: {}", client_id);

    let (mut sender, mut receiver) = socket.split();
    let mut events = app.subscribe_events();

    let welcome = json!({
        "type": "connected",
        "client_id": client_id.to_string(),
        "online": app.is_online(),
    });
    if sender.send(Message::Text(welcome.to_string())).await.is_err() {
        warn!("Failed to send welcome message to client {}", client_id);
        return;
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let Some(frame) = event_frame(&event) else { continue };
                    if sender.send(frame).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Client {} lagged, {} events dropped", client_id, skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => match parse_client_message(&text) {
                    ClientCommand::Ping => {
                        debug!("Ping from client {}", client_id);
                        let pong = json!({ "type": "pong" }).to_string();
                        if sender.send(Message::Text(pong)).await.is_err() {
                            break;
                        }
                    }
                    ClientCommand::Unknown(kind) => {
                        info!("Unhandled message type '{}' from client {}", kind, client_id);
                    }
                    ClientCommand::Invalid => {
                        warn!("Invalid JSON from client {}", client_id);
                    }
                },
                Some(Ok(Message::Close(_))) | None => {
                    info!("Client {} requested close", client_id);
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket error from client {}: {}", client_id, e);
                    break;
                }
            },
        }
    }

    info!("WebSocket client disconnected: {}", client_id);
}
