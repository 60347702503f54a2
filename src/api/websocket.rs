use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::state::{AppState, WsEvent};

#[derive(Debug, Deserialize)]
struct WsIncoming {
    #[serde(rename = "type")]
    msg_type: String,
}

#[derive(Debug, Serialize)]
struct WsOutgoing {
    #[serde(rename = "type")]
    msg_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    entry: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl WsOutgoing {
    fn bare(msg_type: &str) -> Self {
        Self {
            msg_type: msg_type.to_string(),
            entry: None,
            result: None,
            session: None,
            error: None,
        }
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!("WebSocket connection request from client: {}", client_id);
    ws.on_upgrade(move |socket| handle_socket(socket, client_id, state))
}

async fn handle_socket(socket: WebSocket, client_id: String, state: Arc<AppState>) {
    tracing::info!("WebSocket connected: {}", client_id);

    let (mut sender, mut receiver) = socket.split();

    // Subscribe to broadcast events
    let mut rx = state.subscribe();

    // Task to forward broadcast events to this client
    let send_task = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            let msg = match event {
                WsEvent::RecordingEntry { entry } => WsOutgoing {
                    entry: Some(serde_json::to_value(&entry).unwrap_or_default()),
                    ..WsOutgoing::bare("recording_entry")
                },
                WsEvent::ReplayStep { result } => WsOutgoing {
                    result: Some(serde_json::to_value(&result).unwrap_or_default()),
                    ..WsOutgoing::bare("replay_step")
                },
                WsEvent::ReplayComplete { session } => WsOutgoing {
                    session: Some(serde_json::to_value(&session).unwrap_or_default()),
                    ..WsOutgoing::bare("replay_complete")
                },
                WsEvent::Error { message } => WsOutgoing {
                    error: Some(message),
                    ..WsOutgoing::bare("error")
                },
                WsEvent::Pong => WsOutgoing::bare("pong"),
            };

            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(_) => continue,
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    // Task to handle incoming messages (ping/pong)
    let state_clone = state.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(incoming) = serde_json::from_str::<WsIncoming>(&text) {
                    if incoming.msg_type == "ping" {
                        state_clone.broadcast(WsEvent::Pong);
                    }
                }
            }
        }
    });

    // Wait for either task to complete
    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    tracing::info!("WebSocket disconnected: {}", client_id);
}
