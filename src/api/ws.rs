//! WebSocket endpoint (GET /ws)
//!
//! One socket per browser session. Inbound `generate_metadata` messages are
//! screened (rate limit, credential, image path) before they reach the
//! worker pool; refusals go back as `rejected` events and consume no worker
//! time. Outbound pipeline events are forwarded from the connection's hub
//! channel. Disconnecting clears the hub registration and the connection's
//! rate limit state; results for work still in flight are silently dropped.

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::models::default_profile_id;
use super::state::AppState;
use crate::config::ModelConfig;
use crate::pipeline::{ClientNotifier, Job, ProcessingRequest, ServerEvent};

/// Messages clients send over the socket
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    GenerateMetadata {
        /// Path of a previously uploaded image, as returned by the upload
        /// endpoint
        path: String,
        #[serde(default = "default_profile_id")]
        profile: String,
        /// Client-supplied key, used only when the server has none configured
        #[serde(default)]
        api_key: Option<String>,
    },
}

pub async fn ws_handler(
    State(state): State<AppState>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: AppState, socket: WebSocket) {
    let connection_id = Uuid::new_v4();
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.hub.register(connection_id, tx);
    info!(%connection_id, "Client connected");

    let (mut sink, mut stream) = socket.split();

    let metrics = state.metrics.clone();
    let forward = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize event");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                metrics.event_dropped();
                break;
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => handle_message(&state, connection_id, text.as_str()).await,
            Message::Close(_) => break,
            _ => {}
        }
    }

    forward.abort();
    state.hub.unregister(connection_id);
    state.limiter.forget(connection_id);
    info!(%connection_id, "Client disconnected");
}

async fn handle_message(state: &AppState, connection_id: Uuid, raw: &str) {
    let message: ClientMessage = match serde_json::from_str(raw) {
        Ok(message) => message,
        Err(e) => {
            debug!(%connection_id, error = %e, "Unparseable client message");
            reject(state, connection_id, "unrecognized message".to_string());
            return;
        }
    };

    let ClientMessage::GenerateMetadata {
        path,
        profile,
        api_key,
    } = message;

    if !state.limiter.allow(connection_id) {
        reject(
            state,
            connection_id,
            "rate limit exceeded, retry shortly".to_string(),
        );
        return;
    }

    let Some(api_key) = resolve_api_key(&state.config.model, api_key) else {
        reject(
            state,
            connection_id,
            "no API key available; configure one on the server or include it in the request"
                .to_string(),
        );
        return;
    };

    // Only the basename is trusted; the image must live in the upload dir
    let Some(filename) = Path::new(&path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
    else {
        reject(state, connection_id, format!("invalid image path '{path}'"));
        return;
    };

    let request = ProcessingRequest {
        image_path: state.config.server.upload_dir.join(filename),
        display_path: path,
        profile_id: profile,
        api_key,
        connection_id,
    };

    let notifier = Arc::new(ClientNotifier::new(state.hub.clone(), connection_id));
    if state.broker.submit(Job { request, notifier }).await {
        state.metrics.request_accepted();
    } else {
        reject(
            state,
            connection_id,
            "server is not accepting work".to_string(),
        );
    }
}

/// Server-side key wins over a client-supplied one; both are screened for
/// obviously unusable values
fn resolve_api_key(config: &ModelConfig, inline: Option<String>) -> Option<String> {
    config
        .api_key
        .clone()
        .or(inline)
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty() && !k.contains(char::is_whitespace))
}

fn reject(state: &AppState, connection_id: Uuid, reason: String) {
    debug!(%connection_id, %reason, "Request rejected");
    state.metrics.request_rejected();
    state
        .hub
        .send(connection_id, ServerEvent::Rejected { reason });
}
