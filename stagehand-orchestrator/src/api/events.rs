//! Live status stream
//!
//! Every WebSocket client receives each status event as a JSON text frame from
//! the moment it connects.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use tokio::sync::broadcast::error::RecvError;

use crate::api::AppState;

/// GET /events
pub async fn status_events(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| forward_events(socket, state))
}

async fn forward_events(mut socket: WebSocket, state: AppState) {
    let mut rx = state.events.subscribe();
    tracing::debug!(
        "Status subscriber connected ({} active)",
        state.events.subscriber_count()
    );

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            tracing::error!("Failed to serialize status event: {}", e);
                            continue;
                        }
                    };
                    if socket.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Status subscriber lagged, skipped {} event(s)", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!("Status subscriber error: {}", e);
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!("Status subscriber disconnected");
}
