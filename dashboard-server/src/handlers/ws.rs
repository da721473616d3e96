//! Dashboard WebSocket
//!
//! On connect the client receives `model_info` and `stats_update`; after
//! that every bus event is forwarded as a `{event, data}` text frame.

use axum::{
    extract::{ws::{Message, WebSocket, WebSocketUpgrade}, State},
    response::Response,
};
use tokio::sync::broadcast::error::RecvError;

use pratiraksha_core::logic::events::Envelope;

use crate::AppState;

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn send(socket: &mut WebSocket, envelope: &Envelope) -> bool {
    match envelope.to_json() {
        Ok(text) => socket.send(Message::Text(text)).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize '{}': {}", envelope.event, e);
            true
        }
    }
}

async fn greeting(state: &AppState) -> Vec<Envelope> {
    let mut out = Vec::with_capacity(2);
    match Envelope::model_info(&state.model_info) {
        Ok(envelope) => out.push(envelope),
        Err(e) => tracing::error!("model_info: {}", e),
    }

    let store = state.store.clone();
    match tokio::task::spawn_blocking(move || store.stats()).await {
        Ok(Ok(stats)) => match Envelope::stats_update(&stats) {
            Ok(envelope) => out.push(envelope),
            Err(e) => tracing::error!("stats_update: {}", e),
        },
        Ok(Err(e)) => tracing::error!("Failed to read stats: {}", e),
        Err(e) => tracing::error!("Stats task failed: {}", e),
    }
    out
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    // Subscribe first so nothing emitted during the greeting is lost
    let mut events = state.bus.subscribe();
    tracing::info!("Client connected ({} subscribers)", state.bus.subscriber_count());

    for envelope in greeting(&state).await {
        if !send(&mut socket, &envelope).await {
            return;
        }
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(envelope) => {
                    if !send(&mut socket, &envelope).await {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Client lagging, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(Message::Ping(payload))) => {
                    if socket.send(Message::Pong(payload)).await.is_err() {
                        break;
                    }
                }
                // Clients have nothing to say
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::info!("Client disconnected");
}
