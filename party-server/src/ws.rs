//! WebSocket transport
//!
//! One connection task per client. Inbound frames go to the session's
//! protocol handler; outbound messages arrive on the session's unbounded
//! channel (its member record in the room holds the sending half, so
//! broadcasts and direct replies share one ordered stream).

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;

use party_core::ConnectionSession;

use crate::AppState;

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let mut session =
        ConnectionSession::new(state.registry.clone(), state.engine.clone(), tx);
    let session_id = session.id().to_string();
    tracing::info!(%session_id, "client connected");

    // Outbound: drain the session's channel into the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    // Inbound: raw frames into the protocol handler until the stream ends
    // or an error is fatal. Runs inline so the disconnect cleanup below is
    // reached no matter how the connection dies.
    while let Some(msg) = receiver.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(err) => {
                tracing::debug!(%session_id, %err, "websocket error");
                break;
            }
        };

        match msg {
            Message::Text(text) => {
                if session.handle_text(&text).is_err() {
                    // The session already reported the protocol error;
                    // drop the connection.
                    break;
                }
            }
            Message::Close(_) => {
                tracing::debug!(%session_id, "client requested close");
                break;
            }
            // Ping/pong frames are handled by the websocket layer
            _ => {}
        }
    }

    session.disconnect();
    send_task.abort();
    tracing::info!(%session_id, "client disconnected");
}
