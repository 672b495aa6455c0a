//! HTTP helper endpoints
//!
//! Small out-of-band helpers consumed by clients before they open the
//! WebSocket: room-id allocation and a health check. The sync protocol
//! itself never runs over HTTP.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CreateRoomResponse {
    pub room_id: String,
}

/// Allocate a fresh room id before any client connects.
pub async fn create_room(State(state): State<Arc<AppState>>) -> Json<CreateRoomResponse> {
    let room_id = state.registry.create_room();
    Json(CreateRoomResponse { room_id })
}

/// Liveness probe with a room count for quick inspection.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "service": env!("CARGO_PKG_NAME"),
        "rooms": state.registry.len(),
        "ts_ms": state.engine.now_ms(),
    }))
}
