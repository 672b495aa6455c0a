//! Broadcast Fan-out
//!
//! Delivers one payload to every member of a room, optionally excluding the
//! sender so a client never reprocesses its own command. A recipient whose
//! connection task has gone away is logged and skipped; per-recipient
//! failures never abort the rest of the fan-out or the originating command.

use tokio::sync::mpsc;
use tracing::warn;

use crate::room::RoomState;
use crate::sync::ServerMessage;

/// Send a message to every member except `exclude`.
pub fn broadcast(state: &RoomState, msg: &ServerMessage, exclude: Option<&str>) {
    let payload = match serde_json::to_string(msg) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(room_id = %state.room_id, %err, "failed to encode broadcast payload");
            return;
        }
    };

    for (session_id, member) in state.members() {
        if exclude == Some(session_id.as_str()) {
            continue;
        }
        if member.outbox.send(payload.clone()).is_err() {
            warn!(
                room_id = %state.room_id,
                session_id = %session_id,
                "failed to deliver broadcast, recipient gone"
            );
        }
    }
}

/// Send a message to a single session's outbox.
pub fn send_to(outbox: &mpsc::UnboundedSender<String>, msg: &ServerMessage) {
    match serde_json::to_string(msg) {
        Ok(payload) => {
            if outbox.send(payload).is_err() {
                warn!("failed to deliver message, recipient gone");
            }
        }
        Err(err) => warn!(%err, "failed to encode message"),
    }
}
