//! Sync Protocol Messages
//!
//! JSON messages exchanged over the per-client stream. Positions and
//! timestamps are integer milliseconds; timestamps are server epoch time.

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// A member entry in a room snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberInfo {
    /// Session ID of the member
    pub session_id: String,
    /// Display name chosen by the user
    pub name: String,
}

/// Messages from client to server.
///
/// The first message on a connection must be `join`; everything else is
/// rejected until the session is in a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Enter a room (or re-claim the host role of the current room).
    Join {
        room: String,
        name: String,
        #[serde(default)]
        want_host: bool,
        /// Seeds the room's media if it has none yet.
        #[serde(default)]
        media_id: Option<String>,
    },

    // === Playback commands (host only) ===
    /// Replace the room's media and reset playback to the start.
    SetMedia { media_id: String },
    /// Start or resume playback.
    Play,
    /// Pause playback.
    Pause,
    /// Jump to a position (milliseconds). Signed so a negative value is a
    /// reportable argument error rather than a parse failure.
    Seek { position: i64 },

    // === Any joined session ===
    /// RTT probe; answered with `pong` carrying the same `t`.
    Ping { t: u64 },
    /// Request a fresh drift-compensated snapshot (triggered re-sync).
    Sync,
}

/// Messages from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full room snapshot (sent on join, re-sync, media change, host change).
    State {
        media_id: Option<String>,
        /// Drift-compensated position in milliseconds
        position: u64,
        playing: bool,
        host_id: Option<String>,
        members: Vec<MemberInfo>,
    },

    /// Playback started at `position` as of server time `timestamp`.
    Play { position: u64, timestamp: u64 },

    /// Playback paused at `position`.
    Pause { position: u64 },

    /// Position jumped to `position`; `playing` is unchanged by a seek.
    Seek { position: u64, playing: bool },

    /// Someone entered the room.
    MemberJoined { session_id: String, name: String },

    /// Someone left the room.
    MemberLeft { session_id: String, name: String },

    /// Answer to a `ping`.
    Pong { t: u64, server_ts: u64 },

    /// Error report, sent only to the offending session.
    Error { code: String, message: String },
}

impl ServerMessage {
    /// Build the wire error report for a [`SyncError`].
    pub fn from_error(err: &SyncError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}
