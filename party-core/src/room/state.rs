//! Per-room playback and membership record

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::sync::{MemberInfo, ServerMessage};

/// A member of a room, keyed by session ID in [`RoomState::members`].
#[derive(Debug, Clone)]
pub struct Member {
    /// Display name chosen by the user
    pub name: String,
    /// Outbound channel to this member's connection task. Messages are
    /// pre-serialized so one payload serves the whole fan-out.
    pub outbox: mpsc::UnboundedSender<String>,
}

/// Authoritative state of one room.
///
/// The stored position is never "live": it is only meaningful together with
/// `updated_at_ms` and `playing`. Use [`RoomState::effective_position_ms`]
/// for anything that leaves the server.
#[derive(Debug, Clone)]
pub struct RoomState {
    /// Room ID this state belongs to
    pub room_id: String,
    /// Currently selected media, if any
    pub media_id: Option<String>,
    /// Playback position baseline in milliseconds
    pub position_ms: u64,
    /// Whether playback is running
    pub playing: bool,
    /// Server time (epoch ms) at which position/playing were last authoritative
    pub updated_at_ms: u64,
    /// Session ID of the current host, if one has claimed the role
    pub host_id: Option<String>,
    /// Connected members by session ID
    members: HashMap<String, Member>,
}

impl RoomState {
    /// Create a fresh room: no media, position 0, paused, no host, empty.
    pub fn new(room_id: impl Into<String>, now_ms: u64) -> Self {
        Self {
            room_id: room_id.into(),
            media_id: None,
            position_ms: 0,
            playing: false,
            updated_at_ms: now_ms,
            host_id: None,
            members: HashMap::new(),
        }
    }

    /// Drift-compensated position: while playing, the baseline advances with
    /// the time elapsed since the last authoritative change.
    pub fn effective_position_ms(&self, now_ms: u64) -> u64 {
        if self.playing {
            self.position_ms + now_ms.saturating_sub(self.updated_at_ms)
        } else {
            self.position_ms
        }
    }

    /// Check whether the given session holds the host role.
    pub fn is_host(&self, session_id: &str) -> bool {
        self.host_id.as_deref() == Some(session_id)
    }

    /// Add a member. Replaces any previous entry for the same session.
    pub fn add_member(&mut self, session_id: impl Into<String>, member: Member) {
        self.members.insert(session_id.into(), member);
    }

    /// Remove a member, returning its record if it was present.
    pub fn remove_member(&mut self, session_id: &str) -> Option<Member> {
        self.members.remove(session_id)
    }

    pub fn contains_member(&self, session_id: &str) -> bool {
        self.members.contains_key(session_id)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Iterate members as (session_id, member).
    pub fn members(&self) -> impl Iterator<Item = (&String, &Member)> {
        self.members.iter()
    }

    /// Member list for snapshots (host first, then others sorted by name).
    pub fn member_list(&self) -> Vec<MemberInfo> {
        let mut list: Vec<MemberInfo> = self
            .members
            .iter()
            .map(|(session_id, member)| MemberInfo {
                session_id: session_id.clone(),
                name: member.name.clone(),
            })
            .collect();
        list.sort_by(|a, b| {
            // Host always first
            match (self.is_host(&a.session_id), self.is_host(&b.session_id)) {
                (true, false) => std::cmp::Ordering::Less,
                (false, true) => std::cmp::Ordering::Greater,
                // Among non-hosts, sort by display name
                _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            }
        });
        list
    }

    /// Full snapshot with drift-compensated position.
    pub fn snapshot(&self, now_ms: u64) -> ServerMessage {
        ServerMessage::State {
            media_id: self.media_id.clone(),
            position: self.effective_position_ms(now_ms),
            playing: self.playing,
            host_id: self.host_id.clone(),
            members: self.member_list(),
        }
    }
}
