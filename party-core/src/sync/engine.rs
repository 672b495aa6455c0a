//! Sync Engine
//!
//! Applies validated commands to a [`RoomState`] and derives the outgoing
//! payloads. All positions leaving the engine are drift-compensated: the
//! stored baseline plus the time elapsed since the last authoritative
//! change, so clients that receive a message late still converge.
//!
//! The engine itself holds no room state; callers run it under the room's
//! mutation lock.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::SyncError;
use crate::room::{Member, RoomState};
use crate::sync::protocol::ServerMessage;

/// The protocol state machine for playback commands and join arbitration.
#[derive(Clone)]
pub struct SyncEngine {
    clock: Arc<dyn Clock>,
}

impl SyncEngine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Register a session in the room and arbitrate the host role.
    ///
    /// Host assignment: a hostless room grants the role iff `want_host`; an
    /// existing host silently downgrades the request. A supplied media id
    /// seeds a room that has none yet, regardless of host status, so the
    /// first arrival can bootstrap content. Returns the snapshot to send
    /// back to the joiner.
    pub fn join(
        &self,
        state: &mut RoomState,
        session_id: &str,
        name: &str,
        outbox: mpsc::UnboundedSender<String>,
        want_host: bool,
        media_id: Option<String>,
    ) -> ServerMessage {
        state.add_member(
            session_id,
            Member {
                name: name.to_string(),
                outbox,
            },
        );

        if state.host_id.is_none() && want_host {
            state.host_id = Some(session_id.to_string());
            info!(room_id = %state.room_id, session_id, "host claimed");
        }

        if state.media_id.is_none() {
            if let Some(media_id) = media_id {
                debug!(room_id = %state.room_id, %media_id, "media seeded on join");
                state.media_id = Some(media_id);
            }
        }

        state.snapshot(self.now_ms())
    }

    /// Host re-claim from an already-joined member (a repeat `join` for the
    /// same room). Returns `true` if the session acquired the role.
    pub fn reclaim_host(&self, state: &mut RoomState, session_id: &str, want_host: bool) -> bool {
        if want_host && state.host_id.is_none() && state.contains_member(session_id) {
            state.host_id = Some(session_id.to_string());
            info!(room_id = %state.room_id, session_id, "host re-claimed");
            return true;
        }
        false
    }

    /// Remove a departing session; a departing host leaves the room
    /// hostless with playback frozen in place (members keep watching with
    /// drift compensation until someone re-claims the role).
    pub fn leave(&self, state: &mut RoomState, session_id: &str) -> Option<Member> {
        let member = state.remove_member(session_id)?;
        if state.is_host(session_id) {
            state.host_id = None;
            info!(room_id = %state.room_id, session_id, "host left, room is hostless");
        }
        Some(member)
    }

    /// Replace the room's media and reset playback to the start.
    pub fn set_media(
        &self,
        state: &mut RoomState,
        session_id: &str,
        media_id: String,
    ) -> Result<ServerMessage, SyncError> {
        self.ensure_host(state, session_id)?;
        let now_ms = self.now_ms();
        info!(room_id = %state.room_id, %media_id, "media changed");
        state.media_id = Some(media_id);
        state.position_ms = 0;
        state.playing = false;
        state.updated_at_ms = now_ms;
        // Full snapshot: other clients must reset their players
        Ok(state.snapshot(now_ms))
    }

    /// Start or resume playback. Idempotent: the elapsed time is folded
    /// into the baseline before re-stamping, so a repeat `play` leaves the
    /// effective position unchanged while refreshing the drift anchor.
    pub fn play(&self, state: &mut RoomState, session_id: &str) -> Result<ServerMessage, SyncError> {
        self.ensure_host(state, session_id)?;
        let now_ms = self.now_ms();
        let position = state.effective_position_ms(now_ms);
        state.position_ms = position;
        state.playing = true;
        state.updated_at_ms = now_ms;
        Ok(ServerMessage::Play {
            position,
            timestamp: now_ms,
        })
    }

    /// Pause playback, freezing the effective position into the baseline.
    /// Freezing first is what keeps a later `play` from resuming stale.
    pub fn pause(
        &self,
        state: &mut RoomState,
        session_id: &str,
    ) -> Result<ServerMessage, SyncError> {
        self.ensure_host(state, session_id)?;
        let now_ms = self.now_ms();
        let position = state.effective_position_ms(now_ms);
        state.position_ms = position;
        state.playing = false;
        state.updated_at_ms = now_ms;
        Ok(ServerMessage::Pause { position })
    }

    /// Jump to a position (milliseconds). The playing flag is unchanged.
    pub fn seek(
        &self,
        state: &mut RoomState,
        session_id: &str,
        position: i64,
    ) -> Result<ServerMessage, SyncError> {
        self.ensure_host(state, session_id)?;
        if position < 0 {
            return Err(SyncError::InvalidArgument(format!(
                "seek position must be non-negative, got {position}"
            )));
        }
        let now_ms = self.now_ms();
        state.position_ms = position as u64;
        state.updated_at_ms = now_ms;
        Ok(ServerMessage::Seek {
            position: position as u64,
            playing: state.playing,
        })
    }

    /// Fresh drift-compensated snapshot (join replies, triggered re-sync).
    pub fn snapshot(&self, state: &RoomState) -> ServerMessage {
        state.snapshot(self.now_ms())
    }

    /// Answer an RTT probe.
    pub fn pong(&self, t: u64) -> ServerMessage {
        ServerMessage::Pong {
            t,
            server_ts: self.now_ms(),
        }
    }

    fn ensure_host(&self, state: &RoomState, session_id: &str) -> Result<(), SyncError> {
        if state.is_host(session_id) {
            Ok(())
        } else {
            Err(SyncError::NotAuthorized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn engine_at(start_ms: u64) -> (SyncEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start_ms));
        (SyncEngine::new(clock.clone()), clock)
    }

    fn outbox() -> mpsc::UnboundedSender<String> {
        mpsc::unbounded_channel().0
    }

    fn hosted_room(engine: &SyncEngine) -> RoomState {
        let mut state = RoomState::new("R1", engine.now_ms());
        engine.join(&mut state, "host", "ana", outbox(), true, None);
        state
    }

    #[test]
    fn test_join_grants_host_only_when_wanted_and_vacant() {
        let (engine, _) = engine_at(1_000);
        let mut state = RoomState::new("R1", 1_000);

        engine.join(&mut state, "s1", "ana", outbox(), false, None);
        assert!(state.host_id.is_none());

        engine.join(&mut state, "s2", "bob", outbox(), true, None);
        assert_eq!(state.host_id.as_deref(), Some("s2"));

        // Existing host: want_host silently downgrades
        engine.join(&mut state, "s3", "cho", outbox(), true, None);
        assert_eq!(state.host_id.as_deref(), Some("s2"));
        assert_eq!(state.member_count(), 3);
    }

    #[test]
    fn test_join_seeds_media_once_regardless_of_host() {
        let (engine, _) = engine_at(1_000);
        let mut state = RoomState::new("R1", 1_000);

        // Non-host arrival bootstraps content
        engine.join(&mut state, "s1", "ana", outbox(), false, Some("movie1".into()));
        assert_eq!(state.media_id.as_deref(), Some("movie1"));

        // A later media id does not overwrite the seed
        engine.join(&mut state, "s2", "bob", outbox(), true, Some("movie2".into()));
        assert_eq!(state.media_id.as_deref(), Some("movie1"));
    }

    #[test]
    fn test_set_media_round_trip() {
        let (engine, clock) = engine_at(1_000);
        let mut state = hosted_room(&engine);
        state.playing = true;
        state.position_ms = 9_000;
        clock.advance(500);

        let msg = engine.set_media(&mut state, "host", "movie2".into()).unwrap();
        match msg {
            ServerMessage::State {
                media_id,
                position,
                playing,
                ..
            } => {
                assert_eq!(media_id.as_deref(), Some("movie2"));
                assert_eq!(position, 0);
                assert!(!playing);
            }
            other => panic!("unexpected message: {other:?}"),
        }
        assert_eq!(state.updated_at_ms, 1_500);
    }

    #[test]
    fn test_play_is_idempotent() {
        let (engine, clock) = engine_at(1_000);
        let mut state = hosted_room(&engine);
        state.position_ms = 4_000;

        let first = engine.play(&mut state, "host").unwrap();
        assert!(matches!(first, ServerMessage::Play { position: 4_000, .. }));

        // Repeat play with no elapsed time: effective position unchanged
        let second = engine.play(&mut state, "host").unwrap();
        assert!(matches!(second, ServerMessage::Play { position: 4_000, .. }));
        assert!(state.playing);

        // Repeat play after 2s keeps the effective position continuous
        clock.advance(2_000);
        let third = engine.play(&mut state, "host").unwrap();
        assert!(matches!(third, ServerMessage::Play { position: 6_000, .. }));
        assert_eq!(state.effective_position_ms(clock.now_ms()), 6_000);
    }

    #[test]
    fn test_pause_freezes_effective_position() {
        let (engine, clock) = engine_at(1_000);
        let mut state = hosted_room(&engine);

        engine.play(&mut state, "host").unwrap();
        clock.advance(5_000);

        let msg = engine.pause(&mut state, "host").unwrap();
        assert!(matches!(msg, ServerMessage::Pause { position: 5_000 }));
        assert!(!state.playing);
        assert_eq!(state.position_ms, 5_000);

        // A later play resumes from the frozen point, not a stale one
        clock.advance(10_000);
        let msg = engine.play(&mut state, "host").unwrap();
        assert!(matches!(msg, ServerMessage::Play { position: 5_000, .. }));
    }

    #[test]
    fn test_effective_position_monotone_while_playing() {
        let (engine, clock) = engine_at(1_000);
        let mut state = hosted_room(&engine);
        engine.play(&mut state, "host").unwrap();

        let mut last = 0;
        for _ in 0..10 {
            clock.advance(137);
            let now = state.effective_position_ms(clock.now_ms());
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_seek_keeps_playing_flag() {
        let (engine, _) = engine_at(1_000);
        let mut state = hosted_room(&engine);

        let msg = engine.seek(&mut state, "host", 30_000).unwrap();
        assert!(matches!(
            msg,
            ServerMessage::Seek {
                position: 30_000,
                playing: false
            }
        ));

        engine.play(&mut state, "host").unwrap();
        let msg = engine.seek(&mut state, "host", 45_000).unwrap();
        assert!(matches!(
            msg,
            ServerMessage::Seek {
                position: 45_000,
                playing: true
            }
        ));
    }

    #[test]
    fn test_negative_seek_is_rejected_without_mutation() {
        let (engine, _) = engine_at(1_000);
        let mut state = hosted_room(&engine);
        state.position_ms = 7_000;

        let err = engine.seek(&mut state, "host", -1).unwrap_err();
        assert!(matches!(err, SyncError::InvalidArgument(_)));
        assert_eq!(state.position_ms, 7_000);
        assert_eq!(state.updated_at_ms, 1_000);
    }

    #[test]
    fn test_non_host_commands_are_rejected_without_mutation() {
        let (engine, _) = engine_at(1_000);
        let mut state = hosted_room(&engine);
        engine.join(&mut state, "guest", "bob", outbox(), false, None);

        let before = state.clone();
        assert!(matches!(
            engine.play(&mut state, "guest"),
            Err(SyncError::NotAuthorized)
        ));
        assert!(matches!(
            engine.seek(&mut state, "guest", 1_000),
            Err(SyncError::NotAuthorized)
        ));
        assert!(matches!(
            engine.set_media(&mut state, "guest", "movie9".into()),
            Err(SyncError::NotAuthorized)
        ));
        assert_eq!(state.position_ms, before.position_ms);
        assert_eq!(state.playing, before.playing);
        assert_eq!(state.media_id, before.media_id);
    }

    #[test]
    fn test_host_leave_freezes_room_hostless() {
        let (engine, clock) = engine_at(1_000);
        let mut state = hosted_room(&engine);
        engine.join(&mut state, "guest", "bob", outbox(), false, None);
        engine.play(&mut state, "host").unwrap();

        engine.leave(&mut state, "host").unwrap();
        assert!(state.host_id.is_none());
        assert!(state.playing);

        // Drift compensation keeps running for the remaining members
        clock.advance(3_000);
        assert_eq!(state.effective_position_ms(clock.now_ms()), 3_000);

        // No commands until someone re-claims the role
        assert!(matches!(
            engine.play(&mut state, "guest"),
            Err(SyncError::NotAuthorized)
        ));
        assert!(engine.reclaim_host(&mut state, "guest", true));
        assert!(engine.play(&mut state, "guest").is_ok());
    }

    #[test]
    fn test_reclaim_requires_vacancy_and_membership() {
        let (engine, _) = engine_at(1_000);
        let mut state = hosted_room(&engine);
        engine.join(&mut state, "guest", "bob", outbox(), false, None);

        // Role occupied
        assert!(!engine.reclaim_host(&mut state, "guest", true));

        engine.leave(&mut state, "host");
        // Not asking for it
        assert!(!engine.reclaim_host(&mut state, "guest", false));
        // Stranger
        assert!(!engine.reclaim_host(&mut state, "stranger", true));
        assert!(engine.reclaim_host(&mut state, "guest", true));
        assert_eq!(state.host_id.as_deref(), Some("guest"));
    }
}
