//! Connection Session
//!
//! One per connected client. Parses incoming protocol messages, enforces
//! the join-first handshake and the host role, and forwards validated
//! commands to the sync engine under the room's mutation lock.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::broadcast::{broadcast, send_to};
use crate::error::SyncError;
use crate::room::{Room, RoomRegistry};
use crate::sync::{ClientCommand, ServerMessage, SyncEngine};

/// Session ID length in characters
const SESSION_ID_LENGTH: usize = 10;

fn generate_session_id() -> String {
    use rand::distributions::Alphanumeric;
    use rand::Rng;
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_ID_LENGTH)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

/// Per-connection protocol front end.
///
/// Owned by the transport task for the socket's lifetime; between join and
/// disconnect it is registered in exactly one room's member set.
pub struct ConnectionSession {
    id: String,
    name: String,
    registry: Arc<RoomRegistry>,
    engine: SyncEngine,
    /// This session's own outbound channel (shared with its member record).
    outbox: mpsc::UnboundedSender<String>,
    room: Option<Arc<Room>>,
    room_id: Option<String>,
}

impl ConnectionSession {
    pub fn new(
        registry: Arc<RoomRegistry>,
        engine: SyncEngine,
        outbox: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self {
            id: generate_session_id(),
            name: String::new(),
            registry,
            engine,
            outbox,
            room: None,
            room_id: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room_id.as_deref()
    }

    /// Handle one raw text frame from the client.
    ///
    /// `Err` means the error was fatal and already reported to the client;
    /// the transport must close the connection. Non-fatal errors
    /// (`not_authorized`, `invalid_argument`) are reported to this session
    /// only and return `Ok`.
    pub fn handle_text(&mut self, text: &str) -> Result<(), SyncError> {
        let cmd: ClientCommand = match serde_json::from_str(text) {
            Ok(cmd) => cmd,
            Err(err) => {
                return self.fail(SyncError::Protocol(format!("malformed message: {err}")));
            }
        };

        match cmd {
            ClientCommand::Join {
                room,
                name,
                want_host,
                media_id,
            } => self.handle_join(room, name, want_host, media_id),
            other => {
                let Some(room) = self.room.clone() else {
                    return self.fail(SyncError::Protocol(
                        "first message must be join".to_string(),
                    ));
                };
                self.handle_room_command(&room, other);
                Ok(())
            }
        }
    }

    /// Release this session from its room. Must be called exactly once when
    /// the connection ends, however abruptly; if the session was host the
    /// room becomes hostless with playback frozen in place.
    pub fn disconnect(&mut self) {
        let Some(room_id) = self.room_id.take() else {
            return;
        };
        self.room = None;

        let engine = self.engine.clone();
        let session_id = self.id.clone();
        self.registry.with_existing(&room_id, |state| {
            if let Some(member) = engine.leave(state, &session_id) {
                broadcast(
                    state,
                    &ServerMessage::MemberLeft {
                        session_id: session_id.clone(),
                        name: member.name,
                    },
                    None,
                );
            }
        });
        info!(session_id = %self.id, %room_id, "session disconnected");
    }

    fn handle_join(
        &mut self,
        room_id: String,
        name: String,
        want_host: bool,
        media_id: Option<String>,
    ) -> Result<(), SyncError> {
        if room_id.trim().is_empty() {
            return self.fail(SyncError::Protocol("room id must not be empty".to_string()));
        }

        if let Some(room) = self.room.clone() {
            return self.handle_reclaim(&room, &room_id, want_host);
        }

        let engine = self.engine.clone();
        let session_id = self.id.clone();
        let outbox = self.outbox.clone();
        let joiner_name = name.clone();
        let (room, _) = self.registry.with_room(&room_id, move |state| {
            let snapshot = engine.join(
                state,
                &session_id,
                &joiner_name,
                outbox.clone(),
                want_host,
                media_id,
            );
            // Reply first so the new client renders correct state
            // immediately, then tell the rest of the room.
            send_to(&outbox, &snapshot);
            broadcast(
                state,
                &ServerMessage::MemberJoined {
                    session_id: session_id.clone(),
                    name: joiner_name,
                },
                Some(&session_id),
            );
        });

        self.room = Some(room);
        self.room_id = Some(room_id.clone());
        self.name = name;
        info!(session_id = %self.id, %room_id, name = %self.name, "joined room");
        Ok(())
    }

    /// Repeat `join` from a joined session: a host re-claim attempt for the
    /// current room. Naming a different room is out of sequence.
    fn handle_reclaim(
        &mut self,
        room: &Arc<Room>,
        room_id: &str,
        want_host: bool,
    ) -> Result<(), SyncError> {
        if self.room_id.as_deref() != Some(room_id) {
            return self.fail(SyncError::Protocol(
                "already joined a different room".to_string(),
            ));
        }

        room.with_state(|state| {
            let claimed = self.engine.reclaim_host(state, &self.id, want_host);
            let snapshot = self.engine.snapshot(state);
            send_to(&self.outbox, &snapshot);
            if claimed {
                // Everyone learns the new host id
                broadcast(state, &snapshot, Some(&self.id));
            }
        });
        Ok(())
    }

    fn handle_room_command(&self, room: &Arc<Room>, cmd: ClientCommand) {
        let result = room.with_state(|state| match cmd {
            ClientCommand::SetMedia { media_id } => {
                self.engine.set_media(state, &self.id, media_id)
            }
            ClientCommand::Play => self.engine.play(state, &self.id),
            ClientCommand::Pause => self.engine.pause(state, &self.id),
            ClientCommand::Seek { position } => self.engine.seek(state, &self.id, position),
            ClientCommand::Ping { t } => {
                send_to(&self.outbox, &self.engine.pong(t));
                return Ok(());
            }
            ClientCommand::Sync => {
                send_to(&self.outbox, &self.engine.snapshot(state));
                return Ok(());
            }
            ClientCommand::Join { .. } => unreachable!("join handled by caller"),
        }
        .map(|msg| {
            // Accepted command: fan out to everyone else while still under
            // the room lock, so broadcasts follow mutation order.
            broadcast(state, &msg, Some(&self.id));
        }));

        if let Err(err) = result {
            // Reported to the offending sender only; no broadcast, and the
            // connection stays open.
            debug!(session_id = %self.id, %err, "command rejected");
            send_to(&self.outbox, &ServerMessage::from_error(&err));
        }
    }

    /// Report a fatal error to the client and bubble it to the transport.
    fn fail(&self, err: SyncError) -> Result<(), SyncError> {
        warn!(session_id = %self.id, %err, "closing connection");
        send_to(&self.outbox, &ServerMessage::from_error(&err));
        Err(err)
    }
}
