//! Watch Party - Core Library
//!
//! This library provides the room synchronization core for watching media
//! in lock-step: per-room playback state, join/host arbitration, broadcast
//! fan-out, and time-drift compensation. Transport (WebSocket framing,
//! HTTP helpers) lives in the server crate.

pub mod broadcast;
pub mod clock;
pub mod error;
pub mod room;
pub mod session;
pub mod sync;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SyncError;
pub use room::{Room, RoomCode, RoomRegistry, RoomState};
pub use session::ConnectionSession;
pub use sync::{ClientCommand, ServerMessage, SyncEngine};
