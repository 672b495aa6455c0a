//! Sync Protocol and Engine

mod engine;
mod protocol;

pub use engine::SyncEngine;
pub use protocol::{ClientCommand, MemberInfo, ServerMessage};
