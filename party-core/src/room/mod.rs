//! Room State Management

mod code;
mod registry;
mod state;

pub use code::RoomCode;
pub use registry::{Room, RoomRegistry};
pub use state::{Member, RoomState};
