//! Protocol error types

use thiserror::Error;

/// Errors surfaced to clients by the sync protocol.
///
/// Only `Protocol` is fatal to the connection; the other kinds are reported
/// to the offending sender and the session continues.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// Malformed or out-of-sequence message (e.g. a command before `join`).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A playback command from a session that is not the room's host.
    #[error("not authorized: only the host can control playback")]
    NotAuthorized,

    /// A structurally valid command with an unacceptable value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl SyncError {
    /// Wire-level error code sent to the offending session.
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::Protocol(_) => "protocol_error",
            SyncError::NotAuthorized => "not_authorized",
            SyncError::InvalidArgument(_) => "invalid_argument",
        }
    }

    /// Whether the connection must be closed after reporting this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Protocol(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(SyncError::Protocol("x".into()).code(), "protocol_error");
        assert_eq!(SyncError::NotAuthorized.code(), "not_authorized");
        assert_eq!(
            SyncError::InvalidArgument("x".into()).code(),
            "invalid_argument"
        );
    }

    #[test]
    fn test_only_protocol_errors_are_fatal() {
        assert!(SyncError::Protocol("x".into()).is_fatal());
        assert!(!SyncError::NotAuthorized.is_fatal());
        assert!(!SyncError::InvalidArgument("x".into()).is_fatal());
    }
}
