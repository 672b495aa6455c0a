//! Room ID Generation
//!
//! Generates human-friendly room identifiers for the room-creation endpoint.
//! Clients may also bring their own opaque ids; these codes are just the
//! server-allocated flavor.

use std::fmt;

/// Characters used in room codes (unambiguous, uppercase)
/// Excludes: 0/O, 1/I/L, 5/S, 2/Z to avoid confusion
const ALPHABET: &[u8] = b"346789ABCDEFGHJKMNPQRTUVWXY";

/// Room code length (8 chars = ~282 trillion combinations with 27-char alphabet)
const CODE_LENGTH: usize = 8;

/// A server-allocated room identifier that can be shared to join a room
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomCode(String);

impl RoomCode {
    /// Generate a random room code using cryptographically secure RNG
    pub fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();

        let mut code = String::with_capacity(CODE_LENGTH);
        for _ in 0..CODE_LENGTH {
            let idx = rng.gen_range(0..ALPHABET.len());
            code.push(ALPHABET[idx] as char);
        }
        RoomCode(code)
    }

    /// Get the room code as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_code() {
        let code1 = RoomCode::random();
        let code2 = RoomCode::random();
        // Very unlikely to be equal
        assert_ne!(code1, code2);
        assert_eq!(code1.as_str().len(), CODE_LENGTH);
    }

    #[test]
    fn test_codes_stay_in_alphabet() {
        let code = RoomCode::random();
        assert!(code.as_str().bytes().all(|b| ALPHABET.contains(&b)));
    }
}
