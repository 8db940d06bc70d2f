//! crates/checkin_core/src/identifier.rs
//!
//! Short, typable registrant identifiers: six characters drawn from `A-Z0-9`.
//! The same string is what gets embedded in the QR code and what staff type
//! in when a code cannot be scanned.

use rand::Rng;
use serde::Serialize;
use std::fmt;

/// The 36-symbol alphabet identifiers are drawn from.
pub const ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Number of characters in every identifier.
pub const SHORT_ID_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    #[error("Invalid QR code format: '{0}' is not a 6-character code")]
    InvalidFormat(String),
}

/// A validated six-character identifier, always stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ShortId(String);

impl ShortId {
    /// Normalizes manual or scanned input (trim + uppercase) and validates it.
    pub fn parse(raw: &str) -> Result<Self, IdentifierError> {
        let normalized = raw.trim().to_ascii_uppercase();
        if is_well_formed(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(IdentifierError::InvalidFormat(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ShortId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// True when `s` matches `^[A-Z0-9]{6}$` exactly.
pub fn is_well_formed(s: &str) -> bool {
    s.len() == SHORT_ID_LEN && s.bytes().all(|b| ALPHABET.contains(&b))
}

/// Issues a fresh identifier from the thread-local RNG.
///
/// Uniqueness is not checked here; callers that need it retry against the store.
pub fn issue() -> ShortId {
    issue_with(&mut rand::thread_rng())
}

/// Issues an identifier using the supplied random source.
pub fn issue_with<R: Rng + ?Sized>(rng: &mut R) -> ShortId {
    let id: String = (0..SHORT_ID_LEN)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    ShortId(id)
}
