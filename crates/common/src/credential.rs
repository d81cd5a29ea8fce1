//! Opaque client tokens.
//!
//! A client keeps one random token across sessions. It is the admin
//! credential for the polls it created and the identity of its participant
//! records. Comparisons run in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

const TAG_MESSAGE: &[u8] = b"apollusia-token";

/// An opaque client token.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    /// Wrap a raw token value.
    #[must_use]
    pub const fn new(value: String) -> Self {
        Self(value)
    }

    /// The raw token value, for storage and queries.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare against a stored token without leaking timing information.
    ///
    /// Both values are keyed into an HMAC over a fixed message and the tags
    /// are compared with `verify_slice`, so unequal lengths leak nothing either.
    #[must_use]
    pub fn matches(&self, stored: &str) -> bool {
        let Ok(mut own) = HmacSha256::new_from_slice(self.0.as_bytes()) else {
            return false;
        };
        own.update(TAG_MESSAGE);
        let tag = own.finalize().into_bytes();

        let Ok(mut other) = HmacSha256::new_from_slice(stored.as_bytes()) else {
            return false;
        };
        other.update(TAG_MESSAGE);
        other.verify_slice(&tag).is_ok()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
