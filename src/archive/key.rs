//! Feed public keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid feed key: {0}")]
pub struct InvalidFeedKey(pub String);

/// A 32-byte feed public key, written as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FeedKey([u8; 32]);

impl FeedKey {
    /// Length of the textual form.
    pub const HEX_LEN: usize = 64;

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for FeedKey {
    type Err = InvalidFeedKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // hex::decode accepts uppercase, keys on the wire never are.
        let lowercase = s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if s.len() != Self::HEX_LEN || !lowercase {
            return Err(InvalidFeedKey(s.to_string()));
        }

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| InvalidFeedKey(s.to_string()))?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for FeedKey {
    type Error = InvalidFeedKey;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<FeedKey> for String {
    fn from(key: FeedKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for FeedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for FeedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FeedKey({})", self)
    }
}
