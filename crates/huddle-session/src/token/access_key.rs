//! Access key generation and parsing.

use std::fmt;

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::SessionError;

/// Decoded key size.
const ACCESS_KEY_BYTES: usize = 33;

/// Length of an encoded access key.
pub const ACCESS_KEY_LEN: usize = 44;

/// A base64-encoded access key.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessKey {
    encoded: String,
    raw: [u8; ACCESS_KEY_BYTES],
}

impl AccessKey {
    /// Generate a fresh random access key, for local testing.
    pub fn generate() -> Self {
        let mut raw = [0u8; ACCESS_KEY_BYTES];
        rand::thread_rng().fill_bytes(&mut raw);
        Self {
            encoded: B64.encode(raw),
            raw,
        }
    }

    /// Parse an access key. Only the shape is checked here (length and
    /// base64); whether the key is accepted is up to the token issuer.
    pub fn parse(text: &str) -> Result<Self, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::InvalidCredential(
                "access key is empty".into(),
            ));
        }
        if text.len() != ACCESS_KEY_LEN {
            return Err(SessionError::InvalidCredential(format!(
                "access key must be {ACCESS_KEY_LEN} characters, got {}",
                text.len()
            )));
        }

        let bytes = B64.decode(text).map_err(|e| {
            SessionError::InvalidCredential(format!("access key is not valid base64: {e}"))
        })?;
        let raw: [u8; ACCESS_KEY_BYTES] = bytes.try_into().map_err(|_| {
            SessionError::InvalidCredential("access key has the wrong decoded length".into())
        })?;
        Ok(Self {
            encoded: text.to_string(),
            raw,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    /// Short public fingerprint of the key, safe to log.
    pub fn key_id(&self) -> String {
        let digest = Sha256::digest(self.raw);
        digest[..4].iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl fmt::Debug for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessKey({})", self.key_id())
    }
}
