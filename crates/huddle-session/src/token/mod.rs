//! Access keys and join tokens.
//!
//! A join token is derived from an access key plus the room and user
//! names. Construction is delegated to a [`TokenGenerator`]; the request
//! path only rejects unusable keys before delegating.

mod access_key;
mod local;


use std::fmt;

use tracing::debug;

use crate::error::{SessionError, TokenError};

pub use access_key::{AccessKey, ACCESS_KEY_LEN};
pub use local::{LocalTokenGenerator, TokenClaims};

/// Opaque join token handed to the engine.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token(<{} bytes>)", self.0.len())
    }
}

/// Builds join tokens. Implemented by the token-issuing authority.
pub trait TokenGenerator: Send + Sync {
    fn generate(
        &self,
        access_key: &AccessKey,
        room_name: &str,
        user_name: &str,
    ) -> Result<Token, TokenError>;
}

/// Request a join token for `room_name` as `user_name`.
///
/// Fails with [`SessionError::InvalidCredential`] for an empty or
/// malformed access key without calling the generator. Generator
/// failures are returned unchanged.
pub fn request_token(
    generator: &dyn TokenGenerator,
    access_key: &str,
    room_name: &str,
    user_name: &str,
) -> Result<Token, SessionError> {
    let key = AccessKey::parse(access_key)?;
    let token = generator.generate(&key, room_name, user_name)?;
    debug!(key_id = %key.key_id(), room = room_name, "issued join token");
    Ok(token)
}
