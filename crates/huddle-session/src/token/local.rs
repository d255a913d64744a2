//! Development-only token generator.
//!
//! Produces unsigned tokens carrying the join claims as base64url JSON.
//! Real deployments get tokens from a server that holds the access key.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::TokenError;

use super::{AccessKey, Token, TokenGenerator};

/// Claims carried by a locally generated token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Room name.
    pub rid: String,
    /// User name.
    pub uid: String,
    /// Access key fingerprint.
    pub kid: String,
    /// Issued at, unix seconds.
    pub iat: i64,
    /// Expires at, unix seconds.
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct LocalTokenGenerator {
    lifetime: Duration,
}

impl LocalTokenGenerator {
    pub fn new(lifetime: Duration) -> Self {
        Self { lifetime }
    }

    pub fn from_config(config: &huddle_config::TokenConfig) -> Self {
        Self::new(Duration::from_secs(u64::from(config.lifetime_secs)))
    }

    /// Read the claims back out of a token this generator produced.
    pub fn decode_claims(token: &Token) -> Result<TokenClaims, TokenError> {
        let json = URL_SAFE_NO_PAD
            .decode(token.as_str())
            .map_err(|e| TokenError::Encoding(e.to_string()))?;
        serde_json::from_slice(&json).map_err(|e| TokenError::Encoding(e.to_string()))
    }
}

impl Default for LocalTokenGenerator {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

impl TokenGenerator for LocalTokenGenerator {
    fn generate(
        &self,
        access_key: &AccessKey,
        room_name: &str,
        user_name: &str,
    ) -> Result<Token, TokenError> {
        if room_name.is_empty() {
            return Err(TokenError::Rejected("room name is empty".into()));
        }

        let iat = chrono::Utc::now().timestamp();
        let lifetime = i64::try_from(self.lifetime.as_secs())
            .map_err(|_| TokenError::Encoding("token lifetime too large".into()))?;
        let claims = TokenClaims {
            rid: room_name.to_string(),
            uid: user_name.to_string(),
            kid: access_key.key_id(),
            iat,
            exp: iat + lifetime,
        };

        let json = serde_json::to_vec(&claims).map_err(|e| TokenError::Encoding(e.to_string()))?;
        Ok(Token::new(URL_SAFE_NO_PAD.encode(json)))
    }
}
