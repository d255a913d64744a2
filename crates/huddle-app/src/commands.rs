//! One-shot `keygen` and `token` commands.

use huddle_common::HuddleError;
use huddle_config::HuddleConfig;
use huddle_session::{request_token, AccessKey, LocalTokenGenerator, SessionError};

/// A new access key plus its fingerprint.
pub fn keygen() -> String {
    let key = AccessKey::generate();
    tracing::info!(key_id = %key.key_id(), "generated access key");
    format!("{}\nkey id: {}", key.as_str(), key.key_id())
}

/// Issue a development token and render it with its decoded claims.
pub fn issue_token(
    config: &HuddleConfig,
    access_key: &str,
    room_name: &str,
    user_name: &str,
) -> Result<String, HuddleError> {
    let room_name = match room_name.trim() {
        "" => config.room.default_name.as_str(),
        name => name,
    };
    let generator = LocalTokenGenerator::from_config(&config.token);
    let token = request_token(&generator, access_key, room_name, user_name)?;

    let claims = LocalTokenGenerator::decode_claims(&token).map_err(SessionError::from)?;
    let claims = serde_json::to_string_pretty(&claims)
        .map_err(|e| HuddleError::Other(format!("failed to render claims: {e}")))?;
    tracing::info!(room = room_name, user = user_name, "issued local token");

    Ok(format!("{}\n{claims}", token.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keygen_prints_parseable_key() {
        let out = keygen();
        let first = out.lines().next().unwrap();
        let key = AccessKey::parse(first).unwrap();
        assert!(out.contains(&key.key_id()));
    }

    #[test]
    fn token_uses_default_room_when_blank() {
        let key = AccessKey::generate();
        let out = issue_token(&HuddleConfig::default(), key.as_str(), " ", "bob").unwrap();
        assert!(out.contains("\"rid\": \"Random\""));
        assert!(out.contains("\"uid\": \"bob\""));
        assert!(out.contains(&key.key_id()));
    }

    #[test]
    fn token_with_bad_key_fails() {
        let err = issue_token(&HuddleConfig::default(), "nope", "Standup", "bob").unwrap_err();
        assert!(matches!(err, HuddleError::Session(ref m) if m.contains("invalid credential")));
    }
}
