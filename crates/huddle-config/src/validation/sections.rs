//! Per-section validators for room, audio, and token settings.

use crate::schema::{HuddleConfig, SUPPORTED_SAMPLE_RATES};

use super::helpers::{validate_name, validate_range};

pub(crate) fn validate_room(errors: &mut Vec<String>, config: &HuddleConfig) {
    validate_name(errors, "room.default_name", &config.room.default_name, 128);
    validate_range(
        errors,
        "room.notice_capacity",
        config.room.notice_capacity,
        1,
        1024,
    );
}

pub(crate) fn validate_audio(errors: &mut Vec<String>, config: &HuddleConfig) {
    let rate = config.audio.sample_rate;
    if !SUPPORTED_SAMPLE_RATES.contains(&rate) {
        errors.push(format!("audio.sample_rate = {rate} is not supported"));
    }
}

pub(crate) fn validate_token(errors: &mut Vec<String>, config: &HuddleConfig) {
    validate_range(
        errors,
        "token.lifetime_secs",
        config.token.lifetime_secs,
        30,
        86_400,
    );
}
