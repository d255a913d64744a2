//! Room and token configuration types.

use serde::{Deserialize, Serialize};

/// Room defaults applied when the caller leaves a field blank.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Room joined when no room name is given.
    pub default_name: String,
    /// Capacity of the broadcast channel carrying session notices.
    pub notice_capacity: u32,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            default_name: "Random".into(),
            notice_capacity: 16,
        }
    }
}

/// Local development token settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Token lifetime in seconds (valid range: 30-86400).
    pub lifetime_secs: u32,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self { lifetime_secs: 300 }
    }
}
