//! Configuration schema types for Huddle.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod audio;
mod room;
mod system;

pub use audio::*;
pub use room::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Root configuration for Huddle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HuddleConfig {
    pub room: RoomConfig,
    pub audio: AudioConfig,
    pub token: TokenConfig,
    pub logging: LoggingConfig,
}
