//! Microphone capture configuration types.

use serde::{Deserialize, Serialize};

/// Sample rates the capture layer accepts.
pub const SUPPORTED_SAMPLE_RATES: &[u32] = &[8_000, 16_000, 24_000, 32_000, 44_100, 48_000];

/// Processing applied to the local microphone stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub echo_cancellation: bool,
    pub auto_gain_control: bool,
    pub noise_suppression: bool,
    pub sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            auto_gain_control: true,
            noise_suppression: true,
            sample_rate: 48_000,
        }
    }
}
