//! Local microphone capture seam.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CaptureError;

/// Processing requested for the local capture stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub auto_gain_control: bool,
    pub noise_suppression: bool,
    pub sample_rate: u32,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            auto_gain_control: true,
            noise_suppression: true,
            sample_rate: 48_000,
        }
    }
}

impl From<&huddle_config::AudioConfig> for CaptureConstraints {
    fn from(config: &huddle_config::AudioConfig) -> Self {
        Self {
            echo_cancellation: config.echo_cancellation,
            auto_gain_control: config.auto_gain_control,
            noise_suppression: config.noise_suppression,
            sample_rate: config.sample_rate,
        }
    }
}

/// An acquired input stream, handed to the engine for encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureStream {
    pub device_id: String,
    pub constraints: CaptureConstraints,
}

/// Host audio capture API.
#[async_trait]
pub trait AudioCapture: Send + Sync {
    async fn acquire(&self, constraints: &CaptureConstraints)
        -> Result<CaptureStream, CaptureError>;
}
