//! Configuration and notice types for the session manager.

use huddle_common::SessionId;
use huddle_config::HuddleConfig;

use crate::capture::CaptureConstraints;
use crate::media::MediaId;

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Room joined when the caller passes a blank room name.
    pub default_room_name: String,
    /// Constraints for the local microphone.
    pub capture: CaptureConstraints,
    /// Capacity of the notice broadcast channel.
    pub notice_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_room_name: "Random".into(),
            capture: CaptureConstraints::default(),
            notice_capacity: 16,
        }
    }
}

impl From<&HuddleConfig> for ManagerConfig {
    fn from(config: &HuddleConfig) -> Self {
        Self {
            default_room_name: config.room.default_name.clone(),
            capture: CaptureConstraints::from(&config.audio),
            notice_capacity: config.room.notice_capacity.max(1) as usize,
        }
    }
}

/// Non-fatal happenings a caller may want to surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// The microphone could not be opened; the session stays up in
    /// listen-only mode.
    DeviceAcquisitionWarning {
        session_id: SessionId,
        reason: String,
    },
    /// The local microphone stream was registered with the engine.
    LocalMediaReady {
        session_id: SessionId,
        media_id: MediaId,
    },
}
