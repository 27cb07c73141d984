//! Core types for playback orchestration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EngineStatus {
    /// Nothing playing
    #[default]
    Stopped,

    /// Resolving URLs or driving attempts for a track
    Loading,

    /// Device confirmed playback
    Playing,

    /// Paused mid-track
    Paused,
}

impl EngineStatus {
    pub fn is_playing(self) -> bool {
        self == Self::Playing
    }
}

/// Snapshot of what the engine is doing right now
///
/// Derived from the playback device at the time of the call, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineState {
    /// Engine lifecycle state
    pub status: EngineStatus,

    /// Whether audio is currently sounding
    pub is_playing: bool,

    /// Position within the current track
    pub current_time: Duration,

    /// Duration reported by the device (zero until known)
    pub duration: Duration,

    /// Device volume (0.0 - 1.0)
    pub volume: f32,
}
