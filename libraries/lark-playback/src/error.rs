//! Error types for playback orchestration

use lark_core::LarkError;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Candidate URL is blank, malformed or a placeholder
    #[error("Invalid stream URL: {0:?}")]
    InvalidUrl(String),

    /// Native playback failure
    #[error("Device error: {0}")]
    Device(String),

    /// Device used before `initialize` or after `destroy`
    #[error("Playback device not initialized")]
    NotInitialized,

    /// Resolver returned nothing playable
    #[error("No stream candidates for track {0}")]
    NoCandidates(String),

    /// Persistence round-trip failed; local state left untouched
    #[error("Playlist store mutation failed: {0}")]
    StoreMutationFailed(#[source] LarkError),

    /// Index does not address a track
    #[error("Index out of bounds: {index} (len {len})")]
    OutOfRange { index: usize, len: usize },

    /// Operation needs a non-empty playlist
    #[error("Playlist is empty")]
    EmptyPlaylist,

    /// A later navigation request replaced this one before it ran
    #[error("Navigation request superseded")]
    Superseded,

    /// Engine task is gone
    #[error("Playback engine is not running")]
    EngineClosed,

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PlaybackError {
    /// Create a device error
    pub fn device(msg: impl Into<String>) -> Self {
        Self::Device(msg.into())
    }

    /// Whether this is an expected "nothing to do" outcome rather than a failure
    ///
    /// Empty-list navigation and superseded requests are not shown to users.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::EmptyPlaylist | Self::Superseded)
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
