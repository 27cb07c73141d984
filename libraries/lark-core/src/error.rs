//! Core error types for Lark
use thiserror::Error;

/// Result type alias using `LarkError`
pub type Result<T> = std::result::Result<T, LarkError>;

/// Errors reported by collaborators of the playback core
#[derive(Error, Debug)]
pub enum LarkError {
    /// Playlist store round-trip failed or was rejected
    #[error("Playlist store error: {0}")]
    Store(String),

    /// Stream URL resolution failed
    #[error("Stream resolver error: {0}")]
    Resolver(String),

    /// Continuous feed could not supply more tracks
    #[error("Feed error: {0}")]
    Feed(String),

    /// Play-history sink rejected a record
    #[error("Play history error: {0}")]
    History(String),

    /// Index does not address a track in the list
    #[error("Index {index} out of range for {len} tracks")]
    OutOfRange {
        /// Requested index
        index: usize,
        /// Number of tracks in the list
        len: usize,
    },

    /// Operation needs at least one track
    #[error("Playlist is empty")]
    EmptyPlaylist,

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl LarkError {
    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a resolver error
    pub fn resolver(msg: impl Into<String>) -> Self {
        Self::Resolver(msg.into())
    }

    /// Create a feed error
    pub fn feed(msg: impl Into<String>) -> Self {
        Self::Feed(msg.into())
    }

    /// Create a play-history error
    pub fn history(msg: impl Into<String>) -> Self {
        Self::History(msg.into())
    }

    /// Create an out-of-range error
    pub fn out_of_range(index: usize, len: usize) -> Self {
        Self::OutOfRange { index, len }
    }
}
