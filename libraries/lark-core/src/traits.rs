//! Collaborator contracts consumed by the playback core
//!
//! Each trait is implemented outside this workspace (HTTP clients, IPC
//! bridges, local databases). The engine receives them as `Arc<dyn ...>` at
//! construction and never looks them up globally.

use crate::error::Result;
use crate::types::{
    FeedBatch, FeedContext, PlaylistState, RepeatMode, SetPlaylist, StreamResolution, Track,
    TrackId,
};
use async_trait::async_trait;

/// Resolves a track id into candidate stream URLs
#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// Look up candidate URLs (and optional lyrics) for a track
    ///
    /// An `Err` and a resolution with `success == false` are handled the same way.
    async fn resolve_stream_urls(&self, track_id: &TrackId) -> Result<StreamResolution>;
}

/// Durable, authoritative holder of the active playlist
///
/// Every mutation returns the complete new state. Callers replace their cached
/// copy with the returned value and never patch it locally.
#[async_trait]
pub trait PlaylistStore: Send + Sync {
    /// Load the current state
    async fn get_playlist(&self) -> Result<PlaylistState>;

    /// Replace (or append to) the list
    async fn set_playlist(&self, request: SetPlaylist) -> Result<PlaylistState>;

    /// Append a track, or insert it first when `insert_front` is set
    ///
    /// The current index must keep pointing at the same track.
    async fn add_track(&self, track: Track, insert_front: bool) -> Result<PlaylistState>;

    /// Move to the next track following the navigation rules
    async fn advance_next(&self) -> Result<PlaylistState>;

    /// Move to the previous track following the navigation rules
    async fn advance_previous(&self) -> Result<PlaylistState>;

    /// Jump to an index
    async fn set_index(&self, index: usize) -> Result<PlaylistState>;

    /// Update shuffle and repeat flags without moving the index
    async fn set_mode(&self, shuffle: bool, repeat: RepeatMode) -> Result<PlaylistState>;

    /// Remove every track
    async fn clear(&self) -> Result<PlaylistState>;
}

/// Receives a record each time a track starts playing
#[async_trait]
pub trait PlayHistorySink: Send + Sync {
    /// Record that `track` started playing
    async fn record_play(&self, track: &Track) -> Result<()>;
}

/// Supplies further tracks for an unbounded feed
#[async_trait]
pub trait FeedService: Send + Sync {
    /// Fetch the next batch for the given context
    async fn fetch_more(&self, context: &FeedContext) -> Result<FeedBatch>;
}
