//! Continuous feed ("radio") payloads
use super::{ids::TrackId, track::Track};
use serde::{Deserialize, Serialize};

/// Context sent to the feed service when asking for more tracks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedContext {
    /// Last track currently in the list, if any
    pub last_track_id: Option<TrackId>,

    /// Feed mode label understood by the service
    pub mode: String,

    /// Pool the feed draws from
    pub pool_id: String,

    /// Whether the most recent track ran to its natural end
    pub over_played: bool,
}

/// Batch of tracks returned by the feed service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedBatch {
    /// Whether the service produced a batch
    pub success: bool,

    /// Tracks to append, in order
    pub tracks: Vec<Track>,
}

impl FeedBatch {
    /// Successful batch
    pub fn of(tracks: Vec<Track>) -> Self {
        Self {
            success: true,
            tracks,
        }
    }
}
