//! Track domain type
use super::ids::TrackId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Playable song entity
///
/// Immutable once enqueued. Missing metadata deserializes to empty strings
/// and zero so display code never has to deal with absent fields.
///
/// Equality and hashing consider `id` only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Track {
    /// Unique track identifier
    pub id: TrackId,

    /// Track title
    pub title: String,

    /// Artist name (denormalized)
    pub artist_name: String,

    /// Album name (denormalized)
    pub album_name: String,

    /// Album identifier
    pub album_id: String,

    /// Track duration in whole seconds
    pub duration_seconds: u32,

    /// Suggested file name for downloads
    pub file_name_hint: String,

    /// Cover art reference (URL or cache key)
    pub cover_ref: String,
}

impl Track {
    /// Create a track with an id and title, all other metadata empty
    pub fn new(id: impl Into<TrackId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    /// Builder-style artist setter
    #[must_use]
    pub fn with_artist(mut self, artist_name: impl Into<String>) -> Self {
        self.artist_name = artist_name.into();
        self
    }

    /// Builder-style duration setter
    #[must_use]
    pub fn with_duration(mut self, seconds: u32) -> Self {
        self.duration_seconds = seconds;
        self
    }

    /// Duration as a `Duration`
    pub fn duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.duration_seconds))
    }

    /// Human readable label, "Artist - Title" or just the title
    pub fn display_name(&self) -> String {
        if self.artist_name.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.artist_name, self.title)
        }
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}

impl std::hash::Hash for Track {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
