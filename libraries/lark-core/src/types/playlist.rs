//! Playlist state types shared with the persisted playlist store
use super::track::Track;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Repeat mode for playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}

impl RepeatMode {
    /// Convert to string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::All => "all",
            Self::One => "one",
        }
    }

    /// Parse from string
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "off" => Some(Self::Off),
            "all" => Some(Self::All),
            "one" => Some(Self::One),
            _ => None,
        }
    }
}

impl std::fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of the active playlist as confirmed by the store
///
/// `current_index` is `None` exactly when there is no current track. On the
/// wire it is encoded as `-1`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistState {
    /// Tracks in playback order (for non-shuffled modes)
    #[serde(default)]
    pub tracks: Vec<Track>,

    /// Index of the current track
    #[serde(with = "wire_index", default)]
    pub current_index: Option<usize>,

    /// Display label of the list
    #[serde(default)]
    pub name: String,

    /// Whether shuffle is enabled
    #[serde(default, rename = "shuffleMode")]
    pub shuffle: bool,

    /// Repeat mode
    #[serde(default, rename = "repeatMode")]
    pub repeat: RepeatMode,
}

impl PlaylistState {
    /// Currently selected track, if any
    pub fn current_track(&self) -> Option<&Track> {
        self.current_index.and_then(|index| self.tracks.get(index))
    }

    /// Number of tracks
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Whether the list has no tracks
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Tracks left after the current one
    pub fn remaining_after_current(&self) -> usize {
        match self.current_index {
            Some(index) => self.tracks.len().saturating_sub(index + 1),
            None => self.tracks.len(),
        }
    }

    /// Whether `current_index` is `None` or addresses an existing track
    pub fn index_is_consistent(&self) -> bool {
        match self.current_index {
            None => true,
            Some(index) => index < self.tracks.len(),
        }
    }
}

/// Request to replace the active playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPlaylist {
    /// New tracks
    pub tracks: Vec<Track>,

    /// Index to start at
    pub start_index: usize,

    /// Display label
    pub name: String,

    /// Whether the existing list is discarded (otherwise tracks are appended)
    pub clear_existing: bool,

    /// Repeat mode to apply with the new list
    pub repeat: RepeatMode,
}

impl SetPlaylist {
    /// Replace the list, starting at `start_index`, repeat off
    pub fn new(tracks: Vec<Track>, start_index: usize, name: impl Into<String>) -> Self {
        Self {
            tracks,
            start_index,
            name: name.into(),
            clear_existing: true,
            repeat: RepeatMode::Off,
        }
    }

    /// Builder-style repeat setter
    #[must_use]
    pub fn with_repeat(mut self, repeat: RepeatMode) -> Self {
        self.repeat = repeat;
        self
    }

    /// Builder-style setter for appending instead of replacing
    #[must_use]
    pub fn appending(mut self) -> Self {
        self.clear_existing = false;
        self
    }
}

mod wire_index {
    use super::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(index: &Option<usize>, s: S) -> Result<S::Ok, S::Error> {
        match index {
            Some(i) => s.serialize_i64(*i as i64),
            None => s.serialize_i64(-1),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<usize>, D::Error> {
        let raw = i64::deserialize(d)?;
        Ok(usize::try_from(raw).ok())
    }
}
