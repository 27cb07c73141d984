//! Stream resolution payloads
use serde::{Deserialize, Serialize};

/// Candidate stream URLs for one track, as returned by the resolver
///
/// `success == false` and an empty `urls` list are treated the same by the
/// playback engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamResolution {
    /// Whether the resolver considers the lookup successful
    pub success: bool,

    /// Candidate URLs in preference order
    pub urls: Vec<String>,

    /// Raw lyrics text, if the resolver returned any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lyrics: Option<String>,
}

impl StreamResolution {
    /// Successful resolution with the given candidates
    pub fn found<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            success: true,
            urls: urls.into_iter().map(Into::into).collect(),
            lyrics: None,
        }
    }

    /// Failed resolution
    pub fn failed() -> Self {
        Self::default()
    }

    /// Candidates usable for playback, empty when the lookup failed
    pub fn into_candidates(self) -> Vec<String> {
        if self.success {
            self.urls
        } else {
            Vec::new()
        }
    }
}
