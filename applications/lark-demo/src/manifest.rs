//! Playlist manifest and the collaborators backed by it
//!
//! A manifest is a JSON file listing tracks and, per track, the candidate
//! stream URLs the resolver should hand out.

use async_trait::async_trait;
use lark_core::{
    FeedBatch, FeedContext, FeedService, LarkError, PlayHistorySink, StreamResolution,
    StreamResolver, Track, TrackId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Manifest {
    pub name: String,
    pub tracks: Vec<Track>,
    /// Candidate URLs keyed by track id
    pub streams: HashMap<String, Vec<String>>,
    /// Raw lyrics keyed by track id
    pub lyrics: HashMap<String, String>,
}

impl Manifest {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let manifest: Self = serde_json::from_str(&raw)?;
        if manifest.tracks.is_empty() {
            anyhow::bail!("manifest {} lists no tracks", path.display());
        }
        Ok(manifest)
    }
}

/// Resolves track ids from the manifest's `streams` table
pub struct ManifestResolver {
    streams: HashMap<String, Vec<String>>,
    lyrics: HashMap<String, String>,
}

impl ManifestResolver {
    pub fn new(manifest: &Manifest) -> Self {
        Self {
            streams: manifest.streams.clone(),
            lyrics: manifest.lyrics.clone(),
        }
    }
}

#[async_trait]
impl StreamResolver for ManifestResolver {
    async fn resolve_stream_urls(&self, id: &TrackId) -> lark_core::Result<StreamResolution> {
        let key = source_id(id);
        let Some(urls) = self.streams.get(key) else {
            return Ok(StreamResolution::failed());
        };

        let mut resolution = StreamResolution::found(urls.iter().cloned());
        resolution.lyrics = self.lyrics.get(key).cloned();
        Ok(resolution)
    }
}

/// Logs plays instead of persisting them
pub struct LogHistory;

#[async_trait]
impl PlayHistorySink for LogHistory {
    async fn record_play(&self, track: &Track) -> lark_core::Result<()> {
        info!(track_id = %track.id, title = %track.title, "Play recorded");
        Ok(())
    }
}

/// Radio feed that cycles through the manifest's tracks under fresh ids
pub struct ManifestFeed {
    pool: Vec<Track>,
    served: AtomicUsize,
    batch_size: usize,
}

impl ManifestFeed {
    pub fn new(manifest: &Manifest, batch_size: usize) -> Self {
        Self {
            pool: manifest.tracks.clone(),
            served: AtomicUsize::new(0),
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait]
impl FeedService for ManifestFeed {
    async fn fetch_more(&self, context: &FeedContext) -> lark_core::Result<FeedBatch> {
        if self.pool.is_empty() {
            return Err(LarkError::feed("feed pool is empty"));
        }

        let start = self.served.fetch_add(self.batch_size, Ordering::SeqCst);
        let tracks = (start..start + self.batch_size)
            .map(|n| {
                let mut track = self.pool[n % self.pool.len()].clone();
                // Radio entries reuse the source track's streams under a new id.
                track.id = TrackId::new(format!("{}~{n}", track.id));
                track
            })
            .collect();

        info!(
            pool_id = %context.pool_id,
            over_played = context.over_played,
            batch = self.batch_size,
            "Serving radio batch"
        );
        Ok(FeedBatch::of(tracks))
    }
}

/// Strip the radio suffix so feed entries resolve like their source track
pub fn source_id(id: &TrackId) -> &str {
    id.as_str().split('~').next().unwrap_or_default()
}
