//! Continuous-feed ("radio") top-up policy
//!
//! Pure bookkeeping: decides when a further batch must be fetched and builds
//! the request context. The engine performs the fetch and appends the batch
//! through the playlist state machine.

use crate::config::RadioSettings;
use lark_core::{FeedContext, TrackId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Parameters identifying the feed a radio session draws from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RadioConfig {
    /// Pool the feed service draws tracks from
    pub pool_id: String,
    /// Feed mode label understood by the service
    pub mode: String,
}

impl RadioConfig {
    pub fn new(pool_id: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            pool_id: pool_id.into(),
            mode: mode.into(),
        }
    }
}

/// Refill state of one open feed
#[derive(Debug)]
pub struct RadioFeed {
    config: RadioConfig,
    settings: RadioSettings,
    consumed: usize,
    last_over_played: bool,
    in_flight: bool,
    last_fetch_at: Option<usize>,
}

impl RadioFeed {
    pub fn new(config: RadioConfig, settings: RadioSettings) -> Self {
        Self {
            config,
            settings,
            consumed: 0,
            last_over_played: false,
            in_flight: false,
            last_fetch_at: None,
        }
    }

    pub fn config(&self) -> &RadioConfig {
        &self.config
    }

    /// Tracks moved past since the feed was opened
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight
    }

    /// Count a track the listener moved past
    ///
    /// `over_played` is true when the track ran to its natural end.
    pub fn track_consumed(&mut self, over_played: bool) {
        self.consumed += 1;
        self.last_over_played = over_played;
    }

    /// Whether a refill is due with `remaining` tracks after the current one
    ///
    /// At most one fetch happens per consumed-count, and never while another
    /// fetch is outstanding.
    pub fn should_refill(&self, remaining: usize) -> bool {
        if self.in_flight || self.last_fetch_at == Some(self.consumed) {
            return false;
        }

        let running_low = remaining < self.settings.low_water_mark;
        let milestone = self.consumed > 0 && self.consumed % self.settings.refill_every == 0;
        running_low || milestone
    }

    /// Claim the in-flight slot and build the request, if a refill is due
    pub fn begin_refill(
        &mut self,
        remaining: usize,
        last_track_id: Option<TrackId>,
    ) -> Option<FeedContext> {
        if !self.should_refill(remaining) {
            return None;
        }

        self.in_flight = true;
        self.last_fetch_at = Some(self.consumed);
        debug!(
            remaining,
            consumed = self.consumed,
            pool_id = %self.config.pool_id,
            "Radio refill due"
        );

        Some(FeedContext {
            last_track_id,
            mode: self.config.mode.clone(),
            pool_id: self.config.pool_id.clone(),
            over_played: self.last_over_played,
        })
    }

    /// Release the in-flight slot
    pub fn finish_refill(&mut self) {
        self.in_flight = false;
    }
}
