//! Per-track playback session
//!
//! A session is created whenever the engine starts attempting a track and is
//! thrown away on success, terminal failure or stop. It is never reused for
//! another track.

use crate::device::PlaybackDevice;
use crate::retry::{AttemptFailure, DriverStep, RetryDriver, RetryPolicy};
use lark_core::Track;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Terminal result of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Device confirmed playback of `url`
    Succeeded {
        url: String,
        failures: Vec<AttemptFailure>,
    },
    /// Every candidate failed (or there were none)
    Exhausted { failures: Vec<AttemptFailure> },
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn failures(&self) -> &[AttemptFailure] {
        match self {
            Self::Succeeded { failures, .. } | Self::Exhausted { failures } => failures,
        }
    }
}

/// One attempt to get a track sounding
#[derive(Debug)]
pub struct PlaybackSession {
    id: u64,
    track: Track,
    driver: RetryDriver,
}

impl PlaybackSession {
    pub fn new(id: u64, track: Track, candidates: Vec<String>, policy: RetryPolicy) -> Self {
        Self {
            id,
            track,
            driver: RetryDriver::new(candidates, policy),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn candidate_urls(&self) -> &[String] {
        self.driver.candidates()
    }

    pub fn url_cursor(&self) -> usize {
        self.driver.url_cursor()
    }

    pub fn retry_count(&self) -> u32 {
        self.driver.retry_count()
    }

    /// Drive the device through the candidates until a terminal outcome
    ///
    /// The device lock is held only for the duration of each `load`, never
    /// across a backoff wait. Dropping the returned future abandons the
    /// session at its next suspension point.
    pub async fn run(mut self, device: Arc<Mutex<PlaybackDevice>>) -> SessionOutcome {
        loop {
            match self.driver.next_step() {
                DriverStep::Attempt {
                    url_index,
                    url,
                    delay,
                } => {
                    if !delay.is_zero() {
                        debug!(session = self.id, url_index, ?delay, "Backing off before retry");
                        tokio::time::sleep(delay).await;
                    }

                    debug!(
                        session = self.id,
                        track_id = %self.track.id,
                        url_index,
                        url = %url,
                        "Attempting stream"
                    );
                    let result = device.lock().await.load(&url).await;
                    match result {
                        Ok(()) => self.driver.record_success(),
                        Err(e) => self.driver.record_failure(e.to_string()),
                    }
                }
                DriverStep::Succeeded { url } => {
                    info!(
                        session = self.id,
                        track_id = %self.track.id,
                        url = %url,
                        "Stream playing"
                    );
                    return SessionOutcome::Succeeded {
                        url,
                        failures: self.driver.failures().to_vec(),
                    };
                }
                DriverStep::Exhausted => {
                    return SessionOutcome::Exhausted {
                        failures: self.driver.failures().to_vec(),
                    };
                }
            }
        }
    }
}
