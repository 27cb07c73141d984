//! Retry/fallback driver
//!
//! Bounded state machine over the candidate URLs of one track:
//!
//! ```text
//! Idle -> Attempting(i) -> Succeeded(i)
//!                       -> RetryingSameUrl(i, n)  (n < max, wait backoff, attempt i again)
//!                       -> AdvancingUrl(i + 1)    (n == max, attempt next URL at once)
//!                       -> ExhaustedAllUrls       (no URL left)
//! ```
//!
//! The driver never performs I/O. The caller asks for the next step,
//! performs it, and reports the result. Each URL gets at most
//! `max_retries_per_url` attempts and the list is walked once, so every
//! session terminates after at most `len * max_retries_per_url` attempts.

use crate::config::PlaybackConfig;
use crate::error::PlaybackError;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-track retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per URL before advancing
    pub max_retries_per_url: u32,

    /// Wait before re-attempting the same URL
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&PlaybackConfig::default())
    }
}

impl From<&PlaybackConfig> for RetryPolicy {
    fn from(config: &PlaybackConfig) -> Self {
        Self {
            max_retries_per_url: config.max_retries_per_url.max(1),
            backoff: config.retry_backoff(),
        }
    }
}

/// Driver state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Attempting { url_index: usize },
    RetryingSameUrl { url_index: usize, failures: u32 },
    AdvancingUrl { url_index: usize },
    Succeeded { url_index: usize },
    ExhaustedAllUrls,
}

impl DriverState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::ExhaustedAllUrls)
    }
}

/// What the caller should do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverStep {
    /// Wait `delay`, then load `url` on the device and report the result
    Attempt {
        url_index: usize,
        url: String,
        delay: Duration,
    },
    /// The device confirmed playback of `url`
    Succeeded { url: String },
    /// Every candidate failed
    Exhausted,
}

/// Why one attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Rejected before reaching the device
    InvalidUrl,
    /// Device reported a failure
    Device(String),
}

/// One failed attempt, kept for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub url_index: usize,
    pub url: String,
    pub kind: FailureKind,
}

impl AttemptFailure {
    /// The failure as a playback error
    pub fn to_error(&self) -> PlaybackError {
        match &self.kind {
            FailureKind::InvalidUrl => PlaybackError::InvalidUrl(self.url.clone()),
            FailureKind::Device(reason) => PlaybackError::device(reason.clone()),
        }
    }
}

/// Retry state machine for one track
#[derive(Debug, Clone)]
pub struct RetryDriver {
    candidates: Vec<String>,
    policy: RetryPolicy,
    state: DriverState,
    cursor: usize,
    failures_on_url: u32,
    device_attempts: usize,
    failures: Vec<AttemptFailure>,
}

impl RetryDriver {
    pub fn new(candidates: Vec<String>, policy: RetryPolicy) -> Self {
        Self {
            candidates,
            policy,
            state: DriverState::Idle,
            cursor: 0,
            failures_on_url: 0,
            device_attempts: 0,
            failures: Vec::new(),
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Index of the URL being (or about to be) attempted
    pub fn url_cursor(&self) -> usize {
        self.cursor
    }

    /// Failures recorded against the current URL
    pub fn retry_count(&self) -> u32 {
        self.failures_on_url
    }

    /// Attempts that reached the device
    pub fn device_attempts(&self) -> usize {
        self.device_attempts
    }

    /// Every failure so far, oldest first
    pub fn failures(&self) -> &[AttemptFailure] {
        &self.failures
    }

    /// Decide the next step
    ///
    /// Calling this again while an attempt is outstanding returns the same
    /// attempt without counting it twice.
    pub fn next_step(&mut self) -> DriverStep {
        match self.state {
            DriverState::Succeeded { url_index } => DriverStep::Succeeded {
                url: self.candidates[url_index].clone(),
            },
            DriverState::ExhaustedAllUrls => DriverStep::Exhausted,
            DriverState::Attempting { url_index } => DriverStep::Attempt {
                url_index,
                url: self.candidates[url_index].clone(),
                delay: Duration::ZERO,
            },
            DriverState::Idle
            | DriverState::AdvancingUrl { .. }
            | DriverState::RetryingSameUrl { .. } => self.prepare_attempt(),
        }
    }

    /// The device confirmed playback for the outstanding attempt
    pub fn record_success(&mut self) {
        if let DriverState::Attempting { url_index } = self.state {
            debug!(url_index, attempts = self.device_attempts, "Stream attempt succeeded");
            self.state = DriverState::Succeeded { url_index };
        }
    }

    /// The outstanding attempt failed
    pub fn record_failure(&mut self, reason: impl Into<String>) {
        if let DriverState::Attempting { url_index } = self.state {
            let reason = reason.into();
            debug!(url_index, reason = %reason, "Stream attempt failed");
            self.fail_slot(url_index, FailureKind::Device(reason));
        }
    }

    fn prepare_attempt(&mut self) -> DriverStep {
        let retrying = matches!(self.state, DriverState::RetryingSameUrl { .. });

        loop {
            let Some(url) = self.candidates.get(self.cursor) else {
                if !self.candidates.is_empty() {
                    warn!(
                        candidates = self.candidates.len(),
                        failures = self.failures.len(),
                        "All stream candidates exhausted"
                    );
                }
                self.state = DriverState::ExhaustedAllUrls;
                return DriverStep::Exhausted;
            };

            if is_playable_url(url) {
                let url = url.clone();
                let url_index = self.cursor;
                self.state = DriverState::Attempting { url_index };
                self.device_attempts += 1;
                return DriverStep::Attempt {
                    url_index,
                    url,
                    delay: if retrying {
                        self.policy.backoff
                    } else {
                        Duration::ZERO
                    },
                };
            }

            // Unplayable candidates burn their whole slot without touching the device.
            warn!(url_index = self.cursor, url = %url, "Skipping invalid stream URL");
            let url_index = self.cursor;
            while self.cursor == url_index {
                self.fail_slot(url_index, FailureKind::InvalidUrl);
            }
        }
    }

    fn fail_slot(&mut self, url_index: usize, kind: FailureKind) {
        self.failures.push(AttemptFailure {
            url_index,
            url: self.candidates[url_index].clone(),
            kind,
        });
        self.failures_on_url += 1;

        if self.failures_on_url < self.policy.max_retries_per_url {
            self.state = DriverState::RetryingSameUrl {
                url_index,
                failures: self.failures_on_url,
            };
        } else {
            self.failures_on_url = 0;
            self.cursor = url_index + 1;
            self.state = DriverState::AdvancingUrl {
                url_index: self.cursor,
            };
        }
    }
}

/// Whether `url` is worth handing to the device
///
/// Rejects blank strings, strings without a scheme, and placeholder forms
/// where the scheme is followed by nothing meaningful (`http://`, `http:///`,
/// `file:`).
pub fn is_playable_url(url: &str) -> bool {
    let url = url.trim();
    if url.is_empty() {
        return false;
    }

    let Some((scheme, rest)) = url.split_once(':') else {
        return false;
    };

    let scheme_ok = !scheme.is_empty()
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !scheme_ok {
        return false;
    }

    rest.trim_start_matches('/').chars().any(|c| !c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries_per_url: 3,
            backoff: Duration::from_secs(1),
        }
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_candidates_exhaust_without_attempts() {
        let mut driver = RetryDriver::new(Vec::new(), policy());
        assert_eq!(driver.next_step(), DriverStep::Exhausted);
        assert_eq!(driver.device_attempts(), 0);
        assert_eq!(driver.state(), DriverState::ExhaustedAllUrls);
    }

    #[test]
    fn first_attempt_has_no_delay_and_success_is_terminal() {
        let mut driver = RetryDriver::new(urls(&["http://a/1.mp3"]), policy());

        let step = driver.next_step();
        assert_eq!(
            step,
            DriverStep::Attempt {
                url_index: 0,
                url: "http://a/1.mp3".to_string(),
                delay: Duration::ZERO,
            }
        );

        driver.record_success();
        assert!(driver.state().is_terminal());
        assert_eq!(
            driver.next_step(),
            DriverStep::Succeeded {
                url: "http://a/1.mp3".to_string()
            }
        );
    }

    #[test]
    fn retries_same_url_with_backoff_then_advances() {
        let mut driver = RetryDriver::new(urls(&["http://a/1", "http://b/2"]), policy());

        for attempt in 0..3 {
            match driver.next_step() {
                DriverStep::Attempt { url_index, delay, .. } => {
                    assert_eq!(url_index, 0);
                    let expected = if attempt == 0 {
                        Duration::ZERO
                    } else {
                        Duration::from_secs(1)
                    };
                    assert_eq!(delay, expected);
                }
                other => panic!("unexpected step {other:?}"),
            }
            driver.record_failure("boom");
        }

        assert_eq!(driver.state(), DriverState::AdvancingUrl { url_index: 1 });
        match driver.next_step() {
            DriverStep::Attempt { url_index, delay, .. } => {
                assert_eq!(url_index, 1);
                assert_eq!(delay, Duration::ZERO);
            }
            other => panic!("unexpected step {other:?}"),
        }
    }

    #[test]
    fn exhausts_after_every_url_spends_its_budget() {
        let mut driver = RetryDriver::new(urls(&["http://a", "http://b"]), policy());

        loop {
            match driver.next_step() {
                DriverStep::Attempt { .. } => driver.record_failure("down"),
                DriverStep::Exhausted => break,
                DriverStep::Succeeded { .. } => panic!("nothing should succeed"),
            }
        }

        assert_eq!(driver.device_attempts(), 6);
        assert_eq!(driver.failures().len(), 6);
        assert_eq!(driver.next_step(), DriverStep::Exhausted);
    }

    #[test]
    fn invalid_urls_skip_the_device() {
        let mut driver =
            RetryDriver::new(urls(&["", "   ", "http://", "https://ok/3.mp3"]), policy());

        match driver.next_step() {
            DriverStep::Attempt { url_index, delay, .. } => {
                assert_eq!(url_index, 3);
                assert_eq!(delay, Duration::ZERO);
            }
            other => panic!("unexpected step {other:?}"),
        }

        assert_eq!(driver.device_attempts(), 1);
        assert_eq!(driver.failures().len(), 9);
        assert!(driver
            .failures()
            .iter()
            .all(|f| f.kind == FailureKind::InvalidUrl));
        assert!(matches!(
            driver.failures()[3].to_error(),
            PlaybackError::InvalidUrl(url) if url == "   "
        ));
    }

    #[test]
    fn retry_count_tracks_current_url() {
        let mut driver = RetryDriver::new(urls(&["http://a", "http://b"]), policy());
        driver.next_step();
        driver.record_failure("x");
        assert_eq!(driver.retry_count(), 1);
        assert_eq!(driver.url_cursor(), 0);

        driver.next_step();
        driver.record_failure("x");
        driver.next_step();
        driver.record_failure("x");
        assert_eq!(driver.retry_count(), 0);
        assert_eq!(driver.url_cursor(), 1);
    }

    #[test]
    fn repeated_next_step_does_not_double_count() {
        let mut driver = RetryDriver::new(urls(&["http://a"]), policy());
        driver.next_step();
        driver.next_step();
        assert_eq!(driver.device_attempts(), 1);
    }

    #[test]
    fn playable_url_rules() {
        assert!(is_playable_url("https://cdn.example.com/a.mp3"));
        assert!(is_playable_url("file:///music/a.flac"));
        assert!(is_playable_url("  http://host/x  "));

        assert!(!is_playable_url(""));
        assert!(!is_playable_url("   "));
        assert!(!is_playable_url("http://"));
        assert!(!is_playable_url("http:///"));
        assert!(!is_playable_url("file:"));
        assert!(!is_playable_url("no-scheme-here"));
        assert!(!is_playable_url("://host/a.mp3"));
    }
}
