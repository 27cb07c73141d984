//! Playback engine configuration
use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PlaybackConfig {
    /// Attempts per candidate URL before moving to the next one
    #[serde(default = "default_max_retries_per_url")]
    pub max_retries_per_url: u32,

    /// Fixed wait between attempts on the same URL
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Delay between a terminal track failure and auto-advance
    #[serde(default = "default_failure_grace_ms")]
    pub failure_grace_ms: u64,

    /// Rate of the progress poll fallback
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Volume applied when the device is initialized (0.0 - 1.0)
    #[serde(default = "default_initial_volume")]
    pub initial_volume: f32,

    /// Capacity of the engine command queue
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,

    #[serde(default)]
    pub radio: RadioSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RadioSettings {
    /// Top up when fewer than this many tracks follow the current one
    #[serde(default = "default_low_water_mark")]
    pub low_water_mark: usize,

    /// Top up every time this many tracks have been consumed
    #[serde(default = "default_refill_every")]
    pub refill_every: usize,
}

impl PlaybackConfig {
    /// Load configuration from an optional TOML file and `LARK_*` environment variables
    ///
    /// Nested keys use a double underscore, e.g. `LARK_RADIO__LOW_WATER_MARK=3`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            if path.exists() {
                settings = settings.add_source(config::File::from(path));
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("LARK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings
            .build()
            .map_err(|e| PlaybackError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| PlaybackError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_retries_per_url == 0 {
            return Err(PlaybackError::Config(
                "max_retries_per_url must be at least 1".to_string(),
            ));
        }

        if self.progress_interval_ms == 0 {
            return Err(PlaybackError::Config(
                "progress_interval_ms must be greater than zero".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(PlaybackError::Config(format!(
                "initial_volume {} is outside 0.0..=1.0",
                self.initial_volume
            )));
        }

        if self.radio.refill_every == 0 {
            return Err(PlaybackError::Config(
                "radio.refill_every must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn failure_grace(&self) -> Duration {
        Duration::from_millis(self.failure_grace_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

// Default values
fn default_max_retries_per_url() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1_000
}

fn default_failure_grace_ms() -> u64 {
    8_000
}

fn default_progress_interval_ms() -> u64 {
    500
}

fn default_initial_volume() -> f32 {
    1.0
}

fn default_command_buffer() -> usize {
    64
}

fn default_low_water_mark() -> usize {
    2
}

fn default_refill_every() -> usize {
    4
}

impl Default for RadioSettings {
    fn default() -> Self {
        Self {
            low_water_mark: default_low_water_mark(),
            refill_every: default_refill_every(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            max_retries_per_url: default_max_retries_per_url(),
            retry_backoff_ms: default_retry_backoff_ms(),
            failure_grace_ms: default_failure_grace_ms(),
            progress_interval_ms: default_progress_interval_ms(),
            initial_volume: default_initial_volume(),
            command_buffer: default_command_buffer(),
            radio: RadioSettings::default(),
        }
    }
}
