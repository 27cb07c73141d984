//! Native audio output abstraction
//!
//! Wraps whatever actually makes sound (an HTML media element behind a
//! webview bridge, a platform player, a test fake). Decoding and buffering
//! happen behind this trait.

use crate::device::DeviceEventSink;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

/// Single native audio output unit
///
/// The playback device guarantees `detach` is called before every new `play`,
/// so an implementation never holds two sources at once.
///
/// Implementations report asynchronous happenings (`Ended`, `Error`,
/// `TimeUpdate`) through the [`DeviceEventSink`] handed to `play`. Events sent
/// through a sink from an earlier `play` are discarded by the device.
#[async_trait]
pub trait AudioBackend: Send {
    /// Attach `url` as the source and start playback
    ///
    /// Resolves once the native play call settles.
    ///
    /// # Returns
    /// * `Ok(())` - Audio is playing
    /// * `Err(_)` - The play call was rejected (bad URL, network, codec)
    async fn play(&mut self, url: &str, events: DeviceEventSink) -> Result<()>;

    /// Detach the current source and release its resources
    fn detach(&mut self);

    /// Pause the current source
    fn pause(&mut self);

    /// Resume the current source
    fn resume(&mut self);

    /// Move to `position` within the current source
    fn seek(&mut self, position: Duration);

    /// Apply linear gain (0.0 - 1.0)
    fn set_volume(&mut self, gain: f32);
}

/// Backend for unit tests: accepts URLs starting with `ok:` and rejects the rest
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct DummyBackend {
    pub log: std::sync::Arc<std::sync::Mutex<DummyLog>>,
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct DummyLog {
    pub played: Vec<String>,
    pub detached: usize,
    pub paused: usize,
    pub resumed: usize,
    pub seeks: Vec<Duration>,
    pub gain: f32,
    pub sink: Option<DeviceEventSink>,
}

#[cfg(test)]
#[async_trait]
impl AudioBackend for DummyBackend {
    async fn play(&mut self, url: &str, events: DeviceEventSink) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        log.played.push(url.to_string());
        log.sink = Some(events);
        if url.starts_with("ok:") {
            Ok(())
        } else {
            Err(crate::error::PlaybackError::device(format!("rejected {url}")))
        }
    }

    fn detach(&mut self) {
        self.log.lock().unwrap().detached += 1;
    }

    fn pause(&mut self) {
        self.log.lock().unwrap().paused += 1;
    }

    fn resume(&mut self) {
        self.log.lock().unwrap().resumed += 1;
    }

    fn seek(&mut self, position: Duration) {
        self.log.lock().unwrap().seeks.push(position);
    }

    fn set_volume(&mut self, gain: f32) {
        self.log.lock().unwrap().gain = gain;
    }
}
