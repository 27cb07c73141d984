//! Playback device
//!
//! Owns exactly one native audio output unit. Loading a new source always
//! detaches the previous one first, and every attached source gets a fresh
//! generation number so late events from a detached source are dropped.

use crate::backend::AudioBackend;
use crate::error::{PlaybackError, Result};
use crate::events::{DeviceEvent, EventEmitter, Subscription};
use crate::volume::Volume;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, trace};

/// What the device's current source is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceState {
    /// No source attached
    #[default]
    Empty,
    /// Source handed to the backend, play call not settled yet
    Loading,
    /// Source attached and sounding
    Playing,
    /// Source attached and paused
    Paused,
    /// Source played to its end
    Ended,
    /// Source failed after it started
    Failed,
}

impl SourceState {
    fn has_source(self) -> bool {
        !matches!(self, Self::Empty | Self::Loading)
    }
}

/// Point-in-time view of the device
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeviceStatus {
    pub state: SourceState,
    pub position: Duration,
    pub duration: Duration,
}

struct DeviceShared {
    generation: AtomicU64,
    status: Mutex<DeviceStatus>,
    events: EventEmitter<DeviceEvent>,
}

impl DeviceShared {
    fn status(&self) -> DeviceStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut DeviceStatus)) {
        f(&mut self.status.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

/// Handle a backend uses to report events for one attached source
#[derive(Clone)]
pub struct DeviceEventSink {
    shared: Arc<DeviceShared>,
    generation: u64,
}

impl DeviceEventSink {
    /// Report an event for the source this sink was created for
    ///
    /// Returns `false` (and drops the event) when that source has since been
    /// detached.
    pub fn emit(&self, event: DeviceEvent) -> bool {
        if self.shared.generation.load(Ordering::SeqCst) != self.generation {
            trace!(generation = self.generation, ?event, "Dropping event from detached source");
            return false;
        }

        self.shared.update(|status| match &event {
            DeviceEvent::Started => status.state = SourceState::Playing,
            DeviceEvent::Paused => status.state = SourceState::Paused,
            DeviceEvent::Ended => status.state = SourceState::Ended,
            DeviceEvent::Error { .. } => status.state = SourceState::Failed,
            DeviceEvent::TimeUpdate { current, duration } => {
                status.position = *current;
                status.duration = *duration;
            }
        });

        self.shared.events.emit(&event);
        true
    }
}

impl std::fmt::Debug for DeviceEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceEventSink")
            .field("generation", &self.generation)
            .finish()
    }
}

/// Read-only view of device status that does not need the device itself
#[derive(Clone)]
pub struct DeviceMonitor {
    shared: Arc<DeviceShared>,
}

impl DeviceMonitor {
    pub fn status(&self) -> DeviceStatus {
        self.shared.status()
    }

    /// Register a device event handler
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&DeviceEvent) + Send + Sync + 'static,
    {
        self.shared.events.subscribe(handler)
    }
}

/// Single-owner wrapper around a native audio backend
pub struct PlaybackDevice {
    backend: Option<Box<dyn AudioBackend>>,
    shared: Arc<DeviceShared>,
    volume: Volume,
    url: Option<String>,
}

impl PlaybackDevice {
    /// Create a device without a backend; call [`initialize`](Self::initialize) before use
    pub fn new() -> Self {
        Self {
            backend: None,
            shared: Arc::new(DeviceShared {
                generation: AtomicU64::new(0),
                status: Mutex::new(DeviceStatus::default()),
                events: EventEmitter::new(),
            }),
            volume: Volume::default(),
            url: None,
        }
    }

    /// Attach a backend, replacing (and detaching) any previous one
    pub fn initialize(&mut self, mut backend: Box<dyn AudioBackend>) {
        self.destroy();
        backend.set_volume(self.volume.gain());
        self.backend = Some(backend);
        debug!("Playback device initialized");
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.is_some()
    }

    /// Detach the source and drop the backend
    pub fn destroy(&mut self) {
        self.detach_source();
        if self.backend.take().is_some() {
            debug!("Playback device destroyed");
        }
    }

    /// Status view usable without holding the device
    pub fn monitor(&self) -> DeviceMonitor {
        DeviceMonitor {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Register a device event handler
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&DeviceEvent) + Send + Sync + 'static,
    {
        self.shared.events.subscribe(handler)
    }

    pub fn status(&self) -> DeviceStatus {
        self.shared.status()
    }

    pub fn is_playing(&self) -> bool {
        self.status().state == SourceState::Playing
    }

    /// URL of the attached source
    pub fn current_url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Attach `url` and start playback
    ///
    /// The previous source is fully detached first. Failures are returned to
    /// the caller rather than emitted as `Error` events.
    pub async fn load(&mut self, url: &str) -> Result<()> {
        if self.backend.is_none() {
            return Err(PlaybackError::NotInitialized);
        }

        self.detach_source();

        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let sink = DeviceEventSink {
            shared: Arc::clone(&self.shared),
            generation,
        };

        // Attached from here on, even if this future is dropped mid-play.
        self.url = Some(url.to_string());
        self.shared.update(|status| {
            *status = DeviceStatus {
                state: SourceState::Loading,
                ..DeviceStatus::default()
            };
        });

        let backend = self.backend.as_mut().ok_or(PlaybackError::NotInitialized)?;
        debug!(url = %url, generation, "Loading source");

        match backend.play(url, sink.clone()).await {
            Ok(()) => {
                self.shared.update(|status| {
                    *status = DeviceStatus {
                        state: SourceState::Playing,
                        ..DeviceStatus::default()
                    };
                });
                sink.emit(DeviceEvent::Started);
                Ok(())
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Source rejected");
                if let Some(backend) = self.backend.as_mut() {
                    backend.detach();
                }
                self.shared.generation.fetch_add(1, Ordering::SeqCst);
                self.shared.update(|status| *status = DeviceStatus::default());
                self.url = None;
                Err(e)
            }
        }
    }

    /// Pause if playing; no-op otherwise
    pub fn pause(&mut self) {
        if self.status().state != SourceState::Playing {
            return;
        }
        if let Some(backend) = self.backend.as_mut() {
            backend.pause();
            self.current_sink().emit(DeviceEvent::Paused);
        }
    }

    /// Resume if paused; no-op otherwise
    pub fn resume(&mut self) {
        if self.status().state != SourceState::Paused {
            return;
        }
        if let Some(backend) = self.backend.as_mut() {
            backend.resume();
            self.current_sink().emit(DeviceEvent::Started);
        }
    }

    /// Play the attached source again from the start
    ///
    /// Returns `false` when nothing is attached.
    pub fn restart(&mut self) -> bool {
        if !self.status().state.has_source() {
            return false;
        }
        let Some(backend) = self.backend.as_mut() else {
            return false;
        };

        backend.seek(Duration::ZERO);
        backend.resume();
        self.shared.update(|status| status.position = Duration::ZERO);
        self.current_sink().emit(DeviceEvent::Started);
        true
    }

    /// Detach the source; no-op if nothing is attached
    pub fn stop(&mut self) {
        self.detach_source();
    }

    /// Move within the attached source; ignored when nothing is attached
    pub fn seek(&mut self, position: Duration) {
        if !self.status().state.has_source() {
            return;
        }
        if let Some(backend) = self.backend.as_mut() {
            backend.seek(position);
            self.shared.update(|status| status.position = position);
        }
    }

    /// Set volume, clamped to `[0.0, 1.0]`
    pub fn set_volume(&mut self, level: f32) {
        self.volume.set_level(level);
        self.apply_volume();
    }

    pub fn volume(&self) -> f32 {
        self.volume.level()
    }

    pub fn set_muted(&mut self, muted: bool) {
        if muted {
            self.volume.mute();
        } else {
            self.volume.unmute();
        }
        self.apply_volume();
    }

    pub fn is_muted(&self) -> bool {
        self.volume.is_muted()
    }

    fn apply_volume(&mut self) {
        let gain = self.volume.gain();
        if let Some(backend) = self.backend.as_mut() {
            backend.set_volume(gain);
        }
    }

    fn current_sink(&self) -> DeviceEventSink {
        DeviceEventSink {
            shared: Arc::clone(&self.shared),
            generation: self.shared.generation.load(Ordering::SeqCst),
        }
    }

    fn detach_source(&mut self) {
        if self.status().state == SourceState::Empty && self.url.is_none() {
            return;
        }

        if let Some(backend) = self.backend.as_mut() {
            backend.detach();
        }
        // Invalidate sinks handed out for the old source.
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shared.update(|status| *status = DeviceStatus::default());
        self.url = None;
    }
}

impl Default for PlaybackDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PlaybackDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackDevice")
            .field("initialized", &self.backend.is_some())
            .field("url", &self.url)
            .field("status", &self.status())
            .field("volume", &self.volume)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    fn device() -> (PlaybackDevice, DummyBackend) {
        let backend = DummyBackend::default();
        let mut device = PlaybackDevice::new();
        device.initialize(Box::new(backend.clone()));
        (device, backend)
    }

    fn recorded(device: &PlaybackDevice) -> Arc<Mutex<Vec<DeviceEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        device
            .subscribe(move |e| sink.lock().unwrap().push(e.clone()))
            .detach();
        events
    }

    #[tokio::test]
    async fn load_before_initialize_fails() {
        let mut device = PlaybackDevice::new();
        assert!(matches!(
            device.load("ok:a").await,
            Err(PlaybackError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn successful_load_emits_started() {
        let (mut device, backend) = device();
        let events = recorded(&device);

        device.load("ok:a").await.unwrap();

        assert!(device.is_playing());
        assert_eq!(device.current_url(), Some("ok:a"));
        assert_eq!(*events.lock().unwrap(), vec![DeviceEvent::Started]);
        assert_eq!(backend.log.lock().unwrap().played, vec!["ok:a"]);
    }

    #[tokio::test]
    async fn rejected_load_leaves_device_empty() {
        let (mut device, _backend) = device();
        let events = recorded(&device);

        assert!(device.load("bad:a").await.is_err());

        assert_eq!(device.status().state, SourceState::Empty);
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn loading_detaches_previous_source_and_its_events() {
        let (mut device, backend) = device();
        device.load("ok:first").await.unwrap();
        let old_sink = backend.log.lock().unwrap().sink.clone().unwrap();

        device.load("ok:second").await.unwrap();
        let events = recorded(&device);

        assert!(backend.log.lock().unwrap().detached >= 1);
        assert!(!old_sink.emit(DeviceEvent::Ended));
        assert!(events.lock().unwrap().is_empty());
        assert!(device.is_playing());
    }

    #[tokio::test]
    async fn pause_and_resume_are_idempotent() {
        let (mut device, backend) = device();
        device.load("ok:a").await.unwrap();

        device.pause();
        device.pause();
        assert_eq!(device.status().state, SourceState::Paused);

        device.resume();
        device.resume();
        assert!(device.is_playing());

        let log = backend.log.lock().unwrap();
        assert_eq!(log.paused, 1);
        assert_eq!(log.resumed, 1);
    }

    #[tokio::test]
    async fn seek_without_source_is_ignored() {
        let (mut device, backend) = device();
        device.seek(Duration::from_secs(10));
        assert!(backend.log.lock().unwrap().seeks.is_empty());

        device.load("ok:a").await.unwrap();
        device.seek(Duration::from_secs(10));
        assert_eq!(device.status().position, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn backend_events_update_status() {
        let (mut device, backend) = device();
        device.load("ok:a").await.unwrap();
        let sink = backend.log.lock().unwrap().sink.clone().unwrap();

        sink.emit(DeviceEvent::TimeUpdate {
            current: Duration::from_secs(3),
            duration: Duration::from_secs(200),
        });
        assert_eq!(device.status().position, Duration::from_secs(3));
        assert_eq!(device.status().duration, Duration::from_secs(200));

        sink.emit(DeviceEvent::Ended);
        assert_eq!(device.status().state, SourceState::Ended);

        assert!(device.restart());
        assert!(device.is_playing());
        assert_eq!(device.status().position, Duration::ZERO);
    }

    #[tokio::test]
    async fn volume_is_clamped_and_forwarded() {
        let (mut device, backend) = device();
        device.set_volume(3.0);
        assert_eq!(device.volume(), 1.0);
        assert_eq!(backend.log.lock().unwrap().gain, 1.0);

        device.set_muted(true);
        assert_eq!(backend.log.lock().unwrap().gain, 0.0);
        assert_eq!(device.volume(), 1.0);
    }

    #[tokio::test]
    async fn stop_and_destroy() {
        let (mut device, backend) = device();
        device.load("ok:a").await.unwrap();

        device.stop();
        device.stop();
        assert_eq!(device.status().state, SourceState::Empty);
        assert_eq!(backend.log.lock().unwrap().detached, 1);

        device.destroy();
        assert!(!device.is_initialized());
        assert!(device.load("ok:b").await.is_err());
    }

    /// Backend whose play call never settles
    struct StallingBackend {
        detached: Arc<AtomicU64>,
    }

    #[async_trait::async_trait]
    impl AudioBackend for StallingBackend {
        async fn play(&mut self, _url: &str, _events: DeviceEventSink) -> Result<()> {
            std::future::pending().await
        }

        fn detach(&mut self) {
            self.detached.fetch_add(1, Ordering::SeqCst);
        }

        fn pause(&mut self) {}
        fn resume(&mut self) {}
        fn seek(&mut self, _position: Duration) {}
        fn set_volume(&mut self, _gain: f32) {}
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_load_is_still_detached() {
        let detached = Arc::new(AtomicU64::new(0));
        let mut device = PlaybackDevice::new();
        device.initialize(Box::new(StallingBackend {
            detached: Arc::clone(&detached),
        }));

        let load = tokio::time::timeout(Duration::from_millis(50), device.load("ok:slow")).await;
        assert!(load.is_err());
        assert_eq!(device.status().state, SourceState::Loading);

        device.stop();
        assert_eq!(detached.load(Ordering::SeqCst), 1);
        assert_eq!(device.status().state, SourceState::Empty);
        assert_eq!(device.current_url(), None);
    }
}
