//! Shared fakes for engine integration tests

use async_trait::async_trait;
use lark_core::{
    FeedBatch, FeedContext, FeedService, LarkError, PlayHistorySink, PlaylistState, PlaylistStore,
    RepeatMode, SetPlaylist, StreamResolution, StreamResolver, Track, TrackId,
};
use lark_playback::{
    AudioBackend, Collaborators, DeviceEvent, DeviceEventSink, MemoryPlaylistStore,
    PlaybackConfig, PlaybackDevice, PlaybackEngine, PlaybackError, PlaybackEvent,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ===== Audio backend =====

#[derive(Debug, Default)]
pub struct BackendLog {
    pub played: Vec<String>,
    /// `attach <url>` and `detach` in call order
    pub timeline: Vec<String>,
    pub paused: usize,
    pub resumed: usize,
    pub sink: Option<DeviceEventSink>,
    /// How long a play call takes to settle
    pub play_delay: Option<Duration>,
}

/// Plays URLs starting with `ok:` and rejects everything else
#[derive(Debug, Default, Clone)]
pub struct FakeBackend {
    pub log: Arc<Mutex<BackendLog>>,
}

#[async_trait]
impl AudioBackend for FakeBackend {
    async fn play(&mut self, url: &str, events: DeviceEventSink) -> lark_playback::Result<()> {
        let delay = {
            let mut log = self.log.lock().unwrap();
            log.played.push(url.to_string());
            log.timeline.push(format!("attach {url}"));
            log.sink = Some(events);
            log.play_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if url.starts_with("ok:") {
            Ok(())
        } else {
            Err(PlaybackError::device(format!("cannot open {url}")))
        }
    }

    fn detach(&mut self) {
        self.log.lock().unwrap().timeline.push("detach".to_string());
    }

    fn pause(&mut self) {
        self.log.lock().unwrap().paused += 1;
    }

    fn resume(&mut self) {
        self.log.lock().unwrap().resumed += 1;
    }

    fn seek(&mut self, _position: Duration) {}

    fn set_volume(&mut self, _gain: f32) {}
}

// ===== Stream resolver =====

/// Resolves `id` to `ok:id` unless a route says otherwise
#[derive(Default)]
pub struct FakeResolver {
    routes: Mutex<HashMap<String, StreamResolution>>,
    pub calls: AtomicUsize,
    pub unreachable: AtomicBool,
}

impl FakeResolver {
    pub fn route(&self, id: &str, resolution: StreamResolution) {
        self.routes
            .lock()
            .unwrap()
            .insert(id.to_string(), resolution);
    }
}

#[async_trait]
impl StreamResolver for FakeResolver {
    async fn resolve_stream_urls(&self, id: &TrackId) -> lark_core::Result<StreamResolution> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(LarkError::resolver("catalog unreachable"));
        }
        let routed = self.routes.lock().unwrap().get(id.as_str()).cloned();
        Ok(routed.unwrap_or_else(|| StreamResolution::found([format!("ok:{id}")])))
    }
}

// ===== Playlist store =====

/// Memory store that counts round-trips and can be switched offline
pub struct CountingStore {
    inner: MemoryPlaylistStore,
    pub mutations: AtomicUsize,
    pub offline: AtomicBool,
}

impl Default for CountingStore {
    fn default() -> Self {
        Self {
            inner: MemoryPlaylistStore::with_seed(7),
            mutations: AtomicUsize::new(0),
            offline: AtomicBool::new(false),
        }
    }
}

impl CountingStore {
    pub fn snapshot(&self) -> PlaylistState {
        self.inner.snapshot()
    }

    fn check(&self) -> lark_core::Result<()> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(LarkError::store("store offline"));
        }
        Ok(())
    }
}

#[async_trait]
impl PlaylistStore for CountingStore {
    async fn get_playlist(&self) -> lark_core::Result<PlaylistState> {
        self.inner.get_playlist().await
    }

    async fn set_playlist(&self, request: SetPlaylist) -> lark_core::Result<PlaylistState> {
        self.check()?;
        self.inner.set_playlist(request).await
    }

    async fn add_track(&self, track: Track, insert_front: bool) -> lark_core::Result<PlaylistState> {
        self.check()?;
        self.inner.add_track(track, insert_front).await
    }

    async fn advance_next(&self) -> lark_core::Result<PlaylistState> {
        self.check()?;
        self.inner.advance_next().await
    }

    async fn advance_previous(&self) -> lark_core::Result<PlaylistState> {
        self.check()?;
        self.inner.advance_previous().await
    }

    async fn set_index(&self, index: usize) -> lark_core::Result<PlaylistState> {
        self.check()?;
        self.inner.set_index(index).await
    }

    async fn set_mode(&self, shuffle: bool, repeat: RepeatMode) -> lark_core::Result<PlaylistState> {
        self.check()?;
        self.inner.set_mode(shuffle, repeat).await
    }

    async fn clear(&self) -> lark_core::Result<PlaylistState> {
        self.check()?;
        self.inner.clear().await
    }
}

// ===== History and feed =====

#[derive(Default)]
pub struct RecordingHistory {
    pub plays: Mutex<Vec<String>>,
    pub rejecting: AtomicBool,
}

#[async_trait]
impl PlayHistorySink for RecordingHistory {
    async fn record_play(&self, track: &Track) -> lark_core::Result<()> {
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(LarkError::history(format!("quota exceeded for {}", track.id)));
        }
        self.plays.lock().unwrap().push(track.id.to_string());
        Ok(())
    }
}

/// Returns `batch_size` fresh tracks after `delay`
pub struct FakeFeed {
    pub delay: Duration,
    pub batch_size: usize,
    pub contexts: Mutex<Vec<FeedContext>>,
}

impl Default for FakeFeed {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            batch_size: 3,
            contexts: Mutex::new(Vec::new()),
        }
    }
}

impl FakeFeed {
    pub fn calls(&self) -> usize {
        self.contexts.lock().unwrap().len()
    }
}

#[async_trait]
impl FeedService for FakeFeed {
    async fn fetch_more(&self, context: &FeedContext) -> lark_core::Result<FeedBatch> {
        let batch_number = {
            let mut contexts = self.contexts.lock().unwrap();
            contexts.push(context.clone());
            contexts.len()
        };
        tokio::time::sleep(self.delay).await;

        let tracks = (1..=self.batch_size)
            .map(|i| Track::new(format!("r{batch_number}-{i}"), format!("Radio {i}")))
            .collect();
        Ok(FeedBatch::of(tracks))
    }
}

// ===== Event capture =====

#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<PlaybackEvent>>>,
}

impl EventLog {
    pub fn attach(engine: &PlaybackEngine) -> Self {
        let log = Self::default();
        let events = Arc::clone(&log.events);
        engine
            .subscribe(move |event| events.lock().unwrap().push(event.clone()))
            .detach();
        log
    }

    pub fn all(&self) -> Vec<PlaybackEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn track_changes(&self) -> Vec<String> {
        self.all()
            .into_iter()
            .filter_map(|event| match event {
                PlaybackEvent::TrackChanged { track } => Some(track.id.to_string()),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.all()
            .into_iter()
            .filter_map(|event| match event {
                PlaybackEvent::Error { message } => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn play_states(&self) -> Vec<bool> {
        self.all()
            .into_iter()
            .filter_map(|event| match event {
                PlaybackEvent::PlayStateChanged { is_playing } => Some(is_playing),
                _ => None,
            })
            .collect()
    }
}

// ===== Harness =====

pub struct Harness {
    pub engine: PlaybackEngine,
    pub backend: FakeBackend,
    pub resolver: Arc<FakeResolver>,
    pub store: Arc<CountingStore>,
    pub history: Arc<RecordingHistory>,
    pub feed: Arc<FakeFeed>,
    pub events: EventLog,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(PlaybackConfig::default())
    }

    pub fn with_config(config: PlaybackConfig) -> Self {
        let backend = FakeBackend::default();
        let mut device = PlaybackDevice::new();
        device.initialize(Box::new(backend.clone()));

        let resolver = Arc::new(FakeResolver::default());
        let store = Arc::new(CountingStore::default());
        let history = Arc::new(RecordingHistory::default());
        let feed = Arc::new(FakeFeed::default());

        let collaborators = Collaborators::new(resolver.clone(), store.clone())
            .with_history(history.clone())
            .with_feed(feed.clone());
        let engine = PlaybackEngine::spawn(config, device, collaborators);
        let events = EventLog::attach(&engine);

        Self {
            engine,
            backend,
            resolver,
            store,
            history,
            feed,
            events,
        }
    }

    /// Replace the playlist with `ids`, starting at the first track
    pub async fn load(&self, ids: &[&str]) {
        assert!(
            self.engine
                .set_playlist(SetPlaylist::new(tracks(ids), 0, "Test"))
                .await
        );
    }

    pub fn played(&self) -> Vec<String> {
        self.backend.log.lock().unwrap().played.clone()
    }

    /// Report a device event for the most recently attached source
    pub fn device_event(&self, event: DeviceEvent) -> bool {
        let sink = self.backend.log.lock().unwrap().sink.clone();
        sink.is_some_and(|sink| sink.emit(event))
    }

    pub fn recorded_plays(&self) -> Vec<String> {
        self.history.plays.lock().unwrap().clone()
    }
}

pub fn tracks(ids: &[&str]) -> Vec<Track> {
    ids.iter()
        .map(|id| Track::new(*id, format!("Title {id}")).with_duration(180))
        .collect()
}

/// Let spawned tasks run to quiescence on the paused clock
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
