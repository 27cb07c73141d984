//! Playback engine
//!
//! A single actor task owns the playlist state machine, the active playback
//! session and the failure grace timer. [`PlaybackEngine`] is a cheap,
//! cloneable handle that talks to it over a command channel.
//!
//! ```text
//!  handle ──Command──▶ actor ──spawn──▶ session task ──load──▶ device
//!                        ▲                   │                   │
//!                        └──── Internal ─────┴───── DeviceEvent ─┘
//! ```
//!
//! Session tasks, the grace timer and radio fetches report back through an
//! internal channel tagged with ids, so anything superseded is dropped on
//! arrival instead of mutating engine state.

use crate::config::PlaybackConfig;
use crate::device::{DeviceMonitor, PlaybackDevice, SourceState};
use crate::error::{PlaybackError, Result};
use crate::events::{DeviceEvent, EventEmitter, PlaybackEvent, Subscription};
use crate::playlist::PlaylistMachine;
use crate::radio::{RadioConfig, RadioFeed};
use crate::retry::RetryPolicy;
use crate::session::{PlaybackSession, SessionOutcome};
use crate::types::{EngineState, EngineStatus};
use lark_core::{
    FeedBatch, FeedService, PlayHistorySink, PlaylistState, PlaylistStore, RepeatMode, SetPlaylist,
    StreamResolver, Track,
};
use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// External services the engine depends on
#[derive(Clone)]
pub struct Collaborators {
    pub resolver: Arc<dyn StreamResolver>,
    pub store: Arc<dyn PlaylistStore>,
    pub history: Option<Arc<dyn PlayHistorySink>>,
    pub feed: Option<Arc<dyn FeedService>>,
}

impl Collaborators {
    pub fn new(resolver: Arc<dyn StreamResolver>, store: Arc<dyn PlaylistStore>) -> Self {
        Self {
            resolver,
            store,
            history: None,
            feed: None,
        }
    }

    pub fn with_history(mut self, history: Arc<dyn PlayHistorySink>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn with_feed(mut self, feed: Arc<dyn FeedService>) -> Self {
        self.feed = Some(feed);
        self
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("history", &self.history.is_some())
            .field("feed", &self.feed.is_some())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Navigation {
    Current,
    Next,
    Previous,
    Jump(usize),
}

enum Command {
    Navigate {
        target: Navigation,
        reply: oneshot::Sender<bool>,
    },
    Pause(oneshot::Sender<()>),
    Resume(oneshot::Sender<()>),
    Stop(oneshot::Sender<()>),
    Seek(Duration, oneshot::Sender<()>),
    SetVolume(f32, oneshot::Sender<()>),
    SetPlaylist(SetPlaylist, oneshot::Sender<bool>),
    AddTrack {
        track: Track,
        insert_front: bool,
        reply: oneshot::Sender<bool>,
    },
    SetMode {
        shuffle: bool,
        repeat: RepeatMode,
        reply: oneshot::Sender<bool>,
    },
    Clear(oneshot::Sender<bool>),
    OpenRadio(RadioConfig, oneshot::Sender<bool>),
    CloseRadio(oneshot::Sender<()>),
    State(oneshot::Sender<EngineState>),
    Playlist(oneshot::Sender<PlaylistState>),
    Lyrics(oneshot::Sender<Option<String>>),
    Shutdown(oneshot::Sender<()>),
}

impl Command {
    fn is_navigation(&self) -> bool {
        matches!(self, Self::Navigate { .. })
    }
}

enum SessionResult {
    NoCandidates,
    Finished {
        outcome: SessionOutcome,
        lyrics: Option<String>,
    },
}

enum Internal {
    SessionFinished { session: u64, result: SessionResult },
    GraceElapsed { timer: u64 },
    Device(DeviceEvent),
    FeedArrived {
        epoch: u64,
        result: lark_core::Result<FeedBatch>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AdvanceCause {
    Ended,
    Failed,
}

struct ActiveSession {
    id: u64,
    track: Track,
    handle: JoinHandle<()>,
}

/// Handle to a running playback engine
///
/// Clones share the same engine. The engine stops when [`shutdown`](Self::shutdown)
/// is called or every handle has been dropped.
#[derive(Clone)]
pub struct PlaybackEngine {
    commands: mpsc::Sender<Command>,
    events: EventEmitter<PlaybackEvent>,
}

impl PlaybackEngine {
    /// Start the engine task
    ///
    /// Must be called from within a Tokio runtime. The playlist is loaded
    /// from the store before the first command is handled.
    pub fn spawn(config: PlaybackConfig, mut device: PlaybackDevice, collaborators: Collaborators) -> Self {
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let events = EventEmitter::new();

        device.set_volume(config.initial_volume);
        let monitor = device.monitor();
        let device_tx = internal_tx.clone();
        let device_subscription = device.subscribe(move |event| {
            let _ = device_tx.send(Internal::Device(event.clone()));
        });

        let actor = EngineActor {
            policy: RetryPolicy::from(&config),
            volume: device.volume(),
            device: Arc::new(Mutex::new(device)),
            monitor,
            _device_subscription: device_subscription,
            playlist: PlaylistMachine::new(collaborators.store),
            resolver: collaborators.resolver,
            history: collaborators.history,
            feed: collaborators.feed,
            events: events.clone(),
            internal_tx,
            status: EngineStatus::Stopped,
            current: None,
            lyrics: None,
            session_seq: 0,
            active: None,
            grace_seq: 0,
            grace: None,
            radio: None,
            radio_epoch: 0,
            resume_after_refill: false,
            config,
        };

        tokio::spawn(actor.run(command_rx, internal_rx));

        Self {
            commands: command_tx,
            events,
        }
    }

    /// Play the playlist's current track
    pub async fn play(&self) -> bool {
        self.navigate(Navigation::Current).await
    }

    /// Jump to `index` and play it; `false` when out of range
    pub async fn jump(&self, index: usize) -> bool {
        self.navigate(Navigation::Jump(index)).await
    }

    /// Advance and play; `false` when there is no next track
    pub async fn play_next(&self) -> bool {
        self.navigate(Navigation::Next).await
    }

    /// Step back and play; `false` when there is no previous track
    pub async fn play_previous(&self) -> bool {
        self.navigate(Navigation::Previous).await
    }

    /// Pause; no-op unless playing
    pub async fn pause(&self) {
        let _ = self.request(Command::Pause).await;
    }

    /// Resume; no-op unless paused
    pub async fn resume(&self) {
        let _ = self.request(Command::Resume).await;
    }

    /// Stop playback and drop the active session
    pub async fn stop(&self) {
        let _ = self.request(Command::Stop).await;
    }

    pub async fn seek(&self, position: Duration) {
        let _ = self.request(|reply| Command::Seek(position, reply)).await;
    }

    /// Set volume, clamped to `[0.0, 1.0]`
    pub async fn set_volume(&self, level: f32) {
        let _ = self.request(|reply| Command::SetVolume(level, reply)).await;
    }

    /// Replace or extend the playlist; playback is not started
    pub async fn set_playlist(&self, request: SetPlaylist) -> bool {
        self.request(|reply| Command::SetPlaylist(request, reply))
            .await
            .unwrap_or(false)
    }

    pub async fn add_track(&self, track: Track, insert_front: bool) -> bool {
        self.request(|reply| Command::AddTrack {
            track,
            insert_front,
            reply,
        })
        .await
        .unwrap_or(false)
    }

    pub async fn set_mode(&self, shuffle: bool, repeat: RepeatMode) -> bool {
        self.request(|reply| Command::SetMode {
            shuffle,
            repeat,
            reply,
        })
        .await
        .unwrap_or(false)
    }

    /// Stop playback and empty the playlist
    pub async fn clear(&self) -> bool {
        self.request(Command::Clear).await.unwrap_or(false)
    }

    /// Treat the playlist as an unbounded feed and keep it topped up
    ///
    /// Returns `false` when no feed service was configured.
    pub async fn open_radio(&self, config: RadioConfig) -> bool {
        self.request(|reply| Command::OpenRadio(config, reply))
            .await
            .unwrap_or(false)
    }

    /// Stop topping up; batches still in flight are discarded
    pub async fn close_radio(&self) {
        let _ = self.request(Command::CloseRadio).await;
    }

    pub async fn state(&self) -> EngineState {
        self.request(Command::State).await.unwrap_or_default()
    }

    /// Last store-confirmed playlist
    pub async fn playlist(&self) -> PlaylistState {
        self.request(Command::Playlist).await.unwrap_or_default()
    }

    /// Lyrics returned by the resolver for the sounding track
    pub async fn lyrics(&self) -> Option<String> {
        self.request(Command::Lyrics).await.ok().flatten()
    }

    /// Stop playback and end the engine task
    pub async fn shutdown(&self) {
        let _ = self.request(Command::Shutdown).await;
    }

    /// Whether the engine task is still running
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Register a handler for every engine event
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&PlaybackEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(handler)
    }

    pub fn on_track_changed<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Track) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let PlaybackEvent::TrackChanged { track } = event {
                handler(track);
            }
        })
    }

    pub fn on_play_state_changed<F>(&self, handler: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let PlaybackEvent::PlayStateChanged { is_playing } = event {
                handler(*is_playing);
            }
        })
    }

    pub fn on_progress<F>(&self, handler: F) -> Subscription
    where
        F: Fn(Duration, Duration) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let PlaybackEvent::Progress {
                current_time,
                duration,
            } = event
            {
                handler(*current_time, *duration);
            }
        })
    }

    pub fn on_error<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let PlaybackEvent::Error { message } = event {
                handler(message);
            }
        })
    }

    async fn navigate(&self, target: Navigation) -> bool {
        self.request(|reply| Command::Navigate { target, reply })
            .await
            .unwrap_or(false)
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| PlaybackError::EngineClosed)?;
        response.await.map_err(|_| PlaybackError::EngineClosed)
    }
}

impl std::fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

struct EngineActor {
    config: PlaybackConfig,
    policy: RetryPolicy,
    device: Arc<Mutex<PlaybackDevice>>,
    monitor: DeviceMonitor,
    _device_subscription: Subscription,
    playlist: PlaylistMachine,
    resolver: Arc<dyn StreamResolver>,
    history: Option<Arc<dyn PlayHistorySink>>,
    feed: Option<Arc<dyn FeedService>>,
    events: EventEmitter<PlaybackEvent>,
    internal_tx: mpsc::UnboundedSender<Internal>,

    status: EngineStatus,
    volume: f32,
    /// Track whose metadata is shown; kept while a failure grace timer runs
    current: Option<Track>,
    lyrics: Option<String>,

    session_seq: u64,
    active: Option<ActiveSession>,
    grace_seq: u64,
    grace: Option<(u64, JoinHandle<()>)>,

    radio: Option<RadioFeed>,
    radio_epoch: u64,
    resume_after_refill: bool,
}

impl EngineActor {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
    ) {
        if let Err(e) = self.playlist.load().await {
            warn!(error = %e, "Initial playlist load failed");
        }

        let mut progress = tokio::time::interval(self.config.progress_interval());
        progress.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut backlog: VecDeque<Command> = VecDeque::new();

        loop {
            let command = match backlog.pop_front() {
                Some(command) => command,
                None => tokio::select! {
                    biased;
                    Some(message) = internal.recv() => {
                        self.handle_internal(message).await;
                        continue;
                    }
                    command = commands.recv() => match command {
                        Some(command) => command,
                        None => break,
                    },
                    _ = progress.tick() => {
                        self.poll_progress();
                        continue;
                    }
                },
            };

            // Only the latest queued navigation intent runs.
            if command.is_navigation() {
                while let Ok(queued) = commands.try_recv() {
                    backlog.push_back(queued);
                }
                if backlog.iter().any(Command::is_navigation) {
                    if let Command::Navigate { target, reply } = command {
                        debug!(?target, "Navigation superseded by a later request");
                        self.report(&PlaybackError::Superseded);
                        let _ = reply.send(false);
                    }
                    continue;
                }
            }

            if self.handle_command(command).await.is_break() {
                break;
            }
        }

        self.stop_playback().await;
        self.device.lock().await.destroy();
        info!("Playback engine stopped");
    }

    async fn handle_command(&mut self, command: Command) -> ControlFlow<()> {
        match command {
            Command::Navigate { target, reply } => {
                let started = self.navigate(target).await;
                let _ = reply.send(started);
            }
            Command::Pause(reply) => {
                if self.status == EngineStatus::Playing {
                    self.device.lock().await.pause();
                    self.set_status(EngineStatus::Paused);
                }
                let _ = reply.send(());
            }
            Command::Resume(reply) => {
                if self.status == EngineStatus::Paused {
                    self.device.lock().await.resume();
                    self.set_status(EngineStatus::Playing);
                }
                let _ = reply.send(());
            }
            Command::Stop(reply) => {
                self.stop_playback().await;
                let _ = reply.send(());
            }
            Command::Seek(position, reply) => {
                self.device.lock().await.seek(position);
                self.publish_progress();
                let _ = reply.send(());
            }
            Command::SetVolume(level, reply) => {
                let mut device = self.device.lock().await;
                device.set_volume(level);
                self.volume = device.volume();
                let _ = reply.send(());
            }
            Command::SetPlaylist(request, reply) => {
                self.cancel_grace();
                let result = self.playlist.set_playlist(request).await.map(|_| ());
                let applied = self.after_mutation(result);
                let moved = self.playlist.current_track().map(|t| &t.id)
                    != self.current.as_ref().map(|t| &t.id);
                if applied && moved {
                    // The sounding track is no longer the confirmed current one.
                    self.stop_playback().await;
                    self.current = None;
                    self.lyrics = None;
                }
                let _ = reply.send(applied);
            }
            Command::AddTrack {
                track,
                insert_front,
                reply,
            } => {
                let result = self.playlist.add_track(track, insert_front).await.map(|_| ());
                let _ = reply.send(self.after_mutation(result));
            }
            Command::SetMode {
                shuffle,
                repeat,
                reply,
            } => {
                let result = self.playlist.set_mode(shuffle, repeat).await.map(|_| ());
                let _ = reply.send(self.after_mutation(result));
            }
            Command::Clear(reply) => {
                let result = self.playlist.clear().await.map(|_| ());
                let cleared = self.after_mutation(result);
                if cleared {
                    self.stop_playback().await;
                    self.current = None;
                    self.lyrics = None;
                }
                let _ = reply.send(cleared);
            }
            Command::OpenRadio(config, reply) => {
                let _ = reply.send(self.open_radio(config));
            }
            Command::CloseRadio(reply) => {
                if self.radio.take().is_some() {
                    info!("Radio feed closed");
                }
                self.radio_epoch += 1;
                self.resume_after_refill = false;
                let _ = reply.send(());
            }
            Command::State(reply) => {
                let _ = reply.send(self.state());
            }
            Command::Playlist(reply) => {
                let _ = reply.send(self.playlist.state().clone());
            }
            Command::Lyrics(reply) => {
                let _ = reply.send(self.lyrics.clone());
            }
            Command::Shutdown(reply) => {
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn handle_internal(&mut self, message: Internal) {
        match message {
            Internal::SessionFinished { session, result } => {
                self.on_session_finished(session, result);
            }
            Internal::GraceElapsed { timer } => {
                if !matches!(self.grace, Some((id, _)) if id == timer) {
                    debug!(timer, "Ignoring cancelled grace timer");
                    return;
                }
                self.grace = None;
                info!("Failure grace period elapsed, advancing");
                self.advance_or_stop(AdvanceCause::Failed).await;
            }
            Internal::Device(event) => self.on_device_event(event).await,
            Internal::FeedArrived { epoch, result } => self.on_feed_arrived(epoch, result).await,
        }
    }

    async fn navigate(&mut self, target: Navigation) -> bool {
        let result = match target {
            Navigation::Current => Ok(self.playlist.current_track().cloned()),
            Navigation::Next => {
                let next = self.playlist.advance_next().await;
                if matches!(next, Ok(Some(_))) {
                    if let Some(radio) = self.radio.as_mut() {
                        radio.track_consumed(false);
                    }
                }
                next
            }
            Navigation::Previous => self.playlist.advance_previous().await,
            Navigation::Jump(index) => self.playlist.set_index(index).await.map(Some),
        };

        match result {
            Ok(Some(track)) => {
                if target != Navigation::Current {
                    self.publish_playlist();
                }
                self.start_session(track).await;
                self.maybe_refill();
                true
            }
            Ok(None) => {
                debug!(?target, "No track to navigate to");
                false
            }
            Err(e) => {
                self.report(&e);
                false
            }
        }
    }

    /// Begin attempting `track`, abandoning whatever was in progress
    async fn start_session(&mut self, track: Track) {
        self.cancel_session();
        self.cancel_grace();
        self.device.lock().await.stop();

        self.session_seq += 1;
        let id = self.session_seq;
        self.current = Some(track.clone());
        self.lyrics = None;
        self.set_status(EngineStatus::Loading);
        info!(session = id, track_id = %track.id, title = %track.title, "Loading track");

        let resolver = Arc::clone(&self.resolver);
        let device = Arc::clone(&self.device);
        let policy = self.policy;
        let tx = self.internal_tx.clone();
        let session_track = track.clone();

        let handle = tokio::spawn(async move {
            let result = match resolver.resolve_stream_urls(&session_track.id).await {
                Ok(resolution) => {
                    let lyrics = resolution.lyrics.clone();
                    let candidates = resolution.into_candidates();
                    if candidates.is_empty() {
                        SessionResult::NoCandidates
                    } else {
                        let session = PlaybackSession::new(id, session_track, candidates, policy);
                        SessionResult::Finished {
                            outcome: session.run(device).await,
                            lyrics,
                        }
                    }
                }
                Err(e) => {
                    warn!(session = id, error = %e, "Stream resolution failed");
                    SessionResult::NoCandidates
                }
            };
            let _ = tx.send(Internal::SessionFinished {
                session: id,
                result,
            });
        });

        self.active = Some(ActiveSession { id, track, handle });
    }

    fn on_session_finished(&mut self, session: u64, result: SessionResult) {
        if !matches!(&self.active, Some(active) if active.id == session) {
            debug!(session, "Dropping result of superseded session");
            return;
        }
        let Some(active) = self.active.take() else {
            return;
        };
        let track = active.track;

        match result {
            SessionResult::Finished {
                outcome: SessionOutcome::Succeeded { url, failures },
                lyrics,
            } => {
                info!(
                    session,
                    track_id = %track.id,
                    url = %url,
                    failed_attempts = failures.len(),
                    "Track playing"
                );
                self.lyrics = lyrics;
                self.current = Some(track.clone());
                self.set_status(EngineStatus::Playing);
                self.events.emit(&PlaybackEvent::TrackChanged {
                    track: track.clone(),
                });
                self.record_play(track);
            }
            SessionResult::Finished {
                outcome: SessionOutcome::Exhausted { failures },
                ..
            } => {
                let last = failures
                    .last()
                    .map(|failure| format!(", last: {}", failure.to_error()))
                    .unwrap_or_default();
                let error = PlaybackError::device(format!(
                    "all stream candidates failed for {} ({} attempts{last})",
                    track.display_name(),
                    failures.len()
                ));
                self.fail_track(&track, &error);
            }
            SessionResult::NoCandidates => {
                let error = PlaybackError::NoCandidates(track.display_name());
                self.fail_track(&track, &error);
            }
        }
    }

    async fn on_device_event(&mut self, event: DeviceEvent) {
        let settled = self.active.is_none()
            && matches!(self.status, EngineStatus::Playing | EngineStatus::Paused);

        match event {
            DeviceEvent::Ended if settled => {
                debug!("Track ended");
                self.advance_or_stop(AdvanceCause::Ended).await;
            }
            DeviceEvent::Error { reason } if settled => {
                self.device.lock().await.stop();
                if let Some(track) = self.current.clone() {
                    self.fail_track(&track, &PlaybackError::device(reason));
                }
            }
            DeviceEvent::TimeUpdate { current, duration } => {
                self.events.emit(&PlaybackEvent::Progress {
                    current_time: current,
                    duration,
                });
                self.maybe_refill();
            }
            // Started/Paused mirror transitions the engine already made.
            _ => {}
        }
    }

    /// Shared tail of natural end and terminal failure
    async fn advance_or_stop(&mut self, cause: AdvanceCause) {
        if cause == AdvanceCause::Ended && self.playlist.state().repeat == RepeatMode::One {
            if self.device.lock().await.restart() {
                debug!("Repeating current track");
                self.set_status(EngineStatus::Playing);
                if let Some(track) = self.current.clone() {
                    self.record_play(track);
                }
                return;
            }
        }

        match self.playlist.advance_next().await {
            Ok(Some(track)) => {
                if let Some(radio) = self.radio.as_mut() {
                    radio.track_consumed(cause == AdvanceCause::Ended);
                }
                self.publish_playlist();
                self.start_session(track).await;
            }
            Ok(None) => {
                debug!("End of playlist");
                if let Some(radio) = self.radio.as_mut() {
                    radio.track_consumed(cause == AdvanceCause::Ended);
                    self.resume_after_refill = true;
                }
                self.stop_playback().await;
            }
            Err(e) => {
                self.report(&e);
                self.stop_playback().await;
            }
        }

        self.maybe_refill();
    }

    fn fail_track(&mut self, track: &Track, error: &PlaybackError) {
        warn!(track_id = %track.id, error = %error, "Track failed");
        self.set_status(EngineStatus::Stopped);
        self.events.emit(&PlaybackEvent::Error {
            message: error.to_string(),
        });
        self.schedule_grace();
    }

    fn schedule_grace(&mut self) {
        self.cancel_grace();
        self.grace_seq += 1;
        let timer = self.grace_seq;
        let delay = self.config.failure_grace();
        let tx = self.internal_tx.clone();

        debug!(timer, ?delay, "Scheduling auto-advance");
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Internal::GraceElapsed { timer });
        });
        self.grace = Some((timer, handle));
    }

    fn cancel_grace(&mut self) {
        if let Some((timer, handle)) = self.grace.take() {
            handle.abort();
            debug!(timer, "Cancelled pending auto-advance");
        }
    }

    fn cancel_session(&mut self) {
        if let Some(active) = self.active.take() {
            active.handle.abort();
            debug!(session = active.id, track_id = %active.track.id, "Abandoned session");
        }
    }

    async fn stop_playback(&mut self) {
        self.cancel_session();
        self.cancel_grace();
        self.device.lock().await.stop();
        self.set_status(EngineStatus::Stopped);
    }

    fn open_radio(&mut self, config: RadioConfig) -> bool {
        if self.feed.is_none() {
            warn!("Radio requested without a feed service");
            return false;
        }

        info!(pool_id = %config.pool_id, mode = %config.mode, "Radio feed opened");
        self.radio_epoch += 1;
        self.resume_after_refill = false;
        self.radio = Some(RadioFeed::new(config, self.config.radio.clone()));
        self.maybe_refill();
        true
    }

    /// Start a feed fetch if the radio policy says one is due
    fn maybe_refill(&mut self) {
        let (Some(radio), Some(feed)) = (self.radio.as_mut(), self.feed.as_ref()) else {
            return;
        };

        let state = self.playlist.state();
        let last_track_id = state.tracks.last().map(|track| track.id.clone());
        let Some(context) = radio.begin_refill(state.remaining_after_current(), last_track_id) else {
            return;
        };

        let feed = Arc::clone(feed);
        let tx = self.internal_tx.clone();
        let epoch = self.radio_epoch;
        tokio::spawn(async move {
            let result = feed.fetch_more(&context).await;
            let _ = tx.send(Internal::FeedArrived { epoch, result });
        });
    }

    async fn on_feed_arrived(&mut self, epoch: u64, result: lark_core::Result<FeedBatch>) {
        if epoch != self.radio_epoch {
            debug!(epoch, "Dropping feed batch for a closed radio");
            return;
        }
        let Some(radio) = self.radio.as_mut() else {
            return;
        };
        radio.finish_refill();

        let tracks = match result {
            Ok(batch) if batch.success => batch.tracks,
            Ok(_) => {
                warn!("Feed service returned no batch");
                return;
            }
            Err(e) => {
                warn!(error = %e, "Feed fetch failed");
                return;
            }
        };

        let mut added = 0usize;
        for track in tracks {
            match self.playlist.add_track(track, false).await {
                Ok(_) => added += 1,
                Err(e) => {
                    self.report(&e);
                    break;
                }
            }
        }
        if added == 0 {
            return;
        }

        info!(added, "Radio feed topped up");
        self.publish_playlist();

        if self.resume_after_refill && self.status == EngineStatus::Stopped && self.grace.is_none() {
            self.resume_after_refill = false;
            match self.playlist.advance_next().await {
                Ok(Some(track)) => {
                    self.publish_playlist();
                    self.start_session(track).await;
                }
                Ok(None) => {}
                Err(e) => self.report(&e),
            }
        }
    }

    fn record_play(&self, track: Track) {
        let Some(history) = self.history.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = history.record_play(&track).await {
                warn!(track_id = %track.id, error = %e, "Failed to record play");
            }
        });
    }

    fn poll_progress(&mut self) {
        if self.status != EngineStatus::Playing {
            return;
        }
        self.publish_progress();
        self.maybe_refill();
    }

    fn publish_progress(&self) {
        let status = self.monitor.status();
        if matches!(status.state, SourceState::Empty | SourceState::Loading) {
            return;
        }
        self.events.emit(&PlaybackEvent::Progress {
            current_time: status.position,
            duration: status.duration,
        });
    }

    fn publish_playlist(&self) {
        self.events.emit(&PlaybackEvent::PlaylistChanged {
            state: self.playlist.state().clone(),
        });
    }

    /// Publish a confirmed mutation, or report why it was refused
    fn after_mutation(&mut self, result: Result<()>) -> bool {
        match result {
            Ok(()) => {
                self.publish_playlist();
                self.maybe_refill();
                true
            }
            Err(e) => {
                self.report(&e);
                false
            }
        }
    }

    /// Surface a failure to observers unless it is an expected no-op
    fn report(&self, error: &PlaybackError) {
        match error {
            e if e.is_benign() => debug!(error = %e, "Nothing to do"),
            PlaybackError::OutOfRange { index, len } => {
                debug!(index, len, "Navigation index out of range");
            }
            e => {
                warn!(error = %e, "Playback operation failed");
                self.events.emit(&PlaybackEvent::Error {
                    message: e.to_string(),
                });
            }
        }
    }

    fn set_status(&mut self, status: EngineStatus) {
        if self.status == status {
            return;
        }
        let was_playing = self.status.is_playing();
        self.status = status;
        debug!(?status, "Engine status changed");

        self.events.emit(&PlaybackEvent::StatusChanged { status });
        if was_playing != status.is_playing() {
            self.events.emit(&PlaybackEvent::PlayStateChanged {
                is_playing: status.is_playing(),
            });
        }
    }

    fn state(&self) -> EngineState {
        let device = self.monitor.status();
        EngineState {
            status: self.status,
            is_playing: self.status.is_playing(),
            current_time: device.position,
            duration: device.duration,
            volume: self.volume,
        }
    }
}
