//! Lark - Playback Engine
//!
//! Fault-tolerant playback orchestration for the Lark player.
//!
//! This crate provides:
//! - Playback device wrapper (single source, generation-tagged events)
//! - Bounded retry/fallback driver over candidate stream URLs
//! - Playlist state machine (store-confirmed mutations only)
//! - Playback engine actor (sessions, grace-period auto-advance, coalesced navigation)
//! - Continuous-feed ("radio") top-up policy
//! - Multi-subscriber event emitter
//!
//! # Architecture
//!
//! `lark-playback` does not decode audio and does not talk to the network
//! itself:
//! - Audio output comes from an [`AudioBackend`] implementation
//! - Stream URLs, playlist persistence, play history and radio batches come
//!   from the collaborator traits in `lark-core`
//!
//! # Example: Wiring an engine
//!
//! ```rust,no_run
//! use lark_playback::{
//!     AudioBackend, Collaborators, DeviceEventSink, MemoryPlaylistStore, PlaybackConfig,
//!     PlaybackDevice, PlaybackEngine, Result,
//! };
//! use lark_core::{SetPlaylist, StreamResolution, StreamResolver, Track, TrackId};
//! use async_trait::async_trait;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct Speaker;
//!
//! #[async_trait]
//! impl AudioBackend for Speaker {
//!     async fn play(&mut self, _url: &str, _events: DeviceEventSink) -> Result<()> {
//!         Ok(())
//!     }
//!     fn detach(&mut self) {}
//!     fn pause(&mut self) {}
//!     fn resume(&mut self) {}
//!     fn seek(&mut self, _position: Duration) {}
//!     fn set_volume(&mut self, _gain: f32) {}
//! }
//!
//! struct Resolver;
//!
//! #[async_trait]
//! impl StreamResolver for Resolver {
//!     async fn resolve_stream_urls(&self, id: &TrackId) -> lark_core::Result<StreamResolution> {
//!         Ok(StreamResolution::found([format!("https://cdn.example/{id}.mp3")]))
//!     }
//! }
//!
//! # async fn run() {
//! let mut device = PlaybackDevice::new();
//! device.initialize(Box::new(Speaker));
//!
//! let collaborators = Collaborators::new(Arc::new(Resolver), Arc::new(MemoryPlaylistStore::new()));
//! let engine = PlaybackEngine::spawn(PlaybackConfig::default(), device, collaborators);
//!
//! let _changes = engine.on_track_changed(|track| println!("Now playing {}", track.title));
//!
//! engine
//!     .set_playlist(SetPlaylist::new(vec![Track::new("t1", "Intro")], 0, "Morning"))
//!     .await;
//! engine.play().await;
//! # }
//! ```

mod backend;
mod config;
mod device;
mod engine;
mod error;
pub mod events;
mod playlist;
pub mod radio;
pub mod retry;
mod session;
mod store;
pub mod types;
mod volume;

// Public exports
pub use backend::AudioBackend;
pub use config::{PlaybackConfig, RadioSettings};
pub use device::{DeviceEventSink, DeviceMonitor, DeviceStatus, PlaybackDevice, SourceState};
pub use engine::{Collaborators, PlaybackEngine};
pub use error::{PlaybackError, Result};
pub use events::{DeviceEvent, EventEmitter, PlaybackEvent, Subscription};
pub use playlist::PlaylistMachine;
pub use radio::{RadioConfig, RadioFeed};
pub use retry::{is_playable_url, RetryDriver, RetryPolicy};
pub use session::{PlaybackSession, SessionOutcome};
pub use store::MemoryPlaylistStore;
pub use types::{EngineState, EngineStatus};
pub use volume::Volume;
