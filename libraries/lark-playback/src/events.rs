//! Playback Events
//!
//! Event-based communication between the playback device, the engine and
//! consumers (UI, lyrics view, tray). Events are emitted at key points:
//! - Device lifecycle (started/paused/ended/error/time)
//! - Track changes (once, when the device confirms playback)
//! - Engine state changes (loading/playing/paused/stopped)
//! - Position updates (periodic)
//!
//! Every emitter supports any number of subscribers. `subscribe` returns a
//! [`Subscription`] that removes the handler when disposed or dropped.

use crate::types::EngineStatus;
use lark_core::{PlaylistState, Track};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

/// Events emitted by the playback engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// Device confirmed playback of a new track
    TrackChanged {
        /// The track now sounding
        track: Track,
    },

    /// Audio started or stopped sounding
    PlayStateChanged {
        /// Whether audio is currently playing
        is_playing: bool,
    },

    /// Engine lifecycle state changed
    StatusChanged {
        /// The new engine state
        status: EngineStatus,
    },

    /// Position update (device driven, with a periodic poll fallback)
    Progress {
        /// Current playback position
        current_time: Duration,
        /// Total track duration (zero while unknown)
        duration: Duration,
    },

    /// The store confirmed a new playlist state
    PlaylistChanged {
        /// Confirmed state
        state: PlaylistState,
    },

    /// Something failed that the user should hear about
    Error {
        /// Error message
        message: String,
    },
}

/// Events emitted by a playback device
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// Playback started on a freshly loaded or restarted source
    Started,

    /// Playback paused
    Paused,

    /// Source played to its end
    Ended,

    /// Native playback failure
    Error {
        /// Reason reported by the backend
        reason: String,
    },

    /// Playback position advanced
    TimeUpdate {
        /// Current position
        current: Duration,
        /// Source duration (zero while unknown)
        duration: Duration,
    },
}

type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registry<E> {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(u64, Handler<E>)>>,
}

impl<E> Registry<E> {
    fn remove(&self, id: u64) {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(handler_id, _)| *handler_id != id);
    }
}

/// Multi-subscriber event emitter
///
/// Cloning yields another handle to the same subscriber list.
pub struct EventEmitter<E> {
    registry: Arc<Registry<E>>,
}

impl<E: 'static> EventEmitter<E> {
    /// Create an emitter without subscribers
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                next_id: AtomicU64::new(1),
                handlers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Register a handler
    ///
    /// The handler stays registered until the returned subscription is
    /// disposed or dropped.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let handler: Handler<E> = Arc::new(handler);
        self.registry
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, handler));

        let registry: Weak<Registry<E>> = Arc::downgrade(&self.registry);
        Subscription {
            dispose: Some(Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    registry.remove(id);
                }
            })),
        }
    }

    /// Deliver an event to every current subscriber
    ///
    /// Handlers run on the caller's thread, in subscription order. The list is
    /// snapshotted first, so a handler may subscribe or unsubscribe freely.
    pub fn emit(&self, event: &E) {
        let handlers: Vec<Handler<E>> = self
            .registry
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in handlers {
            handler(event);
        }
    }

    /// Number of registered handlers
    pub fn subscriber_count(&self) -> usize {
        self.registry
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl<E: 'static> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for EventEmitter<E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<E> std::fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter").finish_non_exhaustive()
    }
}

/// Disposer for a registered handler
#[must_use = "dropping a Subscription unsubscribes the handler"]
pub struct Subscription {
    dispose: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Remove the handler now
    pub fn dispose(mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }

    /// Keep the handler registered for the lifetime of the emitter
    pub fn detach(mut self) {
        self.dispose = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.dispose.is_some())
            .finish()
    }
}
