//! Playlist state machine
//!
//! The only component allowed to change the ordered track list and its
//! cursor. Every mutation is a round-trip through the [`PlaylistStore`]; the
//! store's response replaces the cached state wholesale. Nothing is applied
//! locally before the store confirms it.

use crate::error::{PlaybackError, Result};
use lark_core::{navigation, LarkError, PlaylistState, PlaylistStore, RepeatMode, SetPlaylist, Track};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cached, store-confirmed view of the active playlist
pub struct PlaylistMachine {
    store: Arc<dyn PlaylistStore>,
    state: PlaylistState,
}

impl PlaylistMachine {
    /// Create a machine with an empty cache; call [`load`](Self::load) to sync
    pub fn new(store: Arc<dyn PlaylistStore>) -> Self {
        Self {
            store,
            state: PlaylistState::default(),
        }
    }

    /// Replace the cache with the store's current state
    pub async fn load(&mut self) -> Result<&PlaylistState> {
        let state = self.store.get_playlist().await.map_err(store_error)?;
        self.apply(state, "load")?;
        Ok(&self.state)
    }

    pub fn state(&self) -> &PlaylistState {
        &self.state
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.state.current_track()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.state.current_index
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Whether "next" would produce a track
    pub fn has_next(&self) -> bool {
        navigation::has_next(&self.state)
    }

    /// Whether "previous" would produce a track
    pub fn has_previous(&self) -> bool {
        navigation::has_previous(&self.state)
    }

    /// Replace (or extend) the list
    ///
    /// An empty track list is refused without contacting the store. Index
    /// validation is left to the store.
    pub async fn set_playlist(&mut self, request: SetPlaylist) -> Result<&PlaylistState> {
        if request.tracks.is_empty() {
            debug!("Refusing to set an empty playlist");
            return Err(PlaybackError::EmptyPlaylist);
        }

        let state = self
            .store
            .set_playlist(request)
            .await
            .map_err(store_error)?;
        self.apply(state, "set_playlist")?;
        Ok(&self.state)
    }

    /// Append a track, or insert it first
    pub async fn add_track(&mut self, track: Track, insert_front: bool) -> Result<&PlaylistState> {
        let state = self
            .store
            .add_track(track, insert_front)
            .await
            .map_err(store_error)?;
        self.apply(state, "add_track")?;
        Ok(&self.state)
    }

    /// Move to the next track
    ///
    /// Returns `Ok(None)` without contacting the store when navigation rules
    /// yield no next track.
    pub async fn advance_next(&mut self) -> Result<Option<Track>> {
        if !self.has_next() {
            return Ok(None);
        }

        let state = self.store.advance_next().await.map_err(store_error)?;
        self.apply(state, "advance_next")?;
        Ok(self.current_track().cloned())
    }

    /// Move to the previous track
    pub async fn advance_previous(&mut self) -> Result<Option<Track>> {
        if !self.has_previous() {
            return Ok(None);
        }

        let state = self.store.advance_previous().await.map_err(store_error)?;
        self.apply(state, "advance_previous")?;
        Ok(self.current_track().cloned())
    }

    /// Jump to `index`
    pub async fn set_index(&mut self, index: usize) -> Result<Track> {
        let len = self.state.len();
        if index >= len {
            return Err(PlaybackError::OutOfRange { index, len });
        }

        let state = self.store.set_index(index).await.map_err(store_error)?;
        self.apply(state, "set_index")?;
        self.current_track()
            .cloned()
            .ok_or(PlaybackError::OutOfRange { index, len })
    }

    /// Update shuffle and repeat flags; the index does not move
    pub async fn set_mode(&mut self, shuffle: bool, repeat: RepeatMode) -> Result<&PlaylistState> {
        let state = self
            .store
            .set_mode(shuffle, repeat)
            .await
            .map_err(store_error)?;
        self.apply(state, "set_mode")?;
        Ok(&self.state)
    }

    /// Remove every track
    pub async fn clear(&mut self) -> Result<&PlaylistState> {
        let state = self.store.clear().await.map_err(store_error)?;
        self.apply(state, "clear")?;
        Ok(&self.state)
    }

    fn apply(&mut self, state: PlaylistState, operation: &'static str) -> Result<()> {
        if !state.index_is_consistent() || (state.current_index.is_none() && !state.is_empty()) {
            warn!(
                operation,
                index = ?state.current_index,
                len = state.len(),
                "Store returned an inconsistent playlist, keeping cached state"
            );
            return Err(PlaybackError::StoreMutationFailed(LarkError::store(format!(
                "{operation} returned index {:?} for {} tracks",
                state.current_index,
                state.len()
            ))));
        }

        debug!(
            operation,
            index = ?state.current_index,
            len = state.len(),
            "Playlist state confirmed"
        );
        self.state = state;
        Ok(())
    }
}

impl std::fmt::Debug for PlaylistMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistMachine")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

fn store_error(error: LarkError) -> PlaybackError {
    match error {
        LarkError::OutOfRange { index, len } => PlaybackError::OutOfRange { index, len },
        LarkError::EmptyPlaylist => PlaybackError::EmptyPlaylist,
        other => {
            warn!(error = %other, "Playlist store round-trip failed");
            PlaybackError::StoreMutationFailed(other)
        }
    }
}
