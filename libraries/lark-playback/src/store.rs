//! In-memory playlist store
//!
//! Authoritative store kept in process memory. Useful for offline mode, the
//! demo binary and tests; remote stores implement the same
//! [`PlaylistStore`] contract and the same [`navigation`] rules.

use async_trait::async_trait;
use lark_core::{
    navigation, LarkError, PlaylistState, PlaylistStore, RepeatMode, Result, SetPlaylist, Track,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Mutex, PoisonError};

struct Inner {
    state: PlaylistState,
    rng: StdRng,
}

/// Playlist store backed by a mutex-guarded `PlaylistState`
pub struct MemoryPlaylistStore {
    inner: Mutex<Inner>,
}

impl MemoryPlaylistStore {
    /// Empty store with an entropy-seeded shuffle
    pub fn new() -> Self {
        Self::from_parts(PlaylistState::default(), StdRng::from_entropy())
    }

    /// Empty store with a deterministic shuffle
    pub fn with_seed(seed: u64) -> Self {
        Self::from_parts(PlaylistState::default(), StdRng::seed_from_u64(seed))
    }

    /// Store pre-populated with `state`
    ///
    /// A dangling index is reset so the store never hands out an invalid state.
    pub fn with_state(mut state: PlaylistState) -> Self {
        if !state.index_is_consistent() || (state.current_index.is_none() && !state.is_empty()) {
            state.current_index = if state.is_empty() { None } else { Some(0) };
        }
        Self::from_parts(state, StdRng::from_entropy())
    }

    fn from_parts(state: PlaylistState, rng: StdRng) -> Self {
        Self {
            inner: Mutex::new(Inner { state, rng }),
        }
    }

    /// Copy of the stored state
    pub fn snapshot(&self) -> PlaylistState {
        self.lock().state.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn mutate<F>(&self, f: F) -> Result<PlaylistState>
    where
        F: FnOnce(&mut Inner) -> Result<()>,
    {
        let mut inner = self.lock();
        f(&mut inner)?;
        Ok(inner.state.clone())
    }
}

impl Default for MemoryPlaylistStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlaylistStore for MemoryPlaylistStore {
    async fn get_playlist(&self) -> Result<PlaylistState> {
        Ok(self.snapshot())
    }

    async fn set_playlist(&self, request: SetPlaylist) -> Result<PlaylistState> {
        if request.tracks.is_empty() {
            return Err(LarkError::EmptyPlaylist);
        }
        if request.start_index >= request.tracks.len() {
            return Err(LarkError::out_of_range(
                request.start_index,
                request.tracks.len(),
            ));
        }

        self.mutate(|inner| {
            let state = &mut inner.state;
            let offset = if request.clear_existing {
                state.tracks.clear();
                0
            } else {
                state.tracks.len()
            };

            state.tracks.extend(request.tracks);
            state.current_index = Some(offset + request.start_index);
            state.name = request.name;
            state.repeat = request.repeat;
            Ok(())
        })
    }

    async fn add_track(&self, track: Track, insert_front: bool) -> Result<PlaylistState> {
        self.mutate(|inner| {
            let state = &mut inner.state;
            if insert_front {
                state.tracks.insert(0, track);
                state.current_index = Some(state.current_index.map_or(0, |i| i + 1));
            } else {
                state.tracks.push(track);
                state.current_index = Some(state.current_index.unwrap_or(0));
            }
            Ok(())
        })
    }

    async fn advance_next(&self) -> Result<PlaylistState> {
        self.mutate(|inner| {
            if let Some(index) = navigation::next_index(&inner.state, &mut inner.rng) {
                inner.state.current_index = Some(index);
            }
            Ok(())
        })
    }

    async fn advance_previous(&self) -> Result<PlaylistState> {
        self.mutate(|inner| {
            if let Some(index) = navigation::previous_index(&inner.state, &mut inner.rng) {
                inner.state.current_index = Some(index);
            }
            Ok(())
        })
    }

    async fn set_index(&self, index: usize) -> Result<PlaylistState> {
        self.mutate(|inner| {
            let len = inner.state.tracks.len();
            if index >= len {
                return Err(LarkError::out_of_range(index, len));
            }
            inner.state.current_index = Some(index);
            Ok(())
        })
    }

    async fn set_mode(&self, shuffle: bool, repeat: RepeatMode) -> Result<PlaylistState> {
        self.mutate(|inner| {
            inner.state.shuffle = shuffle;
            inner.state.repeat = repeat;
            Ok(())
        })
    }

    async fn clear(&self) -> Result<PlaylistState> {
        self.mutate(|inner| {
            inner.state.tracks.clear();
            inner.state.current_index = None;
            inner.state.name.clear();
            Ok(())
        })
    }
}
