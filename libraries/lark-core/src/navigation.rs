//! Next/previous index rules
//!
//! Both the engine and any `PlaylistStore` implementation evaluate these
//! functions, so they must stay the single definition of navigation.
//!
//! Order of precedence:
//! 1. `RepeatMode::One` replays the current index
//! 2. Shuffle picks a uniformly random index, never the current one when
//!    more than one track exists
//! 3. Step forward (or backward) if possible
//! 4. `RepeatMode::All` wraps around
//! 5. Otherwise there is no next track

use crate::types::{PlaylistState, RepeatMode};
use rand::Rng;

/// Direction of a navigation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Towards the end of the list
    Next,
    /// Towards the start of the list
    Previous,
}

/// Index the list moves to on "next", or `None` when playback should stop
pub fn next_index<R: Rng + ?Sized>(state: &PlaylistState, rng: &mut R) -> Option<usize> {
    step(state, Direction::Next, rng)
}

/// Index the list moves to on "previous", or `None` when there is nothing before
pub fn previous_index<R: Rng + ?Sized>(state: &PlaylistState, rng: &mut R) -> Option<usize> {
    step(state, Direction::Previous, rng)
}

/// Compute a navigation step in either direction
pub fn step<R: Rng + ?Sized>(
    state: &PlaylistState,
    direction: Direction,
    rng: &mut R,
) -> Option<usize> {
    let len = state.tracks.len();
    let current = state.current_index.filter(|&i| i < len)?;

    if state.repeat == RepeatMode::One {
        return Some(current);
    }

    if state.shuffle {
        return Some(random_other(len, current, rng));
    }

    match direction {
        Direction::Next if current + 1 < len => Some(current + 1),
        Direction::Previous if current > 0 => Some(current - 1),
        _ if state.repeat == RepeatMode::All => match direction {
            Direction::Next => Some(0),
            Direction::Previous => Some(len - 1),
        },
        _ => None,
    }
}

/// Whether a "next" step would produce a track
///
/// Pure predicate: never consumes randomness.
pub fn has_next(state: &PlaylistState) -> bool {
    has_step(state, Direction::Next)
}

/// Whether a "previous" step would produce a track
pub fn has_previous(state: &PlaylistState) -> bool {
    has_step(state, Direction::Previous)
}

fn has_step(state: &PlaylistState, direction: Direction) -> bool {
    let len = state.tracks.len();
    let Some(current) = state.current_index.filter(|&i| i < len) else {
        return false;
    };

    if state.repeat != RepeatMode::Off || state.shuffle {
        return true;
    }

    match direction {
        Direction::Next => current + 1 < len,
        Direction::Previous => current > 0,
    }
}

/// Uniform pick in `[0, len)` that avoids `current` when `len > 1`
fn random_other<R: Rng + ?Sized>(len: usize, current: usize, rng: &mut R) -> usize {
    if len <= 1 {
        return 0;
    }

    // Draw from len - 1 slots and skip over the current one.
    let pick = rng.gen_range(0..len - 1);
    if pick >= current {
        pick + 1
    } else {
        pick
    }
}
