//! Lark Core
//!
//! Domain types and collaborator contracts shared by the Lark playback core.
//!
//! This crate owns nothing that talks to the network or to audio hardware. It
//! defines what the playback engine consumes:
//! - **Domain Types**: `Track`, `PlaylistState`, `RepeatMode`, stream and feed payloads
//! - **Collaborator Traits**: `StreamResolver`, `PlaylistStore`, `PlayHistorySink`, `FeedService`
//! - **Navigation**: the next/previous index rules every store and engine must agree on
//! - **Error Handling**: unified `LarkError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use lark_core::{navigation, PlaylistState, RepeatMode, Track};
//!
//! let state = PlaylistState {
//!     tracks: vec![Track::new("a", "First"), Track::new("b", "Second")],
//!     current_index: Some(1),
//!     name: "Morning".to_string(),
//!     shuffle: false,
//!     repeat: RepeatMode::All,
//! };
//!
//! let mut rng = rand::thread_rng();
//! assert_eq!(navigation::next_index(&state, &mut rng), Some(0));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod navigation;
pub mod traits;
pub mod types;

pub use error::{LarkError, Result};
pub use traits::{FeedService, PlayHistorySink, PlaylistStore, StreamResolver};
pub use types::{
    FeedBatch, FeedContext, PlaylistState, RepeatMode, SetPlaylist, StreamResolution, Track,
    TrackId,
};
