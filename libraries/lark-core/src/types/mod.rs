mod feed;
mod ids;
mod playlist;
mod stream;
mod track;

pub use feed::{FeedBatch, FeedContext};
pub use ids::TrackId;
pub use playlist::{PlaylistState, RepeatMode, SetPlaylist};
pub use stream::StreamResolution;
pub use track::Track;
