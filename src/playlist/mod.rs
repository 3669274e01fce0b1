//! Playlist records, track identity, refresh history and persistence.

mod history;
mod models;
mod schema;
mod signature;
mod store;

pub use history::{HistoryLedger, HISTORY_CAP};
pub use models::{
    Feedback, PlaylistRecord, TrackEntry, UpdateFrequency, UpdateMode,
};
pub use signature::{
    normalize_artist, normalize_title, title_has_version_marker, TrackSignature,
};
pub use store::{MemoryPlaylistStore, PlaylistStore, SqlitePlaylistStore};
