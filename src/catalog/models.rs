//! Catalog data models.

use serde::{Deserialize, Serialize};

/// Audio feature vector for a track. Tempo is BPM, everything else is in
/// the 0.0..=1.0 domain.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub tempo: f32,
    pub energy: f32,
    pub danceability: f32,
    pub valence: f32,
    pub acousticness: f32,
}

/// A track as surfaced by the catalog during one pipeline run.
///
/// Transient: candidates exist only within a single synthesis; committed
/// playlists store track ids and signatures, not candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackCandidate {
    pub id: String,
    pub title: String,
    pub artists: Vec<String>,
    pub album_id: Option<String>,
    pub duration_ms: u32,
    pub explicit: bool,
    /// 0-100, catalog-defined.
    pub popularity: u8,
    pub features: AudioFeatures,
    pub release_year: Option<i32>,
    /// Genre hints from the catalog (artist-level tags), may be empty.
    pub genres: Vec<String>,
}

impl TrackCandidate {
    /// The primary (first-credited) artist, or empty string when unknown.
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map(String::as_str).unwrap_or("")
    }
}

/// A curated collection ("playlist") found via catalog search, used as a
/// harvesting source by the corpus-mining strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSummary {
    pub id: String,
    pub name: String,
    pub owner: Option<String>,
    pub track_count: u32,
}
