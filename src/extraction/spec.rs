//! The structured constraint model derived from a user prompt.

use serde::{Deserialize, Serialize};

/// How strongly the user leans toward well-known versus obscure tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PopularityPreference {
    Mainstream,
    Underground,
    Balanced,
    #[default]
    Unset,
}

/// Requested era, either as a decade label ("90s", "1980s") or an explicit
/// year range. Both may be present; the explicit range wins.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Era {
    pub decade: Option<String>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

impl Era {
    /// Resolve to an inclusive year range, if the era is specified at all.
    pub fn year_bounds(&self) -> Option<(i32, i32)> {
        if let (Some(start), Some(end)) = (self.start_year, self.end_year) {
            return Some((start, end));
        }
        if let Some(start) = self.start_year {
            return Some((start, i32::MAX));
        }
        if let Some(end) = self.end_year {
            return Some((i32::MIN, end));
        }
        let decade = self.decade.as_deref()?;
        decade_bounds(decade)
    }

    pub fn is_unset(&self) -> bool {
        self.decade.is_none() && self.start_year.is_none() && self.end_year.is_none()
    }
}

/// Parse a decade label like "90s", "1990s" or "1990" into year bounds.
fn decade_bounds(label: &str) -> Option<(i32, i32)> {
    let digits: String = label.chars().filter(|c| c.is_ascii_digit()).collect();
    let n: i32 = digits.parse().ok()?;
    let start = match digits.len() {
        // "90s" -> 1990, "00s"/"0s" -> 2000
        1 | 2 => {
            if n >= 30 {
                1900 + n
            } else {
                2000 + n
            }
        }
        4 => n,
        _ => return None,
    };
    let start = start - start % 10;
    Some((start, start + 9))
}

/// An inclusive numeric range with optional bounds. Unset bounds default to
/// the full domain.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureRange {
    pub min: Option<f32>,
    pub max: Option<f32>,
}

impl FeatureRange {
    pub fn contains(&self, value: f32) -> bool {
        if let Some(min) = self.min {
            if value < min {
                return false;
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return false;
            }
        }
        true
    }

    pub fn is_unset(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

/// Target ranges for catalog audio features. Tempo is in BPM, the rest are
/// in the 0.0..=1.0 domain.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioFeatureRanges {
    pub tempo: FeatureRange,
    pub energy: FeatureRange,
    pub danceability: FeatureRange,
    pub valence: FeatureRange,
    pub acousticness: FeatureRange,
}

impl AudioFeatureRanges {
    pub fn is_unset(&self) -> bool {
        self.tempo.is_unset()
            && self.energy.is_unset()
            && self.danceability.is_unset()
            && self.valence.is_unset()
            && self.acousticness.is_unset()
    }
}

/// Structured constraints extracted from a prompt.
///
/// Every field defaults to unset; `ConstraintSpec::default()` is the
/// conservative spec substituted when extraction output cannot be parsed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintSpec {
    pub primary_genre: Option<String>,
    pub secondary_genre: Option<String>,
    pub subgenre: Option<String>,
    pub era: Era,
    /// Atmosphere tags like "mellow", "high energy", "nostalgic".
    pub atmosphere: Vec<String>,
    /// Use-case tag like "focus", "workout", "party".
    pub use_case: Option<String>,
    pub popularity: PopularityPreference,
    /// Artists the user explicitly asked for.
    pub requested_artists: Vec<String>,
    /// When true, only the requested artists are wanted, not similar ones.
    pub exclusive_mode: bool,
    pub audio_features: AudioFeatureRanges,
    pub lyrical_preferences: Vec<String>,
    pub production_preferences: Vec<String>,
    /// `Some(false)` means explicit-content tracks must be dropped.
    pub allow_explicit: Option<bool>,
    /// Version markers to exclude, e.g. ["remix", "live"].
    pub exclude_versions: Vec<String>,
    pub excluded_artists: Vec<String>,
}

impl ConstraintSpec {
    /// True when nothing at all was extracted from the prompt.
    pub fn is_unset(&self) -> bool {
        *self == ConstraintSpec::default()
    }
}
