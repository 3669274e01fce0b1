//! Ranking and final selection.
//!
//! Pure: no catalog or LLM calls. Backfill sourcing rounds for short pools
//! are driven by the engine; the selector only ranks, caps and truncates,
//! and never errors on a pool smaller than the target.

use crate::catalog::TrackCandidate;
use crate::extraction::{ConstraintSpec, PopularityPreference};
use crate::playlist::normalize_artist;
use std::collections::HashMap;

/// Max tracks per artist when seed artists were requested without
/// exclusive mode, to preserve discovery balance.
const PER_ARTIST_CAP: usize = 3;

pub struct Selector;

impl Selector {
    /// Rank the pool, apply the per-artist cap where it applies, and
    /// truncate to `target`. Returns `min(len, target)` items.
    pub fn select(
        candidates: Vec<TrackCandidate>,
        spec: &ConstraintSpec,
        target: usize,
    ) -> Vec<TrackCandidate> {
        let mut ranked = candidates;
        // Stable sort keeps sourcing order among equals.
        ranked.sort_by(|a, b| {
            rank_score(b, spec)
                .partial_cmp(&rank_score(a, spec))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let cap_per_artist = !spec.requested_artists.is_empty() && !spec.exclusive_mode;
        let mut per_artist: HashMap<String, usize> = HashMap::new();
        let mut selected = Vec::with_capacity(target.min(ranked.len()));

        for candidate in ranked {
            if selected.len() >= target {
                break;
            }
            if cap_per_artist {
                let artist = normalize_artist(candidate.primary_artist());
                let count = per_artist.entry(artist).or_insert(0);
                if *count >= PER_ARTIST_CAP {
                    continue;
                }
                *count += 1;
            }
            selected.push(candidate);
        }
        selected
    }
}

/// Composite ranking score: fit to the declared popularity band plus a
/// small freshness component.
fn rank_score(candidate: &TrackCandidate, spec: &ConstraintSpec) -> f64 {
    let popularity = candidate.popularity as f64;
    let band_fit = match spec.popularity {
        PopularityPreference::Mainstream => popularity,
        PopularityPreference::Underground => 100.0 - popularity,
        // Balanced prefers the middle of the range; unset mildly favors
        // recognizable picks.
        PopularityPreference::Balanced => 100.0 - (popularity - 50.0).abs() * 2.0,
        PopularityPreference::Unset => popularity * 0.5,
    };

    let freshness = match (spec.era.year_bounds(), candidate.release_year) {
        // An era request makes freshness irrelevant.
        (Some(_), _) => 0.0,
        (None, Some(year)) => ((year - 1980).max(0) as f64) * 0.2,
        (None, None) => 0.0,
    };

    band_fit + freshness
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AudioFeatures;

    fn candidate(id: &str, artist: &str, popularity: u8, year: i32) -> TrackCandidate {
        TrackCandidate {
            id: id.into(),
            title: format!("Song {}", id),
            artists: vec![artist.into()],
            album_id: None,
            duration_ms: 200_000,
            explicit: false,
            popularity,
            features: AudioFeatures::default(),
            release_year: Some(year),
            genres: vec![],
        }
    }

    #[test]
    fn test_truncates_to_target() {
        let pool: Vec<_> = (0..30)
            .map(|i| candidate(&format!("t{}", i), &format!("a{}", i), 50, 2000))
            .collect();
        let out = Selector::select(pool, &ConstraintSpec::default(), 20);
        assert_eq!(out.len(), 20);
    }

    #[test]
    fn test_short_pool_returns_all_without_error() {
        let pool = vec![candidate("t1", "a", 50, 2000)];
        let out = Selector::select(pool, &ConstraintSpec::default(), 20);
        assert_eq!(out.len(), 1);

        let out = Selector::select(vec![], &ConstraintSpec::default(), 20);
        assert!(out.is_empty());
    }

    #[test]
    fn test_mainstream_ranks_popular_first() {
        let mut spec = ConstraintSpec::default();
        spec.popularity = PopularityPreference::Mainstream;
        let pool = vec![
            candidate("obscure", "a", 10, 2000),
            candidate("hit", "b", 95, 2000),
        ];
        let out = Selector::select(pool, &spec, 2);
        assert_eq!(out[0].id, "hit");
    }

    #[test]
    fn test_underground_ranks_obscure_first() {
        let mut spec = ConstraintSpec::default();
        spec.popularity = PopularityPreference::Underground;
        let pool = vec![
            candidate("hit", "a", 95, 2000),
            candidate("obscure", "b", 10, 2000),
        ];
        let out = Selector::select(pool, &spec, 2);
        assert_eq!(out[0].id, "obscure");
    }

    #[test]
    fn test_per_artist_cap_with_seeds() {
        let mut spec = ConstraintSpec::default();
        spec.requested_artists = vec!["Seed".into()];

        let mut pool: Vec<_> = (0..6)
            .map(|i| candidate(&format!("s{}", i), "Seed", 80, 2000))
            .collect();
        pool.push(candidate("other", "Other", 10, 2000));

        let out = Selector::select(pool, &spec, 10);
        let seed_count = out.iter().filter(|c| c.primary_artist() == "Seed").count();
        assert_eq!(seed_count, PER_ARTIST_CAP);
        assert!(out.iter().any(|c| c.id == "other"));
    }

    #[test]
    fn test_exclusive_mode_lifts_cap() {
        let mut spec = ConstraintSpec::default();
        spec.requested_artists = vec!["Seed".into()];
        spec.exclusive_mode = true;

        let pool: Vec<_> = (0..6)
            .map(|i| candidate(&format!("s{}", i), "Seed", 80, 2000))
            .collect();
        let out = Selector::select(pool, &spec, 10);
        assert_eq!(out.len(), 6);
    }
}
