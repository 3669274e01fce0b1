//! Ordered constraint filtering.
//!
//! Each pass is independently skippable when its constraint is unset, and
//! the two LLM-backed passes fail open: a validation error turns the pass
//! into a no-op instead of emptying the pool.

use crate::catalog::TrackCandidate;
use crate::extraction::{
    ConstraintExtractionService, ConstraintSpec, PopularityPreference, ValidationPass,
};
use crate::playlist::{normalize_artist, title_has_version_marker, TrackSignature};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Popularity ceiling re-checked on vibe-pass backfill for underground
/// requests. Mirrors the sourcing rule.
const UNDERGROUND_POPULARITY_CEILING: u8 = 50;

/// Caller-supplied exclusions for one filter run.
pub struct FilterOptions<'a> {
    /// Track ids the owner explicitly removed.
    pub exclude_ids: &'a HashSet<String>,
    /// Artists the owner banned (matched case/diacritic-insensitively).
    pub exclude_artists: &'a HashSet<String>,
    /// Signatures surfaced by earlier cycles (history ledger et al).
    pub history: &'a HashSet<TrackSignature>,
    /// Requested playlist length; floor for the vibe-pass backfill.
    pub target: usize,
}

pub struct ConstraintFilter {
    extraction: Arc<dyn ConstraintExtractionService>,
}

impl ConstraintFilter {
    pub fn new(extraction: Arc<dyn ConstraintExtractionService>) -> Self {
        Self { extraction }
    }

    /// Run all passes in order and return the surviving candidates.
    pub async fn filter(
        &self,
        candidates: Vec<TrackCandidate>,
        spec: &ConstraintSpec,
        opts: &FilterOptions<'_>,
    ) -> Vec<TrackCandidate> {
        let pool = identity_pass(candidates, spec, opts);
        let pool = explicit_pass(pool, spec);
        let pool = audio_feature_pass(pool, spec);
        let pool = era_pass(pool, spec);
        let pool = self.genre_pass(pool, spec).await;
        self.vibe_pass(pool, spec, opts.target).await
    }

    /// Pass 5: LLM genre classification with catalog hints. Fails open.
    async fn genre_pass(
        &self,
        pool: Vec<TrackCandidate>,
        spec: &ConstraintSpec,
    ) -> Vec<TrackCandidate> {
        if spec.primary_genre.is_none() || pool.is_empty() {
            return pool;
        }
        let keep = match self
            .extraction
            .validate(&pool, spec, ValidationPass::Genre)
            .await
        {
            Ok(keep) => keep,
            Err(e) => {
                warn!("Genre validation unavailable, pass skipped: {}", e);
                return pool;
            }
        };

        // A requested artist's own tracks survive even when the model deems
        // the artist off-genre; otherwise an exclusive request could come
        // back empty.
        let requested: HashSet<String> = spec
            .requested_artists
            .iter()
            .map(|a| normalize_artist(a))
            .collect();

        pool.into_iter()
            .filter(|c| {
                keep.contains(&c.id)
                    || c.artists
                        .iter()
                        .any(|a| requested.contains(&normalize_artist(a)))
            })
            .collect()
    }

    /// Pass 6: vibe coherence with controlled backfill. Fails open.
    async fn vibe_pass(
        &self,
        pool: Vec<TrackCandidate>,
        spec: &ConstraintSpec,
        target: usize,
    ) -> Vec<TrackCandidate> {
        if (spec.use_case.is_none() && spec.atmosphere.is_empty()) || pool.is_empty() {
            return pool;
        }
        let keep = match self
            .extraction
            .validate(&pool, spec, ValidationPass::Vibe)
            .await
        {
            Ok(keep) => keep,
            Err(e) => {
                warn!("Vibe validation unavailable, pass skipped: {}", e);
                return pool;
            }
        };

        let (mut kept, dropped): (Vec<_>, Vec<_>) =
            pool.into_iter().partition(|c| keep.contains(&c.id));

        // The pass must not starve the selector: re-admit dropped
        // candidates, in order, up to the target. Backfilled tracks are
        // re-checked against the underground rule when it is active.
        if kept.len() < target {
            let underground = spec.popularity == PopularityPreference::Underground;
            for candidate in dropped {
                if kept.len() >= target {
                    break;
                }
                if underground && candidate.popularity > UNDERGROUND_POPULARITY_CEILING {
                    continue;
                }
                kept.push(candidate);
            }
            debug!(restored_to = kept.len(), "Vibe pass backfilled short pool");
        }
        kept
    }
}

/// Pass 1: identity exclusion (ids, history signatures, banned artists and
/// user-excluded version markers).
fn identity_pass(
    pool: Vec<TrackCandidate>,
    spec: &ConstraintSpec,
    opts: &FilterOptions<'_>,
) -> Vec<TrackCandidate> {
    let banned: HashSet<String> = opts
        .exclude_artists
        .iter()
        .chain(spec.excluded_artists.iter())
        .map(|a| normalize_artist(a))
        .collect();

    pool.into_iter()
        .filter(|c| {
            if opts.exclude_ids.contains(&c.id) {
                return false;
            }
            if opts.history.contains(&TrackSignature::of(c)) {
                return false;
            }
            if c.artists.iter().any(|a| banned.contains(&normalize_artist(a))) {
                return false;
            }
            !title_has_version_marker(&c.title, &spec.exclude_versions)
        })
        .collect()
}

/// Pass 2: drop explicit tracks unless explicit content is allowed.
fn explicit_pass(pool: Vec<TrackCandidate>, spec: &ConstraintSpec) -> Vec<TrackCandidate> {
    if spec.allow_explicit != Some(false) {
        return pool;
    }
    pool.into_iter().filter(|c| !c.explicit).collect()
}

/// Pass 3: audio-feature ranges. Unset bounds cover the full domain.
fn audio_feature_pass(pool: Vec<TrackCandidate>, spec: &ConstraintSpec) -> Vec<TrackCandidate> {
    if spec.audio_features.is_unset() {
        return pool;
    }
    let ranges = &spec.audio_features;
    pool.into_iter()
        .filter(|c| {
            ranges.tempo.contains(c.features.tempo)
                && ranges.energy.contains(c.features.energy)
                && ranges.danceability.contains(c.features.danceability)
                && ranges.valence.contains(c.features.valence)
                && ranges.acousticness.contains(c.features.acousticness)
        })
        .collect()
}

/// Pass 4: era. Candidates without a known release year are dropped when an
/// era was requested.
fn era_pass(pool: Vec<TrackCandidate>, spec: &ConstraintSpec) -> Vec<TrackCandidate> {
    let Some((start, end)) = spec.era.year_bounds() else {
        return pool;
    };
    pool.into_iter()
        .filter(|c| {
            c.release_year
                .map(|year| year >= start && year <= end)
                .unwrap_or(false)
        })
        .collect()
}
