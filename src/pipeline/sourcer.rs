//! Candidate sourcing.
//!
//! Produces the pool of track candidates for one pipeline run, using one of
//! two strategies chosen from the constraint spec. Individual catalog query
//! failures are skipped, never fatal.

use crate::catalog::{CatalogService, TrackCandidate};
use crate::extraction::{ConstraintExtractionService, ConstraintSpec, PopularityPreference};
use crate::playlist::{normalize_artist, TrackSignature};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// Queries issued by the first fanout round. Relaxed rounds add more.
const BASE_QUERY_COUNT: usize = 8;
const RELAXED_QUERIES_PER_ROUND: usize = 4;

/// Corpus-mining caps.
const MAX_COLLECTIONS: usize = 5;
const COLLECTION_TRACK_CAP: usize = 100;
const COLLECTION_SEARCH_LIMIT: usize = 10;
/// Collections with fewer distinct artists are single-artist vanity lists.
const MIN_DISTINCT_ARTISTS: usize = 5;

/// Popularity ceiling applied when the user asked for underground picks.
const UNDERGROUND_POPULARITY_CEILING: u8 = 50;

/// How the candidate pool is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcingStrategy {
    /// Many keyword searches against the catalog.
    QueryFanout,
    /// Harvest tracks from curated collections matching the request.
    CorpusMining,
}

impl SourcingStrategy {
    /// Mine the corpus when the user wants "more like X" (seed artists
    /// without exclusive mode) or underground picks; otherwise fan out
    /// keyword searches.
    pub fn for_spec(spec: &ConstraintSpec) -> Self {
        let more_like_seeds = !spec.requested_artists.is_empty() && !spec.exclusive_mode;
        if more_like_seeds || spec.popularity == PopularityPreference::Underground {
            SourcingStrategy::CorpusMining
        } else {
            SourcingStrategy::QueryFanout
        }
    }
}

pub struct CandidateSourcer {
    catalog: Arc<dyn CatalogService>,
    extraction: Arc<dyn ConstraintExtractionService>,
}

impl CandidateSourcer {
    pub fn new(
        catalog: Arc<dyn CatalogService>,
        extraction: Arc<dyn ConstraintExtractionService>,
    ) -> Self {
        Self {
            catalog,
            extraction,
        }
    }

    /// Produce a candidate pool for the given constraints.
    ///
    /// `excluded` holds signatures that must not be surfaced (history ledger
    /// plus caller exclusions). `round` is 0 for the initial sourcing and
    /// 1..=3 for backfill rounds with relaxed query diversity.
    pub async fn source(
        &self,
        token: &str,
        prompt: &str,
        spec: &ConstraintSpec,
        excluded: &HashSet<TrackSignature>,
        target: usize,
        round: usize,
    ) -> Vec<TrackCandidate> {
        let strategy = SourcingStrategy::for_spec(spec);
        debug!(?strategy, round, target, "Sourcing candidates");

        let mut pool = match strategy {
            SourcingStrategy::QueryFanout => {
                self.query_fanout(token, prompt, spec, target, round).await
            }
            SourcingStrategy::CorpusMining => {
                self.corpus_mining(token, prompt, spec, target).await
            }
        };

        if spec.popularity == PopularityPreference::Underground {
            pool.retain(|c| c.popularity <= UNDERGROUND_POPULARITY_CEILING);
        }

        dedup_pool(pool, excluded)
    }

    async fn query_fanout(
        &self,
        token: &str,
        prompt: &str,
        spec: &ConstraintSpec,
        target: usize,
        round: usize,
    ) -> Vec<TrackCandidate> {
        let query_count = BASE_QUERY_COUNT + round * RELAXED_QUERIES_PER_ROUND;
        let queries = match self
            .extraction
            .generate_queries(prompt, spec, query_count)
            .await
        {
            Ok(queries) if !queries.is_empty() => queries,
            Ok(_) | Err(_) => {
                warn!("Query generation failed, falling back to heuristic queries");
                fallback_queries(prompt, spec)
            }
        };

        // Result limit scaled to the request, within sane bounds.
        let per_query_limit = (target / 2).clamp(5, 15);

        let mut pool = Vec::new();
        for query in &queries {
            match self.catalog.search_tracks(token, query, per_query_limit).await {
                Ok(tracks) => pool.extend(tracks),
                Err(e) => {
                    // Skipped, not fatal.
                    warn!(%query, "Catalog search failed: {}", e);
                }
            }
        }
        pool
    }

    async fn corpus_mining(
        &self,
        token: &str,
        prompt: &str,
        spec: &ConstraintSpec,
        target: usize,
    ) -> Vec<TrackCandidate> {
        let queries = match self.extraction.generate_queries(prompt, spec, 4).await {
            Ok(queries) if !queries.is_empty() => queries,
            Ok(_) | Err(_) => fallback_queries(prompt, spec),
        };

        let seeds: Vec<String> = spec
            .requested_artists
            .iter()
            .map(|a| normalize_artist(a))
            .collect();
        let enough = target.saturating_mul(3).max(target);

        let mut pool: Vec<TrackCandidate> = Vec::new();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut accepted_collections = 0usize;

        'queries: for query in &queries {
            let collections = match self
                .catalog
                .search_collections(token, query, COLLECTION_SEARCH_LIMIT)
                .await
            {
                Ok(collections) => collections,
                Err(e) => {
                    warn!(%query, "Collection search failed: {}", e);
                    continue;
                }
            };

            for collection in collections {
                if accepted_collections >= MAX_COLLECTIONS {
                    break 'queries;
                }
                let tracks = match self
                    .catalog
                    .collection_tracks(token, &collection.id, COLLECTION_TRACK_CAP)
                    .await
                {
                    Ok(tracks) => tracks,
                    Err(e) => {
                        warn!(collection = %collection.id, "Harvest failed: {}", e);
                        continue;
                    }
                };

                if !collection_acceptable(&tracks, &seeds) {
                    debug!(collection = %collection.id, "Rejected collection");
                    continue;
                }

                accepted_collections += 1;
                for track in tracks {
                    if seen_ids.insert(track.id.clone()) {
                        pool.push(track);
                    }
                }
                if pool.len() >= enough {
                    break 'queries;
                }
            }
        }
        pool
    }
}

/// A collection qualifies when it spans enough distinct artists and, if
/// seed artists were requested, contains at least one of them.
fn collection_acceptable(tracks: &[TrackCandidate], seeds: &[String]) -> bool {
    let distinct: HashSet<String> = tracks
        .iter()
        .map(|t| normalize_artist(t.primary_artist()))
        .collect();
    if distinct.len() < MIN_DISTINCT_ARTISTS {
        return false;
    }
    if seeds.is_empty() {
        return true;
    }
    tracks
        .iter()
        .flat_map(|t| t.artists.iter())
        .any(|artist| seeds.contains(&normalize_artist(artist)))
}

/// Queries built directly from the spec when the extraction service cannot
/// provide any.
fn fallback_queries(prompt: &str, spec: &ConstraintSpec) -> Vec<String> {
    let mut queries = Vec::new();
    if let Some(genre) = &spec.primary_genre {
        if let Some(decade) = &spec.era.decade {
            queries.push(format!("{} {}", decade, genre));
        }
        queries.push(genre.clone());
    }
    if let Some(genre) = &spec.secondary_genre {
        queries.push(genre.clone());
    }
    for artist in &spec.requested_artists {
        queries.push(artist.clone());
    }
    if queries.is_empty() {
        queries.push(prompt.to_string());
    }
    queries
}

/// Drop candidates whose signature is excluded or already in the pool,
/// keeping first occurrences in order.
fn dedup_pool(
    pool: Vec<TrackCandidate>,
    excluded: &HashSet<TrackSignature>,
) -> Vec<TrackCandidate> {
    let mut seen: HashSet<TrackSignature> = HashSet::new();
    pool.into_iter()
        .filter(|candidate| {
            let sig = TrackSignature::of(candidate);
            if excluded.contains(&sig) {
                return false;
            }
            seen.insert(sig)
        })
        .collect()
}
