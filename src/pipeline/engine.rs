//! Synthesis engine: the on-demand entry points and the four-stage run
//! shared with the refresh scheduler.

use super::filter::{ConstraintFilter, FilterOptions};
use super::selector::Selector;
use super::sourcer::CandidateSourcer;
use crate::catalog::{CatalogService, TrackCandidate};
use crate::credentials::{CredentialError, CredentialStore};
use crate::extraction::{ConstraintExtractionService, ConstraintSpec};
use crate::playlist::{
    Feedback, HistoryLedger, PlaylistRecord, PlaylistStore, TrackEntry, TrackSignature,
    UpdateFrequency, UpdateMode,
};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Backfill sourcing rounds tried when the filtered pool is short.
const MAX_SOURCING_ROUNDS: usize = 3;

pub const DEFAULT_REQUESTED_COUNT: usize = 20;

/// Errors surfaced to engine callers. Everything else degrades internally.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No catalog credentials available for user {0}")]
    NoCredentials(String),

    #[error("Credential error: {0}")]
    Credentials(#[from] CredentialError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] anyhow::Error),
}

/// Caller tweaks applied on top of the extracted spec.
#[derive(Debug, Clone, Default)]
pub struct PreviewOverrides {
    pub requested_count: Option<usize>,
    pub allow_explicit: Option<bool>,
    pub exclude_artists: Vec<String>,
    pub exclude_track_ids: Vec<String>,
}

/// Result of an on-demand synthesis, not yet persisted.
#[derive(Debug, Clone)]
pub struct Preview {
    pub owner_id: String,
    pub prompt: String,
    pub spec: ConstraintSpec,
    pub requested_count: usize,
    pub tracks: Vec<TrackCandidate>,
}

/// Metadata for committing a preview as a playlist record.
#[derive(Debug, Clone)]
pub struct CommitMetadata {
    /// Re-commit into an existing playlist when set; otherwise a new
    /// record is created.
    pub playlist_id: Option<String>,
    pub name: String,
    pub description: String,
    pub update_frequency: UpdateFrequency,
    pub update_mode: UpdateMode,
    pub preferred_hour: Option<u32>,
    pub timezone_offset_minutes: Option<i32>,
}

pub struct SynthesisEngine {
    extraction: Arc<dyn ConstraintExtractionService>,
    credentials: Arc<dyn CredentialStore>,
    store: Arc<dyn PlaylistStore>,
    sourcer: CandidateSourcer,
    filter: ConstraintFilter,
}

impl SynthesisEngine {
    pub fn new(
        extraction: Arc<dyn ConstraintExtractionService>,
        catalog: Arc<dyn CatalogService>,
        credentials: Arc<dyn CredentialStore>,
        store: Arc<dyn PlaylistStore>,
    ) -> Self {
        Self {
            sourcer: CandidateSourcer::new(Arc::clone(&catalog), Arc::clone(&extraction)),
            filter: ConstraintFilter::new(Arc::clone(&extraction)),
            extraction,
            credentials,
            store,
        }
    }

    /// On-demand synthesis without persistence.
    ///
    /// Returns a best-effort track list, possibly shorter than requested.
    /// Fails only when the owner has no catalog credentials at all.
    pub async fn generate_preview(
        &self,
        owner_id: &str,
        prompt: &str,
        overrides: &PreviewOverrides,
    ) -> Result<Preview, EngineError> {
        let credentials = match self.credentials.get(owner_id).await {
            Ok(credentials) => credentials,
            Err(CredentialError::Missing(user)) => {
                return Err(EngineError::NoCredentials(user));
            }
            Err(other) => return Err(other.into()),
        };

        // A malformed extraction degrades quality, never blocks generation.
        let mut spec = match self.extraction.extract(prompt).await {
            Ok(spec) => spec,
            Err(e) => {
                warn!("Constraint extraction failed, using defaults: {}", e);
                ConstraintSpec::default()
            }
        };
        if let Some(allow) = overrides.allow_explicit {
            spec.allow_explicit = Some(allow);
        }
        spec.excluded_artists
            .extend(overrides.exclude_artists.iter().cloned());

        let target = overrides
            .requested_count
            .unwrap_or(DEFAULT_REQUESTED_COUNT);
        let exclude_ids: HashSet<String> =
            overrides.exclude_track_ids.iter().cloned().collect();

        let tracks = self
            .synthesize(
                &credentials.access_token,
                prompt,
                &spec,
                &HashSet::new(),
                &exclude_ids,
                &HashSet::new(),
                target,
            )
            .await;

        Ok(Preview {
            owner_id: owner_id.to_string(),
            prompt: prompt.to_string(),
            spec,
            requested_count: target,
            tracks,
        })
    }

    /// Persist a preview as a playlist record.
    ///
    /// Committing twice with the same preview cannot duplicate signatures:
    /// entries are merged through signature dedup. A commit counts as a
    /// manual run and starts the auto-refresh cooldown.
    pub async fn commit_playlist(
        &self,
        preview: &Preview,
        metadata: &CommitMetadata,
    ) -> Result<PlaylistRecord, EngineError> {
        let now = Utc::now();

        let mut record = match &metadata.playlist_id {
            Some(id) => self.store.get(id)?.unwrap_or_else(|| {
                new_record(id.clone(), preview, metadata, now)
            }),
            None => new_record(uuid::Uuid::new_v4().to_string(), preview, metadata, now),
        };

        record.name = metadata.name.clone();
        record.description = metadata.description.clone();
        record.prompt = preview.prompt.clone();
        record.spec = preview.spec.clone();
        record.requested_count = preview.requested_count;
        record.update_frequency = metadata.update_frequency;
        record.update_mode = metadata.update_mode;
        record.preferred_hour = metadata.preferred_hour;
        record.timezone_offset_minutes = metadata.timezone_offset_minutes;

        let added = merge_tracks(&mut record, &preview.tracks);
        record
            .history
            .record(&added.iter().map(|c| TrackSignature::of(c)).collect::<Vec<_>>());

        record.mark_manual_edit(now);
        record.next_run_at = record.next_run_after(now);

        self.store.save(&record)?;
        info!(
            playlist = %record.id,
            tracks = record.track_list.len(),
            frequency = %record.update_frequency,
            "Committed playlist"
        );
        Ok(record)
    }

    /// Run sourcing, filtering and selection, with up to three relaxed
    /// backfill rounds when the filtered pool is short of `target`.
    /// Shared by preview generation and scheduled refresh.
    pub async fn synthesize(
        &self,
        token: &str,
        prompt: &str,
        spec: &ConstraintSpec,
        excluded_signatures: &HashSet<TrackSignature>,
        exclude_ids: &HashSet<String>,
        exclude_artists: &HashSet<String>,
        target: usize,
    ) -> Vec<TrackCandidate> {
        let opts = FilterOptions {
            exclude_ids,
            exclude_artists,
            history: excluded_signatures,
            target,
        };

        let mut pool: Vec<TrackCandidate> = Vec::new();
        let mut pool_signatures = excluded_signatures.clone();
        let mut selected = Vec::new();

        for round in 0..=MAX_SOURCING_ROUNDS {
            let sourced = self
                .sourcer
                .source(token, prompt, spec, &pool_signatures, target, round)
                .await;
            for candidate in sourced {
                pool_signatures.insert(TrackSignature::of(&candidate));
                pool.push(candidate);
            }

            let filtered = self.filter.filter(pool.clone(), spec, &opts).await;
            selected = Selector::select(filtered, spec, target);

            if selected.len() >= target {
                break;
            }
            debug!(
                round,
                have = selected.len(),
                want = target,
                "Filtered pool short, sourcing another round"
            );
        }

        // Partial results are accepted; tracks are never fabricated.
        selected
    }
}

fn new_record(
    id: String,
    preview: &Preview,
    metadata: &CommitMetadata,
    now: chrono::DateTime<Utc>,
) -> PlaylistRecord {
    PlaylistRecord {
        id,
        owner_id: preview.owner_id.clone(),
        name: metadata.name.clone(),
        description: metadata.description.clone(),
        track_list: Vec::new(),
        prompt: preview.prompt.clone(),
        spec: preview.spec.clone(),
        requested_count: preview.requested_count,
        update_frequency: metadata.update_frequency,
        update_mode: metadata.update_mode,
        next_run_at: None,
        last_manual_run_at: None,
        history: HistoryLedger::new(),
        excluded_track_ids: HashSet::new(),
        excluded_artists: HashSet::new(),
        feedback: Feedback::default(),
        preferred_hour: metadata.preferred_hour,
        timezone_offset_minutes: metadata.timezone_offset_minutes,
        created_at: now,
        updated_at: now,
    }
}

/// Append candidates whose signature is neither in the track list nor in the
/// history ledger. Returns the candidates that were actually added.
fn merge_tracks<'a>(
    record: &mut PlaylistRecord,
    candidates: &'a [TrackCandidate],
) -> Vec<&'a TrackCandidate> {
    let mut added = Vec::new();
    for candidate in candidates {
        let signature = TrackSignature::of(candidate);
        if record.contains_signature(&signature) || record.history.contains(&signature) {
            continue;
        }
        record.track_list.push(TrackEntry {
            track_id: candidate.id.clone(),
            title: candidate.title.clone(),
            artist: candidate.primary_artist().to_string(),
            signature,
        });
        added.push(candidate);
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AudioFeatures;

    fn candidate(id: &str, artist: &str, title: &str) -> TrackCandidate {
        TrackCandidate {
            id: id.into(),
            title: title.into(),
            artists: vec![artist.into()],
            album_id: None,
            duration_ms: 180_000,
            explicit: false,
            popularity: 40,
            features: AudioFeatures::default(),
            release_year: Some(1999),
            genres: vec![],
        }
    }

    fn preview(tracks: Vec<TrackCandidate>) -> Preview {
        Preview {
            owner_id: "alice".into(),
            prompt: "test".into(),
            spec: ConstraintSpec::default(),
            requested_count: 20,
            tracks,
        }
    }

    fn metadata() -> CommitMetadata {
        CommitMetadata {
            playlist_id: None,
            name: "Test".into(),
            description: String::new(),
            update_frequency: UpdateFrequency::Never,
            update_mode: UpdateMode::Append,
            preferred_hour: None,
            timezone_offset_minutes: None,
        }
    }

    #[test]
    fn test_merge_dedups_by_signature() {
        let p = preview(vec![]);
        let mut record = new_record("p1".into(), &p, &metadata(), Utc::now());

        let first = vec![
            candidate("t1", "A", "Song"),
            candidate("t2", "B", "Other"),
        ];
        let added = merge_tracks(&mut record, &first);
        assert_eq!(added.len(), 2);

        // Same songs under different catalog ids add nothing.
        let again = vec![
            candidate("x1", "A", "Song (2011 Remaster)"),
            candidate("x2", "b", "Other"),
            candidate("t3", "C", "New"),
        ];
        let added = merge_tracks(&mut record, &again);
        assert_eq!(added.len(), 1);
        assert_eq!(record.track_list.len(), 3);
    }

    #[test]
    fn test_merge_skips_ledgered_signatures() {
        let p = preview(vec![]);
        let mut record = new_record("p1".into(), &p, &metadata(), Utc::now());
        // Signature committed in a prior cycle; the track itself is gone.
        record.history.record(&[TrackSignature::new("A", "Song")]);

        let candidates = [candidate("t1", "A", "Song"), candidate("t2", "B", "Other")];
        let added = merge_tracks(&mut record, &candidates);
        assert_eq!(added.len(), 1);
        assert_eq!(record.track_list.len(), 1);
        assert_eq!(record.track_list[0].track_id, "t2");
    }
}
