//! Shared fakes and builders for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tunesmith::catalog::{
    AudioFeatures, CatalogError, CatalogService, CollectionSummary, TrackCandidate,
};
use tunesmith::credentials::{CredentialError, CredentialStore, Credentials};
use tunesmith::extraction::{
    ConstraintExtractionService, ConstraintSpec, ExtractionError, ValidationPass,
};
use tunesmith::pipeline::SynthesisEngine;
use tunesmith::playlist::{
    Feedback, HistoryLedger, MemoryPlaylistStore, PlaylistRecord, UpdateFrequency, UpdateMode,
};

// =============================================================================
// Builders
// =============================================================================

pub fn track(id: &str, artist: &str, title: &str) -> TrackCandidate {
    TrackCandidate {
        id: id.into(),
        title: title.into(),
        artists: vec![artist.into()],
        album_id: None,
        duration_ms: 210_000,
        explicit: false,
        popularity: 45,
        features: AudioFeatures::default(),
        release_year: Some(1995),
        genres: vec![],
    }
}

pub fn track_with(
    id: &str,
    artist: &str,
    title: &str,
    popularity: u8,
    release_year: Option<i32>,
) -> TrackCandidate {
    let mut t = track(id, artist, title);
    t.popularity = popularity;
    t.release_year = release_year;
    t
}

// =============================================================================
// FakeExtraction
// =============================================================================

/// Extraction fake: returns a fixed spec and queries, keeps every candidate
/// in both validation passes.
pub struct FakeExtraction {
    pub spec: ConstraintSpec,
    pub queries: Vec<String>,
    pub fail_extract: bool,
}

impl FakeExtraction {
    pub fn with_spec(spec: ConstraintSpec) -> Self {
        Self {
            spec,
            queries: vec!["test query".into()],
            fail_extract: false,
        }
    }
}

impl Default for FakeExtraction {
    fn default() -> Self {
        Self::with_spec(ConstraintSpec::default())
    }
}

#[async_trait]
impl ConstraintExtractionService for FakeExtraction {
    async fn extract(&self, _prompt: &str) -> Result<ConstraintSpec, ExtractionError> {
        if self.fail_extract {
            return Err(ExtractionError::Parse("malformed".into()));
        }
        Ok(self.spec.clone())
    }

    async fn generate_queries(
        &self,
        _prompt: &str,
        _spec: &ConstraintSpec,
        _count: usize,
    ) -> Result<Vec<String>, ExtractionError> {
        Ok(self.queries.clone())
    }

    async fn validate(
        &self,
        candidates: &[TrackCandidate],
        _spec: &ConstraintSpec,
        _pass: ValidationPass,
    ) -> Result<HashSet<String>, ExtractionError> {
        Ok(candidates.iter().map(|c| c.id.clone()).collect())
    }
}

// =============================================================================
// FakeCatalog
// =============================================================================

/// One recorded playlist mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedMutation {
    pub playlist_id: String,
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

/// Catalog fake serving a fixed search pool and fixed collections, and
/// recording every playlist mutation.
#[derive(Default)]
pub struct FakeCatalog {
    /// Returned (up to `limit`) for every track search.
    pub search_pool: Vec<TrackCandidate>,
    /// collection id -> tracks, served for every collection search.
    pub collections: HashMap<String, Vec<TrackCandidate>>,
    pub fail_mutations: bool,
    pub mutations: Mutex<Vec<RecordedMutation>>,
}

impl FakeCatalog {
    pub fn with_search_pool(pool: Vec<TrackCandidate>) -> Self {
        Self {
            search_pool: pool,
            ..Default::default()
        }
    }

    pub fn recorded_mutations(&self) -> Vec<RecordedMutation> {
        self.mutations.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogService for FakeCatalog {
    async fn search_tracks(
        &self,
        _token: &str,
        _query: &str,
        limit: usize,
    ) -> Result<Vec<TrackCandidate>, CatalogError> {
        Ok(self.search_pool.iter().take(limit).cloned().collect())
    }

    async fn get_tracks(
        &self,
        _token: &str,
        ids: &[String],
    ) -> Result<Vec<TrackCandidate>, CatalogError> {
        Ok(self
            .search_pool
            .iter()
            .filter(|t| ids.contains(&t.id))
            .cloned()
            .collect())
    }

    async fn search_collections(
        &self,
        _token: &str,
        _query: &str,
        limit: usize,
    ) -> Result<Vec<CollectionSummary>, CatalogError> {
        let mut ids: Vec<&String> = self.collections.keys().collect();
        ids.sort();
        Ok(ids
            .into_iter()
            .take(limit)
            .map(|id| CollectionSummary {
                id: id.clone(),
                name: format!("Collection {}", id),
                owner: None,
                track_count: self.collections[id].len() as u32,
            })
            .collect())
    }

    async fn collection_tracks(
        &self,
        _token: &str,
        collection_id: &str,
        limit: usize,
    ) -> Result<Vec<TrackCandidate>, CatalogError> {
        Ok(self
            .collections
            .get(collection_id)
            .map(|tracks| tracks.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn mutate_playlist(
        &self,
        _token: &str,
        playlist_id: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<(), CatalogError> {
        if self.fail_mutations {
            return Err(CatalogError::Api {
                status: 502,
                message: "upstream unavailable".into(),
            });
        }
        self.mutations.lock().unwrap().push(RecordedMutation {
            playlist_id: playlist_id.into(),
            add: add.to_vec(),
            remove: remove.to_vec(),
        });
        Ok(())
    }
}

// =============================================================================
// FakeCredentials
// =============================================================================

/// Credential fake: valid tokens for every user, with an optional number of
/// refresh failures (or permanent failure) and a refresh call counter.
pub struct FakeCredentials {
    /// `None` means refresh always fails.
    pub failures_before_success: Option<usize>,
    /// When true, no user has any stored credentials.
    pub empty: bool,
    pub refresh_calls: AtomicUsize,
}

impl FakeCredentials {
    pub fn healthy() -> Self {
        Self {
            failures_before_success: Some(0),
            empty: false,
            refresh_calls: AtomicUsize::new(0),
        }
    }

    pub fn always_failing() -> Self {
        Self {
            failures_before_success: None,
            empty: false,
            refresh_calls: AtomicUsize::new(0),
        }
    }

    pub fn without_users() -> Self {
        Self {
            empty: true,
            ..Self::healthy()
        }
    }

    pub fn refresh_call_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn credentials_for(user_id: &str) -> Credentials {
        Credentials {
            user_id: user_id.into(),
            access_token: format!("access-{}", user_id),
            refresh_token: format!("refresh-{}", user_id),
            expires_at: fixed_now() + Duration::hours(1),
        }
    }
}

#[async_trait]
impl CredentialStore for FakeCredentials {
    async fn get(&self, user_id: &str) -> Result<Credentials, CredentialError> {
        if self.empty {
            return Err(CredentialError::Missing(user_id.into()));
        }
        Ok(Self::credentials_for(user_id))
    }

    async fn refresh(&self, user_id: &str) -> Result<Credentials, CredentialError> {
        let call = self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        match self.failures_before_success {
            Some(failures) if call >= failures => Ok(Self::credentials_for(user_id)),
            _ => Err(CredentialError::Refresh("token endpoint said no".into())),
        }
    }
}

// =============================================================================
// Wiring helpers
// =============================================================================

pub fn fixed_now() -> DateTime<Utc> {
    chrono::TimeZone::with_ymd_and_hms(&Utc, 2025, 6, 1, 12, 0, 0).unwrap()
}

/// A daily-refresh record that is due at `fixed_now()`.
pub fn due_record(id: &str, spec: ConstraintSpec) -> PlaylistRecord {
    let created = fixed_now() - Duration::days(7);
    PlaylistRecord {
        id: id.into(),
        owner_id: "alice".into(),
        name: format!("Playlist {}", id),
        description: String::new(),
        track_list: vec![],
        prompt: "something to refresh".into(),
        spec,
        requested_count: 10,
        update_frequency: UpdateFrequency::Daily,
        update_mode: UpdateMode::Append,
        next_run_at: Some(fixed_now() - Duration::minutes(1)),
        last_manual_run_at: None,
        history: HistoryLedger::new(),
        excluded_track_ids: HashSet::new(),
        excluded_artists: HashSet::new(),
        feedback: Feedback::default(),
        preferred_hour: None,
        timezone_offset_minutes: None,
        created_at: created,
        updated_at: created,
    }
}

pub struct TestHarness {
    pub extraction: Arc<FakeExtraction>,
    pub catalog: Arc<FakeCatalog>,
    pub credentials: Arc<FakeCredentials>,
    pub store: Arc<MemoryPlaylistStore>,
    pub engine: Arc<SynthesisEngine>,
}

pub fn harness(
    extraction: FakeExtraction,
    catalog: FakeCatalog,
    credentials: FakeCredentials,
) -> TestHarness {
    let extraction = Arc::new(extraction);
    let catalog = Arc::new(catalog);
    let credentials = Arc::new(credentials);
    let store = Arc::new(MemoryPlaylistStore::new());
    let engine = Arc::new(SynthesisEngine::new(
        extraction.clone(),
        catalog.clone(),
        credentials.clone(),
        store.clone(),
    ));
    TestHarness {
        extraction,
        catalog,
        credentials,
        store,
        engine,
    }
}
