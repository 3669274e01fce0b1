//! CatalogService trait definition.

use super::models::{CollectionSummary, TrackCandidate};
use async_trait::async_trait;
use thiserror::Error;

/// Errors from catalog calls.
///
/// A failing or timed-out search query is recovered locally by the sourcer
/// (that query's results are omitted); only playlist mutation failures
/// bubble up to the cycle level.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Catalog API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Could not decode catalog response: {0}")]
    Decode(String),

    #[error("Catalog request timed out")]
    Timeout,
}

/// Trait for music catalog backends.
///
/// All calls take the caller's bearer token: credentials are resolved by
/// the engine/scheduler before a pipeline run, never by the catalog itself.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Keyword search for tracks.
    async fn search_tracks(
        &self,
        token: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<TrackCandidate>, CatalogError>;

    /// Fetch tracks by catalog id.
    async fn get_tracks(
        &self,
        token: &str,
        ids: &[String],
    ) -> Result<Vec<TrackCandidate>, CatalogError>;

    /// Keyword search for curated collections.
    async fn search_collections(
        &self,
        token: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<CollectionSummary>, CatalogError>;

    /// Fetch up to `limit` tracks from a collection.
    async fn collection_tracks(
        &self,
        token: &str,
        collection_id: &str,
        limit: usize,
    ) -> Result<Vec<TrackCandidate>, CatalogError>;

    /// Apply a playlist mutation: add `add` and remove `remove` track ids.
    /// With an empty `remove` this is an append; remove-all-then-add is a
    /// replace.
    async fn mutate_playlist(
        &self,
        token: &str,
        playlist_id: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<(), CatalogError>;
}
