//! Music catalog collaborator.
//!
//! The pipeline is provider-agnostic: it only sees the [`CatalogService`]
//! trait. [`SpotifyCatalog`] is the Spotify-Web-API-style implementation.

mod models;
mod service;
mod spotify;

pub use models::{AudioFeatures, CollectionSummary, TrackCandidate};
pub use service::{CatalogError, CatalogService};
pub use spotify::SpotifyCatalog;
