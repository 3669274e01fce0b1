//! Tunesmith Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod catalog;
pub mod config;
pub mod credentials;
pub mod extraction;
pub mod llm;
pub mod pipeline;
pub mod playlist;
pub mod scheduler;

// Re-export commonly used types for convenience
pub use catalog::{CatalogService, SpotifyCatalog, TrackCandidate};
pub use credentials::{CredentialStore, SqliteCredentialStore};
pub use extraction::{ConstraintExtractionService, ConstraintSpec, LlmConstraintExtractor};
pub use pipeline::{CommitMetadata, Preview, PreviewOverrides, SynthesisEngine};
pub use playlist::{PlaylistRecord, PlaylistStore, SqlitePlaylistStore};
pub use scheduler::{CycleReport, RefreshScheduler};
