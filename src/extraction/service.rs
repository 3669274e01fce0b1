//! ConstraintExtractionService trait definition.

use super::spec::ConstraintSpec;
use crate::catalog::TrackCandidate;
use crate::llm::LlmError;
use async_trait::async_trait;
use std::collections::HashSet;
use thiserror::Error;

/// Which secondary validation pass is being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationPass {
    /// Classify candidates against the spec's primary genre.
    Genre,
    /// Remove genre-correct but atmospherically wrong candidates.
    Vibe,
}

impl std::fmt::Display for ValidationPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationPass::Genre => write!(f, "genre"),
            ValidationPass::Vibe => write!(f, "vibe"),
        }
    }
}

/// Errors from the extraction service.
///
/// None of these are fatal to the pipeline: a `Parse` on extraction means
/// the caller continues with `ConstraintSpec::default()`, and any error on
/// a validation call turns that filter pass into a no-op.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Could not parse extraction output: {0}")]
    Parse(String),

    #[error(transparent)]
    Provider(#[from] LlmError),
}

/// Collaborator turning prompts into structured constraints and classifying
/// candidate pools. There are no retries at this layer.
#[async_trait]
pub trait ConstraintExtractionService: Send + Sync {
    /// Extract a [`ConstraintSpec`] from a free-text prompt.
    async fn extract(&self, prompt: &str) -> Result<ConstraintSpec, ExtractionError>;

    /// Generate up to `count` catalog search queries covering the prompt.
    async fn generate_queries(
        &self,
        prompt: &str,
        spec: &ConstraintSpec,
        count: usize,
    ) -> Result<Vec<String>, ExtractionError>;

    /// Classify `candidates` against the spec for the given pass, returning
    /// the set of catalog ids to keep.
    async fn validate(
        &self,
        candidates: &[TrackCandidate],
        spec: &ConstraintSpec,
        pass: ValidationPass,
    ) -> Result<HashSet<String>, ExtractionError>;
}
