//! Constraint extraction from natural-language prompts.
//!
//! Turns a free-text request like "90s R&B for a late drive, no remixes"
//! into a structured [`ConstraintSpec`] via an LLM call, and provides the
//! secondary validation calls used by the genre and vibe filter passes.
//! Parse failures are never fatal: callers fall back to the all-unset
//! default spec and keep going.

mod decode;
mod llm_extractor;
mod prompts;
mod service;
mod spec;

pub use decode::decode_json_block;
pub use llm_extractor::LlmConstraintExtractor;
pub use service::{ConstraintExtractionService, ExtractionError, ValidationPass};
pub use spec::{
    AudioFeatureRanges, ConstraintSpec, Era, FeatureRange, PopularityPreference,
};
