//! The playlist synthesis pipeline.
//!
//! Four stages, invoked on demand and by the refresh scheduler:
//! constraint extraction, candidate sourcing, constraint filtering and
//! selection. Stage failures degrade quality, never abort the run.

mod engine;
mod filter;
mod selector;
mod sourcer;

pub use engine::{CommitMetadata, EngineError, Preview, PreviewOverrides, SynthesisEngine};
pub use filter::{ConstraintFilter, FilterOptions};
pub use selector::Selector;
pub use sourcer::{CandidateSourcer, SourcingStrategy};
