//! Periodic playlist refresh.
//!
//! The scheduler is a pure function of stored state and the tick time: an
//! external timer calls [`RefreshScheduler::tick`] and every scheduling
//! decision is derived from the records the store returns.

mod refresh;
mod retry;

pub use refresh::{CycleOutcome, CycleReport, PlaylistCycle, RefreshScheduler, SkipReason};
pub use retry::RetryPolicy;
