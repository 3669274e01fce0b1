//! Per-playlist record of previously-surfaced track identities.

use super::signature::TrackSignature;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

/// Maximum signatures retained per playlist. Oldest evicted first.
pub const HISTORY_CAP: usize = 200;

/// Bounded FIFO ledger of signatures already surfaced by earlier cycles.
///
/// Append-only except for eviction; entries only ever leave via the cap or
/// full playlist deletion. Consulted by the sourcer and filter so refresh
/// cycles never repeat a track, and updated only after a successful commit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryLedger {
    entries: VecDeque<TrackSignature>,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, sig: &TrackSignature) -> bool {
        self.entries.contains(sig)
    }

    /// Record newly-surfaced signatures, evicting oldest entries beyond the
    /// cap. Signatures already present are not duplicated but move to the
    /// back (they are the most recently surfaced again).
    pub fn record(&mut self, sigs: &[TrackSignature]) {
        for sig in sigs {
            if let Some(pos) = self.entries.iter().position(|s| s == sig) {
                self.entries.remove(pos);
            }
            self.entries.push_back(sig.clone());
        }
        while self.entries.len() > HISTORY_CAP {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All retained signatures, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &TrackSignature> {
        self.entries.iter()
    }

    /// The retained signatures as a lookup set.
    pub fn as_set(&self) -> HashSet<TrackSignature> {
        self.entries.iter().cloned().collect()
    }

    /// Rebuild from stored entries, trimming anything beyond the cap.
    pub fn from_entries(entries: Vec<TrackSignature>) -> Self {
        let skip = entries.len().saturating_sub(HISTORY_CAP);
        Self {
            entries: entries.into_iter().skip(skip).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(n: usize) -> TrackSignature {
        TrackSignature::new(&format!("artist {}", n), &format!("title {}", n))
    }

    #[test]
    fn test_record_and_contains() {
        let mut ledger = HistoryLedger::new();
        ledger.record(&[sig(1), sig(2)]);
        assert!(ledger.contains(&sig(1)));
        assert!(!ledger.contains(&sig(3)));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_fifo_eviction_at_cap() {
        let mut ledger = HistoryLedger::new();
        let sigs: Vec<_> = (0..HISTORY_CAP + 50).map(sig).collect();
        ledger.record(&sigs);

        assert_eq!(ledger.len(), HISTORY_CAP);
        // The 50 oldest are gone, the 200 most recent retained.
        assert!(!ledger.contains(&sig(0)));
        assert!(!ledger.contains(&sig(49)));
        assert!(ledger.contains(&sig(50)));
        assert!(ledger.contains(&sig(HISTORY_CAP + 49)));
    }

    #[test]
    fn test_re_recording_moves_to_back() {
        let mut ledger = HistoryLedger::new();
        ledger.record(&[sig(1), sig(2), sig(3)]);
        ledger.record(&[sig(1)]);

        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.iter().last(), Some(&sig(1)));
    }

    #[test]
    fn test_from_entries_trims_overflow() {
        let entries: Vec<_> = (0..HISTORY_CAP + 10).map(sig).collect();
        let ledger = HistoryLedger::from_entries(entries);
        assert_eq!(ledger.len(), HISTORY_CAP);
        assert!(!ledger.contains(&sig(9)));
        assert!(ledger.contains(&sig(10)));
    }
}
