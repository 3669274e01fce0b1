//! Persistent playlist record and its embedded schedule state.

use super::history::HistoryLedger;
use super::signature::TrackSignature;
use crate::extraction::ConstraintSpec;
use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How often a playlist re-runs its synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateFrequency {
    #[default]
    Never,
    Daily,
    Weekly,
    Monthly,
}

impl UpdateFrequency {
    /// Advance `from` by one interval. `None` for `Never`.
    pub fn advance(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            UpdateFrequency::Never => None,
            UpdateFrequency::Daily => Some(from + Duration::days(1)),
            UpdateFrequency::Weekly => Some(from + Duration::weeks(1)),
            UpdateFrequency::Monthly => from.checked_add_months(Months::new(1)),
        }
    }
}

impl std::fmt::Display for UpdateFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateFrequency::Never => write!(f, "never"),
            UpdateFrequency::Daily => write!(f, "daily"),
            UpdateFrequency::Weekly => write!(f, "weekly"),
            UpdateFrequency::Monthly => write!(f, "monthly"),
        }
    }
}

/// What a refresh cycle does with the existing track list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// Add new tracks, keep existing ones.
    #[default]
    Append,
    /// Atomically swap the full track set.
    Replace,
}

/// One entry of a committed track list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackEntry {
    pub track_id: String,
    pub title: String,
    pub artist: String,
    pub signature: TrackSignature,
}

/// Liked/disliked track feedback attached to a playlist.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Feedback {
    pub liked: Vec<String>,
    pub disliked: Vec<String>,
}

/// A persisted playlist with its synthesis inputs and schedule state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistRecord {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: String,
    pub track_list: Vec<TrackEntry>,
    /// The original natural-language request.
    pub prompt: String,
    /// Constraints derived from the prompt at commit time.
    pub spec: ConstraintSpec,
    pub requested_count: usize,
    pub update_frequency: UpdateFrequency,
    pub update_mode: UpdateMode,
    /// Next scheduled auto-refresh; `None` when auto-refresh is off.
    pub next_run_at: Option<DateTime<Utc>>,
    /// Last manual edit; suppresses auto-refresh for the cooldown window.
    pub last_manual_run_at: Option<DateTime<Utc>>,
    pub history: HistoryLedger,
    pub excluded_track_ids: HashSet<String>,
    pub excluded_artists: HashSet<String>,
    pub feedback: Feedback,
    /// Preferred refresh hour-of-day in the owner's timezone (0-23).
    pub preferred_hour: Option<u32>,
    /// Owner timezone as minutes east of UTC.
    pub timezone_offset_minutes: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlaylistRecord {
    /// Does the track list already contain this signature?
    pub fn contains_signature(&self, sig: &TrackSignature) -> bool {
        self.track_list.iter().any(|entry| &entry.signature == sig)
    }

    /// Signatures of the current track list.
    pub fn track_signatures(&self) -> Vec<TrackSignature> {
        self.track_list
            .iter()
            .map(|entry| entry.signature.clone())
            .collect()
    }

    /// Everything a sourcing run must not surface again: ledger entries
    /// plus the signatures currently in the list.
    pub fn excluded_signatures(&self) -> HashSet<TrackSignature> {
        let mut set = self.history.as_set();
        set.extend(self.track_signatures());
        set
    }

    /// Whether auto-refresh is enabled at all.
    pub fn auto_refresh_enabled(&self) -> bool {
        self.update_frequency != UpdateFrequency::Never
    }

    /// Record a manual edit, starting the cooldown window.
    pub fn mark_manual_edit(&mut self, now: DateTime<Utc>) {
        self.last_manual_run_at = Some(now);
        self.updated_at = now;
    }

    /// Compute the next run strictly after `now`, honoring frequency and
    /// the optional preferred refresh hour in the owner's timezone.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut next = self.update_frequency.advance(now)?;

        if let Some(hour) = self.preferred_hour {
            let offset = Duration::minutes(self.timezone_offset_minutes.unwrap_or(0) as i64);
            let local = next + offset;
            let adjusted = local
                .date_naive()
                .and_hms_opt(hour.min(23), 0, 0)
                .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc) - offset);
            if let Some(at_hour) = adjusted {
                next = at_hour;
            }
        }

        // Hour adjustment may have pulled the run into the past.
        while next <= now {
            next = self.update_frequency.advance(next)?;
        }
        Some(next)
    }

    /// Advance the stored schedule past `now` without re-anchoring it: the
    /// existing `next_run_at` is stepped by whole intervals until strictly
    /// in the future. `None` when no run is scheduled.
    pub fn next_run_from_schedule(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut next = self.next_run_at?;
        while next <= now {
            next = self.update_frequency.advance(next)?;
        }
        Some(next)
    }
}
