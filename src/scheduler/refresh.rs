//! The refresh scheduler.
//!
//! One `tick` processes every due playlist sequentially, respecting
//! external rate limits and the single-writer assumption on the credential
//! store. Per playlist the cycle moves Idle → Due → Running → {Committed,
//! Skipped, Failed}; whatever the outcome, `next_run_at` is advanced so a
//! playlist never re-fires on the very next tick.

use super::retry::RetryPolicy;
use crate::catalog::CatalogService;
use crate::credentials::{CredentialError, CredentialStore, Credentials};
use crate::pipeline::SynthesisEngine;
use crate::playlist::{
    PlaylistRecord, PlaylistStore, TrackEntry, TrackSignature, UpdateMode,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Why a due playlist was skipped this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A manual edit within the cooldown window suppresses auto-refresh.
    ManualEditCooldown,
    /// Auto-refresh was disabled between scheduling and the tick.
    RefreshDisabled,
}

/// Terminal state of one playlist's refresh cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Committed { added: usize },
    Skipped { reason: SkipReason },
    Failed { reason: String },
}

/// One playlist's entry in a tick report.
#[derive(Debug, Clone)]
pub struct PlaylistCycle {
    pub playlist_id: String,
    pub outcome: CycleOutcome,
}

/// Summary of one scheduler pass.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub tick_at: DateTime<Utc>,
    pub cycles: Vec<PlaylistCycle>,
}

impl CycleReport {
    pub fn committed(&self) -> usize {
        self.count(|o| matches!(o, CycleOutcome::Committed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, CycleOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, CycleOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&CycleOutcome) -> bool) -> usize {
        self.cycles.iter().filter(|c| pred(&c.outcome)).count()
    }
}

pub struct RefreshScheduler {
    store: Arc<dyn PlaylistStore>,
    credentials: Arc<dyn CredentialStore>,
    catalog: Arc<dyn CatalogService>,
    engine: Arc<SynthesisEngine>,
    retry: RetryPolicy,
    cooldown: Duration,
}

impl RefreshScheduler {
    pub fn new(
        store: Arc<dyn PlaylistStore>,
        credentials: Arc<dyn CredentialStore>,
        catalog: Arc<dyn CatalogService>,
        engine: Arc<SynthesisEngine>,
    ) -> Self {
        Self {
            store,
            credentials,
            catalog,
            engine,
            retry: RetryPolicy::default(),
            cooldown: Duration::hours(24),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// One scheduler pass over every playlist due at `now`.
    ///
    /// Idempotent while state is unchanged: due-ness is re-evaluated from
    /// the stored `next_run_at` each call. No playlist is processed twice
    /// within one tick. Errors never escape to the caller; they become
    /// `Failed` cycle outcomes and log lines.
    pub async fn tick(&self, now: DateTime<Utc>) -> CycleReport {
        let due = match self.store.load_due(now) {
            Ok(due) => due,
            Err(e) => {
                error!("Could not load due playlists: {}", e);
                return CycleReport {
                    tick_at: now,
                    cycles: vec![],
                };
            }
        };
        debug!(due = due.len(), "Scheduler tick");

        let mut seen: HashSet<String> = HashSet::new();
        let mut cycles = Vec::with_capacity(due.len());

        for record in due {
            if !seen.insert(record.id.clone()) {
                continue;
            }
            let playlist_id = record.id.clone();
            let outcome = self.process(record, now).await;
            match &outcome {
                CycleOutcome::Committed { added } => {
                    info!(playlist = %playlist_id, added, "Refresh committed");
                }
                CycleOutcome::Skipped { reason } => {
                    debug!(playlist = %playlist_id, ?reason, "Refresh skipped");
                }
                CycleOutcome::Failed { reason } => {
                    warn!(playlist = %playlist_id, %reason, "Refresh failed");
                }
            }
            cycles.push(PlaylistCycle {
                playlist_id,
                outcome,
            });
        }

        CycleReport {
            tick_at: now,
            cycles,
        }
    }

    /// Run one playlist's cycle to a terminal state. Schedule bookkeeping
    /// is advanced on every path so `next_run_at` stays strictly in the
    /// future.
    async fn process(&self, mut record: PlaylistRecord, now: DateTime<Utc>) -> CycleOutcome {
        if !record.auto_refresh_enabled() {
            record.next_run_at = None;
            self.save_bookkeeping(&record);
            return CycleOutcome::Skipped {
                reason: SkipReason::RefreshDisabled,
            };
        }

        // Cooldown: a recent manual edit suppresses this cycle but the
        // schedule still advances past it, keeping its original anchor.
        if let Some(manual) = record.last_manual_run_at {
            if now - manual < self.cooldown {
                record.next_run_at = record
                    .next_run_from_schedule(now)
                    .or_else(|| record.next_run_after(now));
                self.save_bookkeeping(&record);
                return CycleOutcome::Skipped {
                    reason: SkipReason::ManualEditCooldown,
                };
            }
        }

        // Due → Running requires a fresh access token.
        let credentials = match self.refresh_credentials(&record.owner_id).await {
            Ok(credentials) => credentials,
            Err(e) => {
                record.next_run_at = record.next_run_after(now);
                self.save_bookkeeping(&record);
                return CycleOutcome::Failed {
                    reason: format!("credential refresh exhausted: {}", e),
                };
            }
        };

        let excluded = record.excluded_signatures();
        let selected = self
            .engine
            .synthesize(
                &credentials.access_token,
                &record.prompt,
                &record.spec,
                &excluded,
                &record.excluded_track_ids,
                &record.excluded_artists,
                record.requested_count,
            )
            .await;

        if selected.is_empty() {
            record.next_run_at = record.next_run_after(now);
            self.save_bookkeeping(&record);
            return CycleOutcome::Failed {
                reason: "pipeline produced no usable tracks".into(),
            };
        }

        let add: Vec<String> = selected.iter().map(|c| c.id.clone()).collect();
        let remove: Vec<String> = match record.update_mode {
            UpdateMode::Append => vec![],
            UpdateMode::Replace => record
                .track_list
                .iter()
                .map(|entry| entry.track_id.clone())
                .collect(),
        };

        if let Err(e) = self
            .catalog
            .mutate_playlist(&credentials.access_token, &record.id, &add, &remove)
            .await
        {
            // Ledger and track list stay untouched: the ledger must never
            // record tracks that were not actually written.
            record.next_run_at = record.next_run_after(now);
            self.save_bookkeeping(&record);
            return CycleOutcome::Failed {
                reason: format!("catalog mutation failed: {}", e),
            };
        }

        let new_entries: Vec<TrackEntry> = selected
            .iter()
            .map(|c| TrackEntry {
                track_id: c.id.clone(),
                title: c.title.clone(),
                artist: c.primary_artist().to_string(),
                signature: TrackSignature::of(c),
            })
            .collect();
        let new_signatures: Vec<TrackSignature> = new_entries
            .iter()
            .map(|entry| entry.signature.clone())
            .collect();

        match record.update_mode {
            UpdateMode::Append => record.track_list.extend(new_entries),
            UpdateMode::Replace => record.track_list = new_entries,
        }
        record.history.record(&new_signatures);
        record.next_run_at = record.next_run_after(now);
        record.updated_at = now;
        self.save_bookkeeping(&record);

        CycleOutcome::Committed {
            added: new_signatures.len(),
        }
    }

    /// Refresh credentials with bounded exponential backoff.
    async fn refresh_credentials(&self, user_id: &str) -> Result<Credentials, CredentialError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.credentials.refresh(user_id).await {
                Ok(credentials) => return Ok(credentials),
                Err(e) => {
                    let delay = if e.is_retryable() {
                        self.retry.delay_after(attempt)
                    } else {
                        None
                    };
                    match delay {
                        Some(delay) => {
                            warn!(
                                %user_id,
                                attempt,
                                "Credential refresh failed, retrying in {:?}: {}",
                                delay,
                                e
                            );
                            tokio::time::sleep(delay).await;
                        }
                        None => return Err(e),
                    }
                }
            }
        }
    }

    /// Persist schedule/ledger bookkeeping. A store failure here is logged
    /// and swallowed: the next tick re-evaluates from whatever state won.
    fn save_bookkeeping(&self, record: &PlaylistRecord) {
        if let Err(e) = self.store.save(record) {
            error!(playlist = %record.id, "Could not persist schedule state: {}", e);
        }
    }
}
