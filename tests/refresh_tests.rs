//! Scheduled refresh cycles: cooldown, credential retry, commit and
//! failure handling.

mod common;

use chrono::Duration;
use common::{
    due_record, fixed_now, harness, track, FakeCatalog, FakeCredentials, FakeExtraction,
    TestHarness,
};
use tunesmith::extraction::ConstraintSpec;
use tunesmith::playlist::{PlaylistStore, TrackSignature, UpdateFrequency, UpdateMode};
use tunesmith::scheduler::{CycleOutcome, RefreshScheduler, SkipReason};

fn scheduler(h: &TestHarness) -> RefreshScheduler {
    RefreshScheduler::new(
        h.store.clone(),
        h.credentials.clone(),
        h.catalog.clone(),
        h.engine.clone(),
    )
}

fn default_harness() -> TestHarness {
    harness(
        FakeExtraction::default(),
        FakeCatalog::with_search_pool(vec![
            track("t1", "A", "One"),
            track("t2", "B", "Two"),
            track("t3", "C", "Three"),
        ]),
        FakeCredentials::healthy(),
    )
}

#[tokio::test]
async fn test_due_playlist_is_refreshed_and_rescheduled() {
    let h = default_harness();
    let record = due_record("p1", ConstraintSpec::default());
    h.store.save(&record).unwrap();

    let report = scheduler(&h).tick(fixed_now()).await;
    assert_eq!(report.committed(), 1);

    let stored = h.store.get("p1").unwrap().unwrap();
    assert_eq!(stored.track_list.len(), 3);
    assert_eq!(stored.history.len(), 3);
    assert!(stored.next_run_at.unwrap() > fixed_now());

    // The mutation hit the catalog before anything was recorded.
    let mutations = h.catalog.recorded_mutations();
    assert_eq!(mutations.len(), 1);
    assert_eq!(mutations[0].playlist_id, "p1");
    assert_eq!(mutations[0].add.len(), 3);
    assert!(mutations[0].remove.is_empty());
}

#[tokio::test]
async fn test_manual_edit_cooldown_skips_but_advances_schedule() {
    let h = default_harness();
    let mut record = due_record("p1", ConstraintSpec::default());
    record.last_manual_run_at = Some(fixed_now() - Duration::hours(2));
    h.store.save(&record).unwrap();

    let report = scheduler(&h).tick(fixed_now()).await;
    assert_eq!(report.skipped(), 1);
    assert_eq!(
        report.cycles[0].outcome,
        CycleOutcome::Skipped {
            reason: SkipReason::ManualEditCooldown
        }
    );

    let stored = h.store.get("p1").unwrap().unwrap();
    // Track list untouched; the schedule steps one interval from its
    // original time rather than re-anchoring to the tick.
    assert!(stored.track_list.is_empty());
    assert_eq!(
        stored.next_run_at.unwrap(),
        record.next_run_at.unwrap() + Duration::days(1)
    );
    assert!(h.catalog.recorded_mutations().is_empty());
}

#[tokio::test]
async fn test_cooldown_expired_refreshes_normally() {
    let h = default_harness();
    let mut record = due_record("p1", ConstraintSpec::default());
    record.last_manual_run_at = Some(fixed_now() - Duration::hours(25));
    h.store.save(&record).unwrap();

    let report = scheduler(&h).tick(fixed_now()).await;
    assert_eq!(report.committed(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_credential_refresh_fails_cycle() {
    let h = harness(
        FakeExtraction::default(),
        FakeCatalog::with_search_pool(vec![track("t1", "A", "One")]),
        FakeCredentials::always_failing(),
    );
    let record = due_record("p1", ConstraintSpec::default());
    h.store.save(&record).unwrap();

    let report = scheduler(&h).tick(fixed_now()).await;
    assert_eq!(report.failed(), 1);
    assert_eq!(h.credentials.refresh_call_count(), 3);

    let stored = h.store.get("p1").unwrap().unwrap();
    assert!(stored.history.is_empty());
    assert!(stored.track_list.is_empty());
    // The failure still advances the schedule.
    assert!(stored.next_run_at.unwrap() > fixed_now());
}

#[tokio::test(start_paused = true)]
async fn test_transient_credential_failure_recovers() {
    let mut credentials = FakeCredentials::healthy();
    credentials.failures_before_success = Some(2);
    let h = harness(
        FakeExtraction::default(),
        FakeCatalog::with_search_pool(vec![track("t1", "A", "One")]),
        credentials,
    );
    h.store
        .save(&due_record("p1", ConstraintSpec::default()))
        .unwrap();

    let report = scheduler(&h).tick(fixed_now()).await;
    assert_eq!(report.committed(), 1);
    assert_eq!(h.credentials.refresh_call_count(), 3);
}

#[tokio::test]
async fn test_catalog_mutation_failure_leaves_ledger_untouched() {
    let mut catalog = FakeCatalog::with_search_pool(vec![track("t1", "A", "One")]);
    catalog.fail_mutations = true;
    let h = harness(FakeExtraction::default(), catalog, FakeCredentials::healthy());
    h.store
        .save(&due_record("p1", ConstraintSpec::default()))
        .unwrap();

    let report = scheduler(&h).tick(fixed_now()).await;
    assert_eq!(report.failed(), 1);

    let stored = h.store.get("p1").unwrap().unwrap();
    assert!(stored.history.is_empty());
    assert!(stored.track_list.is_empty());
    assert!(stored.next_run_at.unwrap() > fixed_now());
}

#[tokio::test]
async fn test_empty_pipeline_result_is_a_failure() {
    let h = harness(
        FakeExtraction::default(),
        FakeCatalog::default(),
        FakeCredentials::healthy(),
    );
    h.store
        .save(&due_record("p1", ConstraintSpec::default()))
        .unwrap();

    let report = scheduler(&h).tick(fixed_now()).await;
    assert_eq!(report.failed(), 1);
    assert!(h.catalog.recorded_mutations().is_empty());
}

#[tokio::test]
async fn test_disabled_refresh_clears_stale_schedule() {
    let h = default_harness();
    let mut record = due_record("p1", ConstraintSpec::default());
    record.update_frequency = UpdateFrequency::Never;
    h.store.save(&record).unwrap();

    let report = scheduler(&h).tick(fixed_now()).await;
    assert_eq!(
        report.cycles[0].outcome,
        CycleOutcome::Skipped {
            reason: SkipReason::RefreshDisabled
        }
    );
    let stored = h.store.get("p1").unwrap().unwrap();
    assert!(stored.next_run_at.is_none());
}

#[tokio::test]
async fn test_history_excludes_tracks_across_cycles() {
    let h = default_harness();
    let mut record = due_record("p1", ConstraintSpec::default());
    // "One" by A was surfaced by an earlier cycle.
    record.history.record(&[TrackSignature::new("A", "One")]);
    h.store.save(&record).unwrap();

    let report = scheduler(&h).tick(fixed_now()).await;
    assert_eq!(report.committed(), 1);

    let stored = h.store.get("p1").unwrap().unwrap();
    assert_eq!(stored.track_list.len(), 2);
    assert!(stored
        .track_list
        .iter()
        .all(|entry| entry.signature != TrackSignature::new("A", "One")));
}

#[tokio::test]
async fn test_replace_mode_removes_previous_tracks() {
    let h = default_harness();
    let mut record = due_record("p1", ConstraintSpec::default());
    record.update_mode = UpdateMode::Replace;
    record.track_list = vec![tunesmith::playlist::TrackEntry {
        track_id: "old1".into(),
        title: "Stale".into(),
        artist: "Z".into(),
        signature: TrackSignature::new("Z", "Stale"),
    }];
    h.store.save(&record).unwrap();

    let report = scheduler(&h).tick(fixed_now()).await;
    assert_eq!(report.committed(), 1);

    let mutations = h.catalog.recorded_mutations();
    assert_eq!(mutations[0].remove, vec!["old1".to_string()]);

    let stored = h.store.get("p1").unwrap().unwrap();
    assert!(stored
        .track_list
        .iter()
        .all(|entry| entry.track_id != "old1"));
    assert_eq!(stored.track_list.len(), 3);
}

#[tokio::test]
async fn test_not_due_playlists_are_left_alone() {
    let h = default_harness();
    let mut record = due_record("p1", ConstraintSpec::default());
    record.next_run_at = Some(fixed_now() + Duration::hours(6));
    h.store.save(&record).unwrap();

    let report = scheduler(&h).tick(fixed_now()).await;
    assert!(report.cycles.is_empty());
    assert!(h.catalog.recorded_mutations().is_empty());
}
