//! End-to-end passes against in-memory calendars.

use chrono::DateTime;
use omnical_core::{ErrorKind, Side};
use omnical_core::remote::{CalendarRemote, MemoryRemote, RemoteCall, TransportError};
use omnical_core::state::{JsonStateStore, MemoryStateStore, Origin, StateStore};
use omnical_core::sync::{
    CancelToken, ReconciliationAction, SkipReason, SyncMode, SyncPolicy, plan_pass, run_pass,
    sync_busy_only, sync_one_way, sync_two_way,
};

fn ics(uid: &str, summary: &str, t: i64) -> String {
    let stamp = DateTime::from_timestamp(t, 0)
        .unwrap()
        .format("%Y%m%dT%H%M%SZ");
    format!(
        "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//test//EN\r\nBEGIN:VEVENT\r\nUID:{uid}\r\nSUMMARY:{summary}\r\nDESCRIPTION:Notes for {summary}\r\nLAST-MODIFIED:{stamp}\r\nDTSTAMP:{stamp}\r\nDTSTART:20250320T150000Z\r\nDTEND:20250320T160000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n"
    )
}

/// An event a remote returns without LAST-MODIFIED or DTSTAMP.
fn unstamped(uid: &str, summary: &str) -> String {
    format!(
        "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:{uid}\r\nSUMMARY:{summary}\r\nDTSTART:20250320T150000Z\r\nDTEND:20250320T160000Z\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n"
    )
}

fn calendars() -> (MemoryRemote, MemoryRemote) {
    (MemoryRemote::new("a:cal"), MemoryRemote::new("b:cal"))
}

#[tokio::test]
async fn test_new_event_created_once_then_noop() {
    let (a, b) = calendars();
    let mut state = MemoryStateStore::new();
    a.insert(ics("U1", "Meeting", 100));

    let summary = sync_two_way(&a, &b, &mut state).await.unwrap();
    assert_eq!(summary.b.created, 1);
    assert_eq!(b.get("U1"), a.get("U1"));
    assert_eq!(state.get("U1").unwrap().origin, Origin::A);

    a.clear_calls();
    b.clear_calls();
    for _ in 0..2 {
        let summary = sync_two_way(&a, &b, &mut state).await.unwrap();
        assert_eq!(summary.changed(), 0);
        assert!(summary.is_clean());
    }
    assert!(a.mutations().is_empty());
    assert!(b.mutations().is_empty());
}

#[tokio::test]
async fn test_double_edit_later_timestamp_wins() {
    let (a, b) = calendars();
    let mut state = MemoryStateStore::new();
    a.insert(ics("U2", "Planning", 100));
    sync_two_way(&a, &b, &mut state).await.unwrap();

    a.insert(ics("U2", "Planning (moved by A)", 200));
    b.insert(ics("U2", "Planning (moved by B)", 150));

    let summary = sync_two_way(&a, &b, &mut state).await.unwrap();
    assert_eq!(summary.b.updated, 1);
    assert_eq!(summary.a.updated, 0);
    assert_eq!(b.get("U2"), Some(ics("U2", "Planning (moved by A)", 200)));
    assert!(summary.conflicts.is_empty());
}

#[tokio::test]
async fn test_two_way_converges_from_both_sides() {
    let (a, b) = calendars();
    let mut state = MemoryStateStore::new();
    a.insert(ics("from-a", "Review", 100));
    b.insert(ics("from-b", "Dinner", 120));

    let summary = sync_two_way(&a, &b, &mut state).await.unwrap();
    assert_eq!(summary.a.created, 1);
    assert_eq!(summary.b.created, 1);
    assert_eq!(a.events(), b.events());
    assert_eq!(state.get("from-b").unwrap().origin, Origin::B);
}

#[tokio::test]
async fn test_two_way_deletion_propagates() {
    let (a, b) = calendars();
    let mut state = MemoryStateStore::new();
    a.insert(ics("u1", "Review", 100));
    sync_two_way(&a, &b, &mut state).await.unwrap();

    b.remove("u1");
    let summary = sync_two_way(&a, &b, &mut state).await.unwrap();
    assert_eq!(summary.a.deleted, 1);
    assert!(a.is_empty());
    assert!(state.is_empty());
}

#[tokio::test]
async fn test_conflict_is_reported_and_a_wins() {
    let (a, b) = calendars();
    let mut state = MemoryStateStore::new();
    a.insert(ics("u1", "Sync", 100));
    sync_two_way(&a, &b, &mut state).await.unwrap();

    a.insert(ics("u1", "Sync (A)", 200));
    b.insert(ics("u1", "Sync (B)", 200));

    let summary = sync_two_way(&a, &b, &mut state).await.unwrap();
    assert_eq!(summary.conflicts.len(), 1);
    assert_eq!(summary.conflicts[0].uid, "u1");
    assert_eq!(b.get("u1"), Some(ics("u1", "Sync (A)", 200)));
}

#[tokio::test]
async fn test_busy_only_ignores_real_source_event() {
    let (source, target) = calendars();
    let mut state = MemoryStateStore::new();
    source.insert(ics("U3", "Lunch", 100));

    let summary = sync_busy_only(&source, &target, &mut state).await.unwrap();
    assert!(target.is_empty());
    assert!(target.mutations().is_empty());
    assert_eq!(summary.a.skipped, 1);
    assert_eq!(summary.skipped[0].reason, SkipReason::Filtered);
}

#[tokio::test]
async fn test_busy_placeholder_lifecycle() {
    let (source, target) = calendars();
    let mut state = MemoryStateStore::new();
    source.insert(ics("U4", "Busy", 100));

    let summary = sync_busy_only(&source, &target, &mut state).await.unwrap();
    assert_eq!(summary.b.created, 1);
    assert_eq!(state.get("U4").unwrap().origin, Origin::Engine);
    let placeholder = target.get("U4").unwrap();
    assert!(placeholder.contains("SUMMARY:Busy"));
    assert!(!placeholder.contains("DESCRIPTION"));

    source.remove("U4");
    let summary = sync_busy_only(&source, &target, &mut state).await.unwrap();
    assert_eq!(summary.b.deleted, 1);
    assert!(target.is_empty());
    assert!(state.get("U4").is_none());

    target.clear_calls();
    let summary = sync_busy_only(&source, &target, &mut state).await.unwrap();
    assert_eq!(summary.changed(), 0);
    assert!(target.mutations().is_empty());
}

#[tokio::test]
async fn test_busy_projection_hides_content_and_follows_edits() {
    let (source, target) = calendars();
    let mut state = MemoryStateStore::new();
    let policy = SyncPolicy::busy_only_projecting_all();
    source.insert(ics("u1", "Salary talk", 100));

    run_pass(&policy, &source, &target, &mut state, &CancelToken::new())
        .await
        .unwrap();
    let placeholder = target.get("u1").unwrap();
    assert!(!placeholder.contains("Salary"));
    assert!(placeholder.contains("LAST-MODIFIED:19700101T000140Z"));

    source.insert(ics("u1", "Salary talk (moved)", 300));
    let summary = run_pass(&policy, &source, &target, &mut state, &CancelToken::new())
        .await
        .unwrap();
    assert_eq!(summary.b.updated, 1);
    assert!(target.get("u1").unwrap().contains("LAST-MODIFIED:19700101T000500Z"));
}

#[tokio::test]
async fn test_busy_only_never_touches_real_target_events() {
    let (source, target) = calendars();
    let mut state = MemoryStateStore::new();
    let policy = SyncPolicy::busy_only_projecting_all();

    source.insert(ics("shared", "Standup", 200));
    source.insert(ics("p1", "Busy", 100));
    target.insert(ics("shared", "Dentist", 100));
    target.insert(ics("gym", "Gym", 100));
    let before = target.events();

    let summary = run_pass(&policy, &source, &target, &mut state, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(target.mutations(), vec![RemoteCall::Create("p1".into())]);
    assert_eq!(target.get("shared"), before.get("shared").cloned());
    assert_eq!(target.get("gym"), before.get("gym").cloned());
    assert!(
        summary
            .skipped
            .iter()
            .any(|s| s.uid == "shared" && s.reason == SkipReason::ForeignTarget)
    );
}

#[tokio::test]
async fn test_one_way_only_deletes_what_it_created() {
    let (source, target) = calendars();
    let mut state = MemoryStateStore::new();

    source.insert(ics("ours", "Review", 100));
    source.insert(ics("shared", "Offsite", 100));
    target.insert(ics("shared", "Offsite (my notes)", 150));
    target.insert(ics("native", "Piano", 100));

    let summary = sync_one_way(&source, &target, &mut state).await.unwrap();
    assert_eq!(summary.b.created, 1);
    assert_eq!(state.get("shared").unwrap().origin, Origin::B);

    source.remove("ours");
    source.remove("shared");
    let summary = sync_one_way(&source, &target, &mut state).await.unwrap();

    assert_eq!(summary.b.deleted, 1);
    assert!(!target.has("ours"));
    assert!(target.has("shared"));
    assert!(target.has("native"));
    assert!(source.mutations().is_empty());
}

#[tokio::test]
async fn test_busy_mapping_round_trip_settles() {
    let (work, home) = calendars();
    let mut busy_state = MemoryStateStore::new();
    let mut back_state = MemoryStateStore::new();
    let busy = SyncPolicy::busy_only_projecting_all();
    let back = SyncPolicy::one_way_excluding_busy();
    let cancel = CancelToken::new();

    work.insert(ics("standup", "Standup", 100));
    home.insert(ics("dentist", "Dentist", 100));

    run_pass(&busy, &work, &home, &mut busy_state, &cancel)
        .await
        .unwrap();
    run_pass(&back, &home, &work, &mut back_state, &cancel)
        .await
        .unwrap();

    assert!(home.get("standup").unwrap().contains("SUMMARY:Busy"));
    assert_eq!(work.get("dentist"), home.get("dentist"));

    work.clear_calls();
    home.clear_calls();
    run_pass(&busy, &work, &home, &mut busy_state, &cancel)
        .await
        .unwrap();
    run_pass(&back, &home, &work, &mut back_state, &cancel)
        .await
        .unwrap();

    assert!(work.mutations().is_empty());
    assert!(home.mutations().is_empty());
    assert_eq!(work.len(), 2);
    assert_eq!(home.len(), 2);
}

#[tokio::test]
async fn test_state_write_failure_is_reported_without_duplicates() {
    let (a, b) = calendars();
    let mut state = MemoryStateStore::new();
    a.insert(ics("u1", "Retro", 100));
    state.fail_writes_for("u1");

    let summary = sync_two_way(&a, &b, &mut state).await.unwrap();
    assert!(b.has("u1"));
    assert_eq!(summary.b.failed, 1);
    assert_eq!(summary.failures[0].kind, ErrorKind::Persistence);
    assert!(state.get("u1").is_none());

    state.heal();
    b.clear_calls();
    let summary = sync_two_way(&a, &b, &mut state).await.unwrap();
    assert!(b.mutations().is_empty());
    assert!(summary.is_clean());
    assert_eq!(state.get("u1").unwrap().origin, Origin::A);
}

#[tokio::test]
async fn test_one_way_recovers_ownership_after_state_write_failure() {
    let (source, target) = calendars();
    let mut state = MemoryStateStore::new();
    source.insert(ics("u1", "Retro", 100));
    state.fail_writes_for("u1");

    let summary = sync_one_way(&source, &target, &mut state).await.unwrap();
    assert!(target.has("u1"));
    assert_eq!(summary.failures[0].kind, ErrorKind::Persistence);

    state.heal();
    target.clear_calls();
    let summary = sync_one_way(&source, &target, &mut state).await.unwrap();
    assert!(target.mutations().is_empty());
    assert!(summary.is_clean());
    assert_eq!(state.get("u1").unwrap().origin, Origin::A);

    source.remove("u1");
    let summary = sync_one_way(&source, &target, &mut state).await.unwrap();
    assert_eq!(summary.b.deleted, 1);
    assert!(!target.has("u1"));
    assert!(state.is_empty());
}

#[tokio::test]
async fn test_transport_failure_is_isolated() {
    let (a, b) = calendars();
    let mut state = MemoryStateStore::new();
    a.insert(ics("bad", "Rejected", 100));
    a.insert(ics("good", "Accepted", 100));
    b.fail_uid("bad", TransportError::Rejected("quota".into()));

    let summary = sync_two_way(&a, &b, &mut state).await.unwrap();
    assert_eq!(summary.b.created, 1);
    assert_eq!(summary.b.failed, 1);
    assert_eq!(summary.failures[0].uid, "bad");
    assert_eq!(summary.failures[0].action, ReconciliationAction::CreateOnB);
    assert_eq!(summary.failures[0].kind, ErrorKind::Transport);
    assert!(state.get("bad").is_none());

    b.heal();
    let summary = sync_two_way(&a, &b, &mut state).await.unwrap();
    assert_eq!(summary.b.created, 1);
    assert!(b.has("bad"));
}

#[tokio::test]
async fn test_delete_of_missing_event_succeeds() {
    let (a, b) = calendars();
    let mut state = MemoryStateStore::new();
    a.insert(ics("u1", "Call", 100));
    sync_two_way(&a, &b, &mut state).await.unwrap();

    a.remove("u1");
    b.fail_uid("u1", TransportError::NotFound("u1".into()));

    let summary = sync_two_way(&a, &b, &mut state).await.unwrap();
    assert!(summary.is_clean());
    assert_eq!(summary.b.deleted, 1);
    assert!(state.get("u1").is_none());
}

#[tokio::test]
async fn test_create_collision_falls_back_to_update() {
    let (a, b) = calendars();
    let mut state = MemoryStateStore::new();
    a.insert(ics("u1", "Lunch", 200));
    b.insert(ics("u1", "Stale copy", 100));
    b.hide("u1");

    let summary = sync_two_way(&a, &b, &mut state).await.unwrap();
    assert!(summary.is_clean());
    assert_eq!(
        b.mutations(),
        vec![RemoteCall::Create("u1".into()), RemoteCall::Update("u1".into())]
    );
    assert_eq!(b.get("u1"), a.get("u1"));
}

#[tokio::test]
async fn test_listing_failure_aborts_pass() {
    let (a, b) = calendars();
    let mut state = MemoryStateStore::new();
    a.insert(ics("u1", "Call", 100));
    b.fail_next_list(TransportError::Unavailable("offline".into()));

    let result = sync_two_way(&a, &b, &mut state).await;
    assert!(matches!(
        result,
        Err(omnical_core::OmnicalError::Transport(TransportError::Unavailable(_)))
    ));
    assert!(b.mutations().is_empty());
    assert!(state.is_empty());
}

#[tokio::test]
async fn test_cancelled_pass_applies_nothing() {
    let (a, b) = calendars();
    let mut state = MemoryStateStore::new();
    a.insert(ics("u1", "Call", 100));
    let cancel = CancelToken::new();
    cancel.cancel();

    let summary = run_pass(&SyncPolicy::two_way(), &a, &b, &mut state, &cancel)
        .await
        .unwrap();
    assert!(summary.cancelled);
    assert!(b.mutations().is_empty());
    assert!(state.is_empty());
}

#[tokio::test]
async fn test_plan_pass_changes_nothing() {
    let (a, b) = calendars();
    let state = MemoryStateStore::new();
    a.insert(ics("u1", "Call", 100));

    let plan = plan_pass(&SyncPolicy::two_way(), &a, &b, &state)
        .await
        .unwrap();
    assert_eq!(plan.action_for("u1"), Some(ReconciliationAction::CreateOnB));
    assert!(b.is_empty());
    assert_eq!(b.calls(), vec![RemoteCall::List]);
}

#[tokio::test]
async fn test_unreadable_events_are_skipped() {
    let (a, b) = calendars();
    let mut state = MemoryStateStore::new();
    a.insert(
        "BEGIN:VCALENDAR\r\nBEGIN:VEVENT\r\nUID:no-stamp\r\nSUMMARY:x\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n",
    );
    a.insert(ics("ok", "Fine", 100));

    let summary = sync_two_way(&a, &b, &mut state).await.unwrap();
    assert_eq!(summary.b.created, 1);
    assert_eq!(summary.a.skipped, 1);
    assert_eq!(summary.skipped[0].reason, SkipReason::MissingTimestamp);
    assert!(!b.has("no-stamp"));
}

#[tokio::test]
async fn test_json_state_survives_between_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a__cal__b__cal__full.json");
    let (a, b) = calendars();
    a.insert(ics("u1", "Call", 100));

    {
        let mut state = JsonStateStore::open(&path, SyncMode::TwoWay).unwrap();
        sync_two_way(&a, &b, &mut state).await.unwrap();
    }

    b.clear_calls();
    let mut state = JsonStateStore::open(&path, SyncMode::TwoWay).unwrap();
    assert_eq!(state.len(), 1);
    let summary = sync_two_way(&a, &b, &mut state).await.unwrap();
    assert_eq!(summary.changed(), 0);
    assert!(b.mutations().is_empty());
    assert_eq!(b.label(), "b:cal");
}

#[tokio::test]
async fn test_unreadable_synced_event_is_not_deleted_elsewhere() {
    let (a, b) = calendars();
    let mut state = MemoryStateStore::new();
    a.insert(ics("u1", "Call", 100));
    sync_two_way(&a, &b, &mut state).await.unwrap();

    // The source copy loses its timestamps
    a.insert(unstamped("u1", "Call"));
    b.clear_calls();
    let summary = sync_two_way(&a, &b, &mut state).await.unwrap();

    assert!(b.mutations().is_empty());
    assert!(a.mutations().is_empty());
    assert!(b.has("u1"));
    assert!(state.get("u1").is_some());
    assert_eq!(summary.a.skipped, 1);
    assert_eq!(summary.skipped[0].reason, SkipReason::MissingTimestamp);
}

#[tokio::test]
async fn test_unreadable_target_event_is_not_deleted_from_source() {
    let (a, b) = calendars();
    let mut state = MemoryStateStore::new();
    a.insert(ics("u1", "Call", 100));
    sync_two_way(&a, &b, &mut state).await.unwrap();

    b.insert(unstamped("u1", "Call"));
    a.clear_calls();
    let summary = sync_two_way(&a, &b, &mut state).await.unwrap();

    assert!(a.mutations().is_empty());
    assert!(b.mutations().is_empty());
    assert!(a.has("u1"));
    assert!(state.get("u1").is_some());
    assert_eq!(summary.b.skipped, 1);
}

#[tokio::test]
async fn test_busy_only_leaves_unreadable_target_event_alone() {
    let (source, target) = calendars();
    let mut state = MemoryStateStore::new();
    source.insert(ics("x", "Busy", 100));
    target.insert(unstamped("x", "Dentist"));

    let summary = sync_busy_only(&source, &target, &mut state).await.unwrap();

    assert!(target.mutations().is_empty());
    assert!(target.get("x").unwrap().contains("SUMMARY:Dentist"));
    assert!(state.get("x").is_none());
    assert!(
        summary
            .skipped
            .iter()
            .any(|s| s.uid == "x" && s.side == Side::B && s.reason == SkipReason::MissingTimestamp)
    );
}

#[tokio::test]
async fn test_busy_only_create_collision_does_not_overwrite() {
    let (source, target) = calendars();
    let mut state = MemoryStateStore::new();
    source.insert(ics("x", "Busy", 100));
    target.insert(ics("x", "Dentist", 100));
    target.hide("x");

    let summary = sync_busy_only(&source, &target, &mut state).await.unwrap();

    assert_eq!(target.mutations(), vec![RemoteCall::Create("x".into())]);
    assert!(target.get("x").unwrap().contains("SUMMARY:Dentist"));
    assert_eq!(summary.b.failed, 1);
    assert_eq!(summary.failures[0].kind, ErrorKind::Transport);
    assert!(state.get("x").is_none());
}
