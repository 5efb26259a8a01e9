//! Reconciliation passes: fetch, reconcile, apply.

use std::collections::BTreeSet;
use std::collections::btree_map::Entry;

use tracing::{Instrument, debug, info, info_span, warn};

use crate::error::{OmnicalError, OmnicalResult};
use crate::event::{EventRecord, Side, Snapshot};
use crate::remote::{CalendarRemote, RawEvent};
use crate::state::StateStore;
use crate::sync::action::{Plan, SkipReason, Skipped};
use crate::sync::apply::{CancelToken, Remotes, apply_plan};
use crate::sync::policy::SyncPolicy;
use crate::sync::reconcile::reconcile_with_unreadable;
use crate::sync::summary::RunSummary;

/// Turn raw events into a snapshot, setting aside the ones that can't be used.
///
/// When the same identifier appears twice the later modification wins.
pub fn build_snapshot(side: Side, raw: Vec<RawEvent>) -> (Snapshot, Vec<Skipped>) {
    let mut snapshot = Snapshot::new();
    let mut skipped = Vec::new();

    for event in raw {
        let record = match EventRecord::from_ics(event.ics) {
            Ok(record) => record,
            Err(e) => {
                let (uid, reason) = match e {
                    OmnicalError::MissingTimestamp(uid) => (uid, SkipReason::MissingTimestamp),
                    _ => (String::new(), SkipReason::InvalidPayload),
                };
                warn!(%side, uid = %uid, %reason, "Skipping event");
                skipped.push(Skipped { uid, side, reason });
                continue;
            }
        };

        match snapshot.entry(record.uid.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                warn!(%side, uid = %record.uid, "Identifier listed twice, keeping the later one");
                if record.modified > slot.get().modified {
                    slot.insert(record);
                }
            }
        }
    }

    (snapshot, skipped)
}

async fn fetch_snapshots(remotes: Remotes<'_>) -> OmnicalResult<(Snapshot, Snapshot, Vec<Skipped>)> {
    let (raw_a, raw_b) = tokio::join!(remotes.a.list_events(), remotes.b.list_events());
    let raw_a = raw_a?;
    let raw_b = raw_b?;

    debug!(a = raw_a.len(), b = raw_b.len(), "Fetched snapshots");

    let (a, mut skipped) = build_snapshot(Side::A, raw_a);
    let (b, skipped_b) = build_snapshot(Side::B, raw_b);
    skipped.extend(skipped_b);

    Ok((a, b, skipped))
}

/// Fetch both sides and compute what a pass would do, without applying it.
pub async fn plan_pass(
    policy: &SyncPolicy,
    a: &dyn CalendarRemote,
    b: &dyn CalendarRemote,
    state: &dyn StateStore,
) -> OmnicalResult<Plan> {
    let remotes = Remotes { a, b };
    let (snap_a, snap_b, mut unreadable) = fetch_snapshots(remotes).await?;

    // Unreadable records still exist on their side
    let held: BTreeSet<String> = unreadable
        .iter()
        .filter(|s| !s.uid.is_empty())
        .map(|s| s.uid.clone())
        .collect();

    let mut plan =
        reconcile_with_unreadable(&snap_a, &snap_b, &state.snapshot_all(), policy, &held);
    unreadable.append(&mut plan.skipped);
    plan.skipped = unreadable;

    for conflict in &plan.conflicts {
        warn!(uid = %conflict.uid, modified = %conflict.modified, "Both sides changed at the same time, keeping A");
    }

    Ok(plan)
}

/// Run one full pass for `policy`.
///
/// Listing failures abort the pass before anything is changed. Failures of
/// individual changes are reported in the summary.
pub async fn run_pass(
    policy: &SyncPolicy,
    a: &dyn CalendarRemote,
    b: &dyn CalendarRemote,
    state: &mut dyn StateStore,
    cancel: &CancelToken,
) -> OmnicalResult<RunSummary> {
    let span = info_span!("pass", mode = %policy.mode, a = %a.label(), b = %b.label());

    async move {
        let plan = plan_pass(policy, a, b, state).await?;
        debug!(
            changes = plan.changes.len(),
            skipped = plan.skipped.len(),
            "Planned pass"
        );

        let summary = apply_plan(plan, Remotes { a, b }, state, policy, cancel).await;

        info!(
            changed = summary.changed(),
            failed = summary.failures.len(),
            conflicts = summary.conflicts.len(),
            "Pass complete"
        );
        Ok::<_, OmnicalError>(summary)
    }
    .instrument(span)
    .await
}

/// Mirror two calendars in both directions.
pub async fn sync_two_way(
    a: &dyn CalendarRemote,
    b: &dyn CalendarRemote,
    state: &mut dyn StateStore,
) -> OmnicalResult<RunSummary> {
    run_pass(&SyncPolicy::two_way(), a, b, state, &CancelToken::new()).await
}

/// Block out `source`'s busy placeholders in `target`.
pub async fn sync_busy_only(
    source: &dyn CalendarRemote,
    target: &dyn CalendarRemote,
    state: &mut dyn StateStore,
) -> OmnicalResult<RunSummary> {
    run_pass(&SyncPolicy::busy_only(), source, target, state, &CancelToken::new()).await
}

/// Copy `source`'s real events into `target`.
pub async fn sync_one_way(
    source: &dyn CalendarRemote,
    target: &dyn CalendarRemote,
    state: &mut dyn StateStore,
) -> OmnicalResult<RunSummary> {
    run_pass(
        &SyncPolicy::one_way_excluding_busy(),
        source,
        target,
        state,
        &CancelToken::new(),
    )
    .await
}
