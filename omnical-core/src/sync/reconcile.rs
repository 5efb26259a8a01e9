//! Reconciliation: classify every identifier into an action.
//!
//! Pure function of two snapshots, the prior sync state and a policy. No I/O.

use std::collections::{BTreeMap, BTreeSet};

use crate::event::{EventRecord, Side, Snapshot};
use crate::state::{Origin, SyncStateEntry};
use crate::sync::action::{
    Conflict, Plan, PlannedChange, ReconciliationAction, SkipReason, Skipped, StateChange,
};
use crate::sync::policy::SyncPolicy;

/// Compute the ordered plan for one pass.
///
/// Identifiers come from the union of both snapshots and the prior state,
/// after the policy has narrowed each side to the records it may consider.
/// Changes are ordered deletes, creates, updates, then noops, and by
/// identifier within each group.
pub fn reconcile(
    a: &Snapshot,
    b: &Snapshot,
    prior: &BTreeMap<String, SyncStateEntry>,
    policy: &SyncPolicy,
) -> Plan {
    reconcile_with_unreadable(a, b, prior, policy, &BTreeSet::new())
}

/// Like [`reconcile`], for passes where some records could not be read.
///
/// An identifier in `unreadable` is present on at least one side even though
/// no snapshot shows it. It is left exactly as it is on both sides and its
/// state entry is kept.
pub fn reconcile_with_unreadable(
    a: &Snapshot,
    b: &Snapshot,
    prior: &BTreeMap<String, SyncStateEntry>,
    policy: &SyncPolicy,
    unreadable: &BTreeSet<String>,
) -> Plan {
    let mut plan = Plan::default();

    let mut a_view: BTreeMap<&str, &EventRecord> = BTreeMap::new();
    for (uid, record) in a {
        if policy.admits_source(record) {
            a_view.insert(uid.as_str(), record);
        } else {
            plan.skipped.push(skipped(uid, Side::A, SkipReason::Filtered));
        }
    }

    let mut foreign: BTreeSet<&str> = BTreeSet::new();
    let mut b_view: BTreeMap<&str, &EventRecord> = BTreeMap::new();
    for (uid, record) in b {
        let in_source = a_view.contains_key(uid.as_str());
        if policy.admits_target(record, prior.get(uid), in_source) {
            b_view.insert(uid.as_str(), record);
        } else if in_source {
            foreign.insert(uid.as_str());
            plan.skipped.push(skipped(uid, Side::B, SkipReason::ForeignTarget));
        } else if policy.is_bidirectional() {
            plan.skipped.push(skipped(uid, Side::B, SkipReason::Filtered));
        }
    }

    let uids: BTreeSet<&str> = a_view
        .keys()
        .chain(b_view.keys())
        .copied()
        .chain(prior.keys().map(String::as_str))
        .filter(|uid| !foreign.contains(uid))
        .collect();

    for uid in uids {
        if unreadable.contains(uid) {
            plan.changes.push(PlannedChange::noop(uid, StateChange::Keep));
            continue;
        }

        let decided = decide(
            uid,
            a_view.get(uid).copied(),
            b_view.get(uid).copied(),
            prior.get(uid),
            policy,
            &mut plan.conflicts,
        );
        plan.changes.extend(decided);
    }

    // Stable, so identifier order survives within each kind
    plan.changes.sort_by_key(|change| change.action.kind());
    plan
}

fn skipped(uid: &str, side: Side, reason: SkipReason) -> Skipped {
    Skipped {
        uid: uid.to_string(),
        side,
        reason,
    }
}

fn decide(
    uid: &str,
    a: Option<&EventRecord>,
    b: Option<&EventRecord>,
    entry: Option<&SyncStateEntry>,
    policy: &SyncPolicy,
    conflicts: &mut Vec<Conflict>,
) -> Option<PlannedChange> {
    match (a, b, entry) {
        (None, None, None) => None,

        // Gone everywhere
        (None, None, Some(_)) => Some(PlannedChange::noop(uid, StateChange::Remove)),

        // Never seen
        (Some(ra), None, None) => Some(create(Side::B, ra, policy)),
        (None, Some(rb), None) => policy
            .may_write(Side::A)
            .then(|| create(Side::A, rb, policy)),

        // Synced before, since deleted from B
        (Some(_), None, Some(entry)) => {
            if !policy.may_write(Side::A) {
                // The user removed our copy; keep the entry so it is not recreated
                Some(PlannedChange::noop(uid, StateChange::Keep))
            } else if policy.may_delete(Side::A, entry) {
                Some(delete(Side::A, uid))
            } else {
                Some(PlannedChange::noop(uid, StateChange::Remove))
            }
        }

        // Synced before, since deleted from A
        (None, Some(_), Some(entry)) => {
            if policy.may_delete(Side::B, entry) {
                Some(delete(Side::B, uid))
            } else {
                Some(PlannedChange::noop(uid, StateChange::Remove))
            }
        }

        (Some(ra), Some(rb), None) => Some(adopt(uid, ra, rb, policy, conflicts)),
        (Some(ra), Some(rb), Some(entry)) => Some(compare(uid, ra, rb, entry, policy, conflicts)),
    }
}

/// Both sides hold the identifier but nothing links them yet: copies that
/// predate the engine, or a create whose state write never landed.
fn adopt(
    uid: &str,
    ra: &EventRecord,
    rb: &EventRecord,
    policy: &SyncPolicy,
    conflicts: &mut Vec<Conflict>,
) -> PlannedChange {
    if policy.projection.same_content(ra, rb) {
        let entry = SyncStateEntry::new(ra.modified, policy.adoption_origin(Side::A, true));
        return PlannedChange::noop(uid, StateChange::Put(entry));
    }

    if ra.modified == rb.modified && policy.is_bidirectional() {
        conflicts.push(Conflict {
            uid: uid.to_string(),
            modified: ra.modified,
        });
    }

    let winner = newer_side(ra, rb);
    propagate(uid, winner, ra, rb, policy.adoption_origin(winner, false), policy)
}

fn compare(
    uid: &str,
    ra: &EventRecord,
    rb: &EventRecord,
    entry: &SyncStateEntry,
    policy: &SyncPolicy,
    conflicts: &mut Vec<Conflict>,
) -> PlannedChange {
    let a_changed = ra.modified > entry.last_synced;
    let b_changed = rb.modified > entry.last_synced;

    // Target-side edits never flow back in one-way modes
    if !policy.is_bidirectional() {
        return if a_changed {
            update(Side::B, ra, entry.origin)
        } else {
            PlannedChange::noop(uid, StateChange::Keep)
        };
    }

    match (a_changed, b_changed) {
        (true, false) => update(Side::B, ra, entry.origin),
        (false, true) => update(Side::A, rb, entry.origin),
        (false, false) if ra.modified == rb.modified => PlannedChange::noop(uid, StateChange::Keep),
        // A clock went backwards; trust whichever side looks newer
        (false, false) => propagate(uid, newer_side(ra, rb), ra, rb, entry.origin, policy),
        (true, true) if ra.modified == rb.modified => {
            if ra.payload == rb.payload {
                let entry = SyncStateEntry::new(ra.modified, entry.origin);
                PlannedChange::noop(uid, StateChange::Put(entry))
            } else {
                conflicts.push(Conflict {
                    uid: uid.to_string(),
                    modified: ra.modified,
                });
                update(Side::B, ra, entry.origin)
            }
        }
        (true, true) => propagate(uid, newer_side(ra, rb), ra, rb, entry.origin, policy),
    }
}

/// The side with the later modification time; A on a tie.
fn newer_side(ra: &EventRecord, rb: &EventRecord) -> Side {
    if rb.modified > ra.modified {
        Side::B
    } else {
        Side::A
    }
}

/// Write the winner's content onto the other side, when the policy allows it.
fn propagate(
    uid: &str,
    winner: Side,
    ra: &EventRecord,
    rb: &EventRecord,
    origin: Origin,
    policy: &SyncPolicy,
) -> PlannedChange {
    match winner {
        Side::A => update(Side::B, ra, origin),
        Side::B if policy.may_write(Side::A) => update(Side::A, rb, origin),
        // Link without touching the source; later source edits still flow
        Side::B => PlannedChange::noop(
            uid,
            StateChange::Put(SyncStateEntry::new(ra.modified, origin)),
        ),
    }
}

fn create(on: Side, source: &EventRecord, policy: &SyncPolicy) -> PlannedChange {
    let entry = SyncStateEntry::new(source.modified, policy.creation_origin(on.opposite()));
    PlannedChange {
        uid: source.uid.clone(),
        action: ReconciliationAction::create_on(on),
        source: Some(source.clone()),
        state: StateChange::Put(entry),
    }
}

fn update(on: Side, source: &EventRecord, origin: Origin) -> PlannedChange {
    PlannedChange {
        uid: source.uid.clone(),
        action: ReconciliationAction::update_on(on),
        source: Some(source.clone()),
        state: StateChange::Put(SyncStateEntry::new(source.modified, origin)),
    }
}

fn delete(on: Side, uid: &str) -> PlannedChange {
    PlannedChange {
        uid: uid.to_string(),
        action: ReconciliationAction::delete_on(on),
        source: None,
        state: StateChange::Remove,
    }
}
