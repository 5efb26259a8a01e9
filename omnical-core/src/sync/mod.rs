//! Reconciliation engine.
//!
//! A pass fetches both snapshots, [`reconcile`]s them against prior sync
//! state under a [`SyncPolicy`], then applies the resulting [`Plan`] one
//! identifier at a time.

mod action;
mod apply;
mod engine;
mod policy;
mod reconcile;
mod summary;

pub use action::{
    ActionKind, Conflict, Plan, PlannedChange, ReconciliationAction, SkipReason, Skipped,
    StateChange,
};
pub use apply::{CancelToken, Remotes, apply_plan};
pub use engine::{build_snapshot, plan_pass, run_pass, sync_busy_only, sync_one_way, sync_two_way};
pub use policy::{DeleteScope, Direction, KindFilter, Projection, SyncMode, SyncPolicy, TargetScope};
pub use reconcile::{reconcile, reconcile_with_unreadable};
pub use summary::{Failure, RunSummary, SideCounts};
