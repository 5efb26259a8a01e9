//! Apply engine: carry out a plan against both remotes and the state store.
//!
//! Each identifier is its own unit of work. The remote mutation runs first;
//! only once it succeeds is the state entry written. A failure is recorded
//! and the next change proceeds.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, warn};

use crate::error::{OmnicalError, OmnicalResult};
use crate::event::Side;
use crate::remote::{CalendarRemote, TransportError};
use crate::state::StateStore;
use crate::sync::action::{ActionKind, Plan, PlannedChange, StateChange};
use crate::sync::policy::{SyncPolicy, TargetScope};
use crate::sync::summary::RunSummary;

/// Shared flag that stops a pass between two actions.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The two sides of a pass.
#[derive(Clone, Copy)]
pub struct Remotes<'a> {
    pub a: &'a dyn CalendarRemote,
    pub b: &'a dyn CalendarRemote,
}

impl<'a> Remotes<'a> {
    pub fn side(&self, side: Side) -> &'a dyn CalendarRemote {
        match side {
            Side::A => self.a,
            Side::B => self.b,
        }
    }
}

/// Apply every change in `plan`, in order, and summarize.
pub async fn apply_plan(
    plan: Plan,
    remotes: Remotes<'_>,
    state: &mut dyn StateStore,
    policy: &SyncPolicy,
    cancel: &CancelToken,
) -> RunSummary {
    let mut summary = RunSummary::new(policy.mode);
    summary.conflicts = plan.conflicts;
    for skipped in plan.skipped {
        summary.record_skipped(skipped);
    }

    for change in &plan.changes {
        if cancel.is_cancelled() {
            warn!("Pass cancelled, remaining changes left for the next pass");
            summary.cancelled = true;
            break;
        }

        match apply_change(change, remotes, state, policy).await {
            Ok(()) => summary.record_success(change.action),
            Err(e) => {
                warn!(uid = %change.uid, action = %change.action, error = %e, "Change failed");
                summary.record_failure(&change.uid, change.action, &e);
            }
        }
    }

    summary
}

async fn apply_change(
    change: &PlannedChange,
    remotes: Remotes<'_>,
    state: &mut dyn StateStore,
    policy: &SyncPolicy,
) -> OmnicalResult<()> {
    let Some(side) = change.action.target_side() else {
        return write_state(state, change).map_err(|e| {
            warn!(uid = %change.uid, error = %e, "Could not update sync state");
            e
        });
    };

    let remote = remotes.side(side);

    match change.action.kind() {
        ActionKind::Create => {
            let payload = render(change, policy)?;
            match remote.create_event(&payload).await {
                Ok(uid) if uid != change.uid => {
                    warn!(uid = %change.uid, remote_uid = %uid, "Remote stored event under a different identifier");
                }
                Ok(_) => {}
                // Anything under that identifier that we could not see is
                // not ours to overwrite
                Err(e @ TransportError::AlreadyExists(_))
                    if policy.target_scope == TargetScope::EngineOwnedPlaceholders =>
                {
                    return Err(e.into());
                }
                Err(TransportError::AlreadyExists(_)) => {
                    info!(uid = %change.uid, remote = %remote.label(), "Event already exists, updating instead");
                    remote.update_event(&change.uid, &payload).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        ActionKind::Update => {
            let payload = render(change, policy)?;
            remote.update_event(&change.uid, &payload).await?;
        }
        ActionKind::Delete => match remote.delete_event(&change.uid).await {
            Ok(()) => {}
            Err(TransportError::NotFound(_)) => {
                debug!(uid = %change.uid, "Already gone");
            }
            Err(e) => return Err(e.into()),
        },
        ActionKind::Noop => {}
    }

    info!(uid = %change.uid, action = %change.action, remote = %remote.label(), "Applied");

    write_state(state, change).map_err(|e| {
        error!(
            uid = %change.uid,
            action = %change.action,
            error = %e,
            "Remote changed but sync state was not saved; the next pass may repeat this change"
        );
        e
    })
}

fn render(change: &PlannedChange, policy: &SyncPolicy) -> OmnicalResult<String> {
    let source = change.source.as_ref().ok_or_else(|| {
        OmnicalError::InvalidPayload(format!("no source content for '{}'", change.uid))
    })?;
    policy.projection.render(source)
}

fn write_state(state: &mut dyn StateStore, change: &PlannedChange) -> OmnicalResult<()> {
    match &change.state {
        StateChange::Keep => Ok(()),
        StateChange::Put(entry) => state.put(&change.uid, entry.clone()),
        StateChange::Remove => state.remove(&change.uid),
    }
}
