use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{EventRecord, Side};
use crate::state::SyncStateEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReconciliationAction {
    CreateOnA,
    CreateOnB,
    UpdateOnA,
    UpdateOnB,
    DeleteOnA,
    DeleteOnB,
    Noop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ActionKind {
    Delete,
    Create,
    Update,
    Noop,
}

impl ReconciliationAction {
    pub fn create_on(side: Side) -> Self {
        match side {
            Side::A => ReconciliationAction::CreateOnA,
            Side::B => ReconciliationAction::CreateOnB,
        }
    }

    pub fn update_on(side: Side) -> Self {
        match side {
            Side::A => ReconciliationAction::UpdateOnA,
            Side::B => ReconciliationAction::UpdateOnB,
        }
    }

    pub fn delete_on(side: Side) -> Self {
        match side {
            Side::A => ReconciliationAction::DeleteOnA,
            Side::B => ReconciliationAction::DeleteOnB,
        }
    }

    /// The side this action mutates, `None` for `Noop`.
    pub fn target_side(self) -> Option<Side> {
        use ReconciliationAction::*;
        match self {
            CreateOnA | UpdateOnA | DeleteOnA => Some(Side::A),
            CreateOnB | UpdateOnB | DeleteOnB => Some(Side::B),
            Noop => None,
        }
    }

    /// Kinds order the way actions are applied: deletes first.
    pub fn kind(self) -> ActionKind {
        use ReconciliationAction::*;
        match self {
            DeleteOnA | DeleteOnB => ActionKind::Delete,
            CreateOnA | CreateOnB => ActionKind::Create,
            UpdateOnA | UpdateOnB => ActionKind::Update,
            Noop => ActionKind::Noop,
        }
    }

    pub fn is_noop(self) -> bool {
        self == ReconciliationAction::Noop
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Create => write!(f, "+"),
            ActionKind::Update => write!(f, "~"),
            ActionKind::Delete => write!(f, "-"),
            ActionKind::Noop => write!(f, "="),
        }
    }
}

impl fmt::Display for ReconciliationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind(), self.target_side()) {
            (ActionKind::Create, Some(side)) => write!(f, "create on {side}"),
            (ActionKind::Update, Some(side)) => write!(f, "update on {side}"),
            (ActionKind::Delete, Some(side)) => write!(f, "delete on {side}"),
            _ => write!(f, "noop"),
        }
    }
}

/// State write performed once the remote side of a change has succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateChange {
    Keep,
    Put(SyncStateEntry),
    Remove,
}

/// One decided action, with everything the apply engine needs to carry it out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChange {
    pub uid: String,
    pub action: ReconciliationAction,
    /// Record whose content is written, for creates and updates
    pub source: Option<EventRecord>,
    pub state: StateChange,
}

impl PlannedChange {
    pub fn noop(uid: &str, state: StateChange) -> Self {
        PlannedChange {
            uid: uid.to_string(),
            action: ReconciliationAction::Noop,
            source: None,
            state,
        }
    }
}

impl fmt::Display for PlannedChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.action.kind(), self.action, self.uid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// Excluded by the mode's kind filter
    Filtered,
    /// A target event the engine does not own shares a source identifier
    ForeignTarget,
    MissingTimestamp,
    InvalidPayload,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Filtered => write!(f, "filtered by mode"),
            SkipReason::ForeignTarget => write!(f, "identifier taken by a foreign event"),
            SkipReason::MissingTimestamp => write!(f, "no modification time"),
            SkipReason::InvalidPayload => write!(f, "unparseable event"),
        }
    }
}

/// A record left out of the pass. `uid` is empty when none could be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    pub uid: String,
    pub side: Side,
    pub reason: SkipReason,
}

/// Both sides changed to the same modification time with different content.
/// Resolved in favour of A.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub uid: String,
    pub modified: DateTime<Utc>,
}

/// The full outcome of reconciliation, in apply order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    pub changes: Vec<PlannedChange>,
    pub skipped: Vec<Skipped>,
    pub conflicts: Vec<Conflict>,
}

impl Plan {
    /// Changes that touch a remote.
    pub fn mutations(&self) -> impl Iterator<Item = &PlannedChange> {
        self.changes.iter().filter(|c| !c.action.is_noop())
    }

    pub fn is_noop(&self) -> bool {
        self.mutations().next().is_none()
    }

    pub fn action_for(&self, uid: &str) -> Option<ReconciliationAction> {
        self.changes
            .iter()
            .find(|c| c.uid == uid)
            .map(|c| c.action)
    }

    pub fn count(&self, action: ReconciliationAction) -> usize {
        self.changes.iter().filter(|c| c.action == action).count()
    }
}
