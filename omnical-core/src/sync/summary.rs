//! Per-pass run summaries.

use crate::error::{ErrorKind, OmnicalError};
use crate::event::Side;
use crate::sync::action::{ActionKind, Conflict, ReconciliationAction, Skipped};
use crate::sync::policy::SyncMode;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SideCounts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SideCounts {
    pub fn changed(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

/// An action that did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub uid: String,
    pub action: ReconciliationAction,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub mode: SyncMode,
    pub a: SideCounts,
    pub b: SideCounts,
    /// Noops applied, including ones that only touched state
    pub unchanged: usize,
    pub skipped: Vec<Skipped>,
    pub failures: Vec<Failure>,
    pub conflicts: Vec<Conflict>,
    /// Stopped early on cancellation
    pub cancelled: bool,
}

impl RunSummary {
    pub fn new(mode: SyncMode) -> Self {
        RunSummary {
            mode,
            a: SideCounts::default(),
            b: SideCounts::default(),
            unchanged: 0,
            skipped: Vec::new(),
            failures: Vec::new(),
            conflicts: Vec::new(),
            cancelled: false,
        }
    }

    pub fn side(&self, side: Side) -> &SideCounts {
        match side {
            Side::A => &self.a,
            Side::B => &self.b,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut SideCounts {
        match side {
            Side::A => &mut self.a,
            Side::B => &mut self.b,
        }
    }

    pub fn record_skipped(&mut self, skipped: Skipped) {
        self.side_mut(skipped.side).skipped += 1;
        self.skipped.push(skipped);
    }

    pub fn record_success(&mut self, action: ReconciliationAction) {
        let Some(side) = action.target_side() else {
            self.unchanged += 1;
            return;
        };
        let counts = self.side_mut(side);
        match action.kind() {
            ActionKind::Create => counts.created += 1,
            ActionKind::Update => counts.updated += 1,
            ActionKind::Delete => counts.deleted += 1,
            ActionKind::Noop => {}
        }
    }

    pub fn record_failure(&mut self, uid: &str, action: ReconciliationAction, error: &OmnicalError) {
        if let Some(side) = action.target_side() {
            self.side_mut(side).failed += 1;
        }
        self.failures.push(Failure {
            uid: uid.to_string(),
            action,
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Number of remote mutations that went through.
    pub fn changed(&self) -> usize {
        self.a.changed() + self.b.changed()
    }

    pub fn is_clean(&self) -> bool {
        !self.has_failures() && !self.cancelled
    }
}
