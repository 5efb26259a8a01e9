//! Mode policies.
//!
//! The three sync modes share one reconciliation and apply core. A
//! [`SyncPolicy`] is the plain value that tells the core which records to
//! consider, which way changes may flow, what it may delete and how source
//! content is written to the other side.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OmnicalError, OmnicalResult};
use crate::event::{EventKind, EventRecord, Side};
use crate::ics::{generate_busy_placeholder, parse_time_range};
use crate::state::{Origin, SyncStateEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    TwoWay,
    BusyOnly,
    OneWayExcludingBusy,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::TwoWay => write!(f, "two-way"),
            SyncMode::BusyOnly => write!(f, "busy-only"),
            SyncMode::OneWayExcludingBusy => write!(f, "one-way"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Bidirectional,
    /// A is the source, B the target
    AToB,
}

/// Which source records take part in a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindFilter {
    Any,
    OnlyPlaceholders,
    ExcludePlaceholders,
}

impl KindFilter {
    pub fn admits(self, kind: EventKind) -> bool {
        match self {
            KindFilter::Any => true,
            KindFilter::OnlyPlaceholders => kind == EventKind::BusyPlaceholder,
            KindFilter::ExcludePlaceholders => kind == EventKind::Real,
        }
    }
}

/// Which target records the engine may look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetScope {
    All,
    /// Only placeholders the engine made (or, with no state yet, that
    /// collide with a source event).
    EngineOwnedPlaceholders,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteScope {
    Any,
    /// Only copies the engine itself put on that side
    EngineCreated,
}

/// How a source record becomes the payload written to the other side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Verbatim,
    BusyPlaceholder,
}

impl Projection {
    pub fn render(self, record: &EventRecord) -> OmnicalResult<String> {
        match self {
            Projection::Verbatim => Ok(record.payload.clone()),
            Projection::BusyPlaceholder => {
                let range = parse_time_range(&record.payload).ok_or_else(|| {
                    OmnicalError::InvalidPayload(format!(
                        "event '{}' has no DTSTART to block",
                        record.uid
                    ))
                })?;
                Ok(generate_busy_placeholder(&record.uid, record.modified, &range))
            }
        }
    }

    /// Whether two records already carry the same content under this projection.
    pub fn same_content(self, a: &EventRecord, b: &EventRecord) -> bool {
        a.modified == b.modified
            && match self {
                Projection::Verbatim => a.payload == b.payload,
                // Placeholders carry the source time and nothing else worth comparing
                Projection::BusyPlaceholder => b.is_placeholder(),
            }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    pub mode: SyncMode,
    pub direction: Direction,
    pub source_kinds: KindFilter,
    pub target_scope: TargetScope,
    pub delete_scope: DeleteScope,
    pub projection: Projection,
}

impl SyncPolicy {
    /// Mirror everything both ways.
    pub fn two_way() -> Self {
        SyncPolicy {
            mode: SyncMode::TwoWay,
            direction: Direction::Bidirectional,
            source_kinds: KindFilter::Any,
            target_scope: TargetScope::All,
            delete_scope: DeleteScope::Any,
            projection: Projection::Verbatim,
        }
    }

    /// Project busy placeholders from A into B, touching nothing else in B.
    pub fn busy_only() -> Self {
        SyncPolicy {
            mode: SyncMode::BusyOnly,
            direction: Direction::AToB,
            source_kinds: KindFilter::OnlyPlaceholders,
            target_scope: TargetScope::EngineOwnedPlaceholders,
            delete_scope: DeleteScope::EngineCreated,
            projection: Projection::BusyPlaceholder,
        }
    }

    /// Like [`SyncPolicy::busy_only`], but every A event is blocked out in B.
    pub fn busy_only_projecting_all() -> Self {
        SyncPolicy {
            source_kinds: KindFilter::Any,
            ..Self::busy_only()
        }
    }

    /// Copy real A events into B verbatim, leaving placeholders behind.
    pub fn one_way_excluding_busy() -> Self {
        SyncPolicy {
            mode: SyncMode::OneWayExcludingBusy,
            direction: Direction::AToB,
            source_kinds: KindFilter::ExcludePlaceholders,
            target_scope: TargetScope::All,
            delete_scope: DeleteScope::EngineCreated,
            projection: Projection::Verbatim,
        }
    }

    pub fn for_mode(mode: SyncMode) -> Self {
        match mode {
            SyncMode::TwoWay => Self::two_way(),
            SyncMode::BusyOnly => Self::busy_only(),
            SyncMode::OneWayExcludingBusy => Self::one_way_excluding_busy(),
        }
    }

    pub fn is_bidirectional(&self) -> bool {
        self.direction == Direction::Bidirectional
    }

    /// Whether content may be written onto `side`.
    pub fn may_write(&self, side: Side) -> bool {
        self.is_bidirectional() || side == Side::B
    }

    /// Whether the record on side A takes part in the pass.
    pub fn admits_source(&self, record: &EventRecord) -> bool {
        self.source_kinds.admits(record.kind)
    }

    /// Whether the record on side B takes part in the pass.
    pub fn admits_target(
        &self,
        record: &EventRecord,
        entry: Option<&SyncStateEntry>,
        in_source: bool,
    ) -> bool {
        if self.is_bidirectional() && !self.source_kinds.admits(record.kind) {
            return false;
        }
        match self.target_scope {
            TargetScope::All => true,
            TargetScope::EngineOwnedPlaceholders => {
                record.is_placeholder()
                    && match entry {
                        Some(entry) => entry.origin == Origin::Engine,
                        None => in_source,
                    }
            }
        }
    }

    /// Whether the copy of a synced event on `side` may be deleted.
    pub fn may_delete(&self, side: Side, entry: &SyncStateEntry) -> bool {
        match self.delete_scope {
            DeleteScope::Any => true,
            DeleteScope::EngineCreated => entry.engine_created_on(side),
        }
    }

    /// Origin recorded when an event from `from` is created on the other side.
    pub fn creation_origin(&self, from: Side) -> Origin {
        match self.projection {
            Projection::BusyPlaceholder => Origin::Engine,
            Projection::Verbatim => from.into(),
        }
    }

    /// Origin recorded when copies already on both sides are first linked.
    ///
    /// `identical` is whether the two copies already carry the same content.
    pub fn adoption_origin(&self, winner: Side, identical: bool) -> Origin {
        match (self.projection, self.direction) {
            (Projection::BusyPlaceholder, _) => Origin::Engine,
            // A create of ours whose state write never landed looks exactly like this
            (Projection::Verbatim, Direction::AToB) if identical => Origin::A,
            // A differing target copy predates the engine, so it is not ours to delete
            (Projection::Verbatim, Direction::AToB) => Origin::B,
            (Projection::Verbatim, Direction::Bidirectional) => winner.into(),
        }
    }
}
