//! Sync state: what the engine last synchronized, per identifier.
//!
//! The state store is the only memory the engine has between passes.
//! Snapshots are re-fetched every time; the store decides whether an event
//! missing on one side is new on the other or was deleted.

mod json;
mod lock;
mod memory;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::OmnicalResult;
use crate::event::Side;

pub use json::JsonStateStore;
pub use lock::StateLock;
pub use memory::MemoryStateStore;

/// Where a synchronized event first came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    A,
    B,
    /// Content manufactured by the engine itself (busy placeholders)
    Engine,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStateEntry {
    pub last_synced: DateTime<Utc>,
    pub origin: Origin,
}

impl SyncStateEntry {
    pub fn new(last_synced: DateTime<Utc>, origin: Origin) -> Self {
        SyncStateEntry {
            last_synced,
            origin,
        }
    }

    /// Whether the copy on `side` was put there by the engine, either as a
    /// placeholder or by propagating the event from the other side.
    pub fn engine_created_on(&self, side: Side) -> bool {
        match self.origin {
            Origin::Engine => true,
            Origin::A => side == Side::B,
            Origin::B => side == Side::A,
        }
    }
}

impl From<Side> for Origin {
    fn from(side: Side) -> Self {
        match side {
            Side::A => Origin::A,
            Side::B => Origin::B,
        }
    }
}

/// Durable identifier → sync state mapping for one (mode, calendar pair).
///
/// A failed `put` or `remove` must leave the store exactly as it was.
pub trait StateStore: Send + Sync {
    fn get(&self, uid: &str) -> Option<SyncStateEntry>;

    fn put(&mut self, uid: &str, entry: SyncStateEntry) -> OmnicalResult<()>;

    fn remove(&mut self, uid: &str) -> OmnicalResult<()>;

    fn snapshot_all(&self) -> BTreeMap<String, SyncStateEntry>;
}
