//! In-memory state store for tests and embedders.

use std::collections::{BTreeMap, HashSet};

use crate::error::{OmnicalError, OmnicalResult};
use crate::state::{StateStore, SyncStateEntry};

/// State kept in memory, with injectable write failures.
#[derive(Debug, Default, Clone)]
pub struct MemoryStateStore {
    entries: BTreeMap<String, SyncStateEntry>,
    failing_uids: HashSet<String>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `put`/`remove` for `uid` fail until `heal` is called.
    pub fn fail_writes_for(&mut self, uid: &str) {
        self.failing_uids.insert(uid.to_string());
    }

    pub fn heal(&mut self) {
        self.failing_uids.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check(&self, uid: &str) -> OmnicalResult<()> {
        if self.failing_uids.contains(uid) {
            return Err(OmnicalError::Persistence(format!(
                "injected write failure for {uid}"
            )));
        }
        Ok(())
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, uid: &str) -> Option<SyncStateEntry> {
        self.entries.get(uid).cloned()
    }

    fn put(&mut self, uid: &str, entry: SyncStateEntry) -> OmnicalResult<()> {
        self.check(uid)?;
        self.entries.insert(uid.to_string(), entry);
        Ok(())
    }

    fn remove(&mut self, uid: &str) -> OmnicalResult<()> {
        self.check(uid)?;
        self.entries.remove(uid);
        Ok(())
    }

    fn snapshot_all(&self) -> BTreeMap<String, SyncStateEntry> {
        self.entries.clone()
    }
}
