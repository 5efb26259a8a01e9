//! JSON-file state store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{OmnicalError, OmnicalResult};
use crate::state::{StateLock, StateStore, SyncStateEntry};
use crate::sync::SyncMode;

/// On-disk layout. The mode tag keeps a two-way file from ever being read
/// as busy-only state (and vice versa).
#[derive(Serialize, Deserialize)]
struct StateFile {
    mode: SyncMode,
    #[serde(default)]
    entries: BTreeMap<String, SyncStateEntry>,
}

/// State for one (mode, calendar pair), persisted as a JSON file.
///
/// Every write rewrites the whole file through a temp file and a rename, so
/// the file on disk is always either the old or the new state.
pub struct JsonStateStore {
    path: PathBuf,
    mode: SyncMode,
    entries: BTreeMap<String, SyncStateEntry>,
    _lock: StateLock,
}

impl JsonStateStore {
    /// Open (or start) the state file at `path`, taking its lock.
    pub fn open(path: impl Into<PathBuf>, mode: SyncMode) -> OmnicalResult<Self> {
        let path = path.into();
        let lock = StateLock::acquire(&path)?;
        let entries = Self::read_entries(&path, mode)?;

        debug!(path = %path.display(), entries = entries.len(), "Opened sync state");

        Ok(JsonStateStore {
            path,
            mode,
            entries,
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn read_entries(path: &Path, mode: SyncMode) -> OmnicalResult<BTreeMap<String, SyncStateEntry>> {
        if !path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            OmnicalError::Persistence(format!("Could not read {}: {e}", path.display()))
        })?;

        let file: StateFile = serde_json::from_str(&content).map_err(|e| {
            OmnicalError::Persistence(format!("Could not parse {}: {e}", path.display()))
        })?;

        if file.mode != mode {
            info!(
                path = %path.display(),
                found = %file.mode,
                expected = %mode,
                "Ignoring state file written by another sync mode"
            );
            return Ok(BTreeMap::new());
        }

        Ok(file.entries)
    }

    fn write_entries(&self, entries: &BTreeMap<String, SyncStateEntry>) -> OmnicalResult<()> {
        let file = StateFile {
            mode: self.mode,
            entries: entries.clone(),
        };

        let content = serde_json::to_string_pretty(&file)
            .map_err(|e| OmnicalError::Serialization(e.to_string()))?;

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| persistence(&self.path, e))?;
        }

        let mut temp_name = self.path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp = PathBuf::from(temp_name);

        std::fs::write(&temp, content).map_err(|e| persistence(&temp, e))?;
        std::fs::rename(&temp, &self.path).map_err(|e| persistence(&self.path, e))?;
        Ok(())
    }
}

fn persistence(path: &Path, e: std::io::Error) -> OmnicalError {
    OmnicalError::Persistence(format!("Could not write {}: {e}", path.display()))
}

impl StateStore for JsonStateStore {
    fn get(&self, uid: &str) -> Option<SyncStateEntry> {
        self.entries.get(uid).cloned()
    }

    fn put(&mut self, uid: &str, entry: SyncStateEntry) -> OmnicalResult<()> {
        let mut next = self.entries.clone();
        next.insert(uid.to_string(), entry);
        self.write_entries(&next)?;
        self.entries = next;
        Ok(())
    }

    fn remove(&mut self, uid: &str) -> OmnicalResult<()> {
        if !self.entries.contains_key(uid) {
            return Ok(());
        }
        let mut next = self.entries.clone();
        next.remove(uid);
        self.write_entries(&next)?;
        self.entries = next;
        Ok(())
    }

    fn snapshot_all(&self) -> BTreeMap<String, SyncStateEntry> {
        self.entries.clone()
    }
}
