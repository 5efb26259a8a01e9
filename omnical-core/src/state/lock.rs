//! Exclusive lock so two passes never share a state file.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{OmnicalError, OmnicalResult};

/// Held for as long as a state store is open; released on drop.
#[derive(Debug)]
pub struct StateLock {
    _file: File,
    path: PathBuf,
}

impl StateLock {
    /// Lock `<state_path>.lock`, failing immediately if another pass holds it.
    pub fn acquire(state_path: &Path) -> OmnicalResult<Self> {
        let mut lock_name = state_path.as_os_str().to_owned();
        lock_name.push(".lock");
        let path = PathBuf::from(lock_name);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = File::create(&path)?;
        file.try_lock_exclusive()
            .map_err(|_| OmnicalError::StateLocked(state_path.to_path_buf()))?;

        Ok(StateLock { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
