//! JSON file snapshots of a [`SharedStore`].
//!
//! Lets the durable area outlive the process: save on shutdown, load on
//! startup. Writes go to a sibling temp file (the target name plus `.tmp`)
//! first and are renamed into place, so a crash mid-write leaves the
//! previous snapshot intact. The store's quota, if any, is saved with it.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Result |
//! |---------|-------|--------|
//! | Missing file | First run | `StorageError::Io` |
//! | Bad JSON | Truncated/edited file | `StorageError::Corrupt` |
//! | Unknown version | Newer format | `StorageError::Corrupt` |

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::area::StorageArea;
use crate::error::StorageError;
use crate::memory::SharedStore;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    area: StorageArea,
    entries: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quota: Option<usize>,
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

impl SharedStore {
    /// Write all entries to `path` as JSON.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<(), StorageError> {
        let path = path.as_ref();
        let file = SnapshotFile {
            version: SNAPSHOT_VERSION,
            area: self.area(),
            entries: self.entries().into_iter().collect(),
            quota: self.quota(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;
        let tmp = temp_path(path);
        fs::write(&tmp, json).map_err(|e| StorageError::Io(e.to_string()))?;
        fs::rename(&tmp, path).map_err(|e| StorageError::Io(e.to_string()))?;
        tracing::debug!(path = %path.display(), entries = file.entries.len(), "saved store snapshot");
        Ok(())
    }

    /// Build a fresh store from a snapshot written by [`save_snapshot`].
    ///
    /// [`save_snapshot`]: SharedStore::save_snapshot
    pub fn load_snapshot(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| StorageError::Io(e.to_string()))?;
        let file: SnapshotFile =
            serde_json::from_str(&json).map_err(|e| StorageError::Corrupt(e.to_string()))?;
        if file.version != SNAPSHOT_VERSION {
            return Err(StorageError::Corrupt(format!(
                "unsupported snapshot version {}",
                file.version
            )));
        }
        tracing::debug!(path = %path.display(), entries = file.entries.len(), "loaded store snapshot");
        Ok(Self::from_parts(file.area, file.entries, file.quota))
    }
}
