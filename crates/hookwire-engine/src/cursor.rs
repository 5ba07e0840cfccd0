//! Persistent cursor store — how much of each source has already been
//! delivered, per workflow.
//!
//! One JSON file (`cursors.json`), a map from composite key to last
//! seen position. Loaded once at open, rewritten on every set via a
//! temp-file rename. A mutex serializes writers; each key has a single
//! owning poll task in practice, so contention is across keys only.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use hookwire_core::{Error, Result};

/// File-backed namespaced cursor map.
pub struct CursorStore {
    path: PathBuf,
    positions: Mutex<HashMap<String, u64>>,
}

impl CursorStore {
    /// Open the store at the given directory, loading any existing
    /// cursor file. An unreadable or corrupt file logs a warning and
    /// starts empty — equivalent to "no cursor", which re-delivers
    /// rather than loses.
    pub fn open(dir: &Path) -> Self {
        std::fs::create_dir_all(dir).ok();
        let path = dir.join("cursors.json");
        let positions = if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                    tracing::warn!("Failed to parse cursors.json, starting empty: {e}");
                    HashMap::new()
                }),
                Err(e) => {
                    tracing::warn!("Failed to read cursors.json, starting empty: {e}");
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };
        Self {
            path,
            positions: Mutex::new(positions),
        }
    }

    /// Composite key for one workflow's view of one source.
    pub fn key(source_identity: &str, workflow_id: &str) -> String {
        format!("{source_identity}:{workflow_id}")
    }

    /// Last seen position, or None if this key has never been written
    /// (the uniform first-run sentinel).
    pub fn get(&self, source_identity: &str, workflow_id: &str) -> Option<u64> {
        let map = self.positions.lock().unwrap_or_else(|p| p.into_inner());
        map.get(&Self::key(source_identity, workflow_id)).copied()
    }

    /// Persist a new position. The in-memory map is only updated after
    /// the file write succeeds, so a failed set leaves both views at
    /// the pre-cycle value and the caller's tick aborts without
    /// advancing.
    pub fn set(&self, source_identity: &str, workflow_id: &str, position: u64) -> Result<()> {
        let mut map = self.positions.lock().unwrap_or_else(|p| p.into_inner());
        let key = Self::key(source_identity, workflow_id);
        let mut next = map.clone();
        next.insert(key.clone(), position);

        let json = serde_json::to_string_pretty(&next)
            .map_err(|e| Error::Store(format!("Serialize cursors: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| Error::Store(format!("Write cursors: {e}")))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| Error::Store(format!("Commit cursors: {e}")))?;

        *map = next;
        tracing::debug!("Cursor {key} -> {position}");
        Ok(())
    }

    /// Snapshot of all cursors, for the debug surface.
    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.positions
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }
}
