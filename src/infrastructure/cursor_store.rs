//! Durable per-conversation cursor storage.
//!
//! The cursor map is the only cross-run state: conversation name to last
//! committed message id, serialized as a single JSON document. Saves replace
//! the whole file via a temp-file-then-rename so a crash mid-write leaves
//! the prior cursors intact.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{BackupError, CursorMap, Result};

/// File-backed store for the cursor map.
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    /// Create a store backed by the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cursor map.
    ///
    /// A missing or unreadable file yields an empty map: a fresh backup must
    /// still proceed, and re-processing is idempotent by id comparison.
    /// Corrupt content is logged and treated the same way.
    #[must_use]
    pub fn load(&self) -> CursorMap {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "no cursor file, starting fresh");
                return CursorMap::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "corrupt cursor file, starting fresh");
                CursorMap::new()
            }
        }
    }

    /// Replace the stored cursor map.
    ///
    /// Writes the serialized map to a sibling temp file and renames it over
    /// the target, so readers never observe a partial document.
    ///
    /// # Errors
    /// Returns [`BackupError::CursorPersistFailed`] if the file cannot be
    /// written or renamed; the prior file is left untouched.
    pub fn save(&self, cursors: &CursorMap) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| BackupError::cursor_persist(&self.path, e))?;
        }

        let content = serde_json::to_string_pretty(cursors).map_err(|e| {
            BackupError::CursorPersistFailed {
                path: self.path.clone(),
                message: format!("failed to serialize cursors: {e}"),
                source: None,
            }
        })?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|e| BackupError::cursor_persist(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| BackupError::cursor_persist(&self.path, e))?;

        tracing::debug!(path = %self.path.display(), entries = cursors.len(), "cursors saved");

        Ok(())
    }
}
