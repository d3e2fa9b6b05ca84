//! Output directory layout.
//!
//! Maps a conversation and the calendar date of the run to the
//! `backup_<date>/<conversation>/{messages.<ext>, media/}` convention.
//! Purely deterministic: repeated runs within the same day target the same
//! document.

use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::domain::{BackupError, Result};

const MEDIA_DIR_NAME: &str = "media";
const DOCUMENT_STEM: &str = "messages";

/// Resolved output paths for one conversation on one run date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPaths {
    /// The append-only output document.
    pub document: PathBuf,
    /// Directory attachments are downloaded into.
    pub media_dir: PathBuf,
}

/// Derives output paths under a configured root.
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    /// Create a layout rooted at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Compute the document and media paths for a conversation.
    ///
    /// Derivable purely from the conversation name and the run date, never
    /// from message dates.
    #[must_use]
    pub fn path_for(&self, conversation: &str, run_date: NaiveDate, extension: &str) -> ChatPaths {
        let chat_dir = self
            .root
            .join(format!("backup_{}", run_date.format("%Y-%m-%d")))
            .join(sanitize_name(conversation));

        ChatPaths {
            document: chat_dir.join(format!("{DOCUMENT_STEM}.{extension}")),
            media_dir: chat_dir.join(MEDIA_DIR_NAME),
        }
    }

    /// Create the media directory (and parents) if it does not exist yet.
    ///
    /// Must run before any fetch targets the directory.
    ///
    /// # Errors
    /// Returns an IO error if the directory cannot be created.
    pub fn ensure(&self, paths: &ChatPaths) -> Result<()> {
        fs::create_dir_all(&paths.media_dir).map_err(|e| {
            BackupError::io(
                format!("failed to create media dir {}", paths.media_dir.display()),
                e,
            )
        })
    }
}

/// Make a conversation name safe as a directory component.
///
/// Whitespace and path-hostile characters become `_`, so distinct names
/// stay distinct instead of colliding into one directory.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() {
        "chat".to_string()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn paths_follow_convention() {
        let layout = OutputLayout::new("/backups");
        let paths = layout.path_for("Family Group", date(2025, 3, 9), "html");

        assert_eq!(
            paths.document,
            PathBuf::from("/backups/backup_2025-03-09/Family_Group/messages.html")
        );
        assert_eq!(
            paths.media_dir,
            PathBuf::from("/backups/backup_2025-03-09/Family_Group/media")
        );
    }

    #[test]
    fn same_day_targets_same_document() {
        let layout = OutputLayout::new("/backups");
        let a = layout.path_for("alice", date(2025, 3, 9), "txt");
        let b = layout.path_for("alice", date(2025, 3, 9), "txt");
        assert_eq!(a, b);
    }

    #[test]
    fn sanitize_replaces_hostile_characters() {
        assert_eq!(sanitize_name("Family Group"), "Family_Group");
        assert_eq!(sanitize_name("a/b\\c:d"), "a_b_c_d");
        assert_eq!(sanitize_name("../../etc"), ".._.._etc");
        assert_eq!(sanitize_name(""), "chat");
    }

    #[test]
    fn sanitize_keeps_distinct_names_distinct() {
        assert_ne!(sanitize_name("a/b"), sanitize_name("ab"));
        assert_ne!(sanitize_name("a:b"), sanitize_name("a.b"));
    }

    #[test]
    fn ensure_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        let paths = layout.path_for("alice", date(2025, 3, 9), "html");

        layout.ensure(&paths).unwrap();
        layout.ensure(&paths).unwrap();
        assert!(paths.media_dir.is_dir());
    }
}
