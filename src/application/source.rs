//! The message-source seam.
//!
//! The engine consumes an already-authenticated source; login flows,
//! rate limiting and pagination mechanics live behind this trait.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Local, NaiveDate};

use crate::domain::{AttachmentRef, Conversation, Message, Result};

/// An authenticated remote chat service.
///
/// Implementations map errors into
/// [`BackupError::SourceUnavailable`](crate::domain::BackupError::SourceUnavailable)
/// for list/fetch failures; attachment download errors are isolated per
/// message by the engine.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Resolve the conversations visible to the account.
    async fn list_conversations(&self) -> Result<Vec<Conversation>>;

    /// Fetch up to `limit` messages with id greater than `min_id`.
    ///
    /// The returned order is unspecified; the engine normalizes to
    /// oldest-first.
    async fn get_messages(
        &self,
        conversation: &Conversation,
        min_id: i64,
        limit: usize,
    ) -> Result<Vec<Message>>;

    /// Download one attachment into `dest_dir`, returning the local path.
    async fn download_attachment(
        &self,
        attachment: &AttachmentRef,
        dest_dir: &Path,
    ) -> Result<PathBuf>;
}

/// Immutable per-run context passed into component calls.
#[derive(Debug, Clone, Copy)]
pub struct RunContext {
    /// Calendar date of the run; selects the output bucket.
    pub run_date: NaiveDate,
}

impl RunContext {
    /// Context for a run starting now, in local time.
    #[must_use]
    pub fn for_today() -> Self {
        Self {
            run_date: Local::now().date_naive(),
        }
    }

    /// Context pinned to a specific date.
    #[must_use]
    pub const fn for_date(run_date: NaiveDate) -> Self {
        Self { run_date }
    }
}
