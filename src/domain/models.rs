//! Domain models for the backup engine.
//!
//! These types flow between the orchestrator, media fetcher and renderer.
//! Messages are owned transiently for the duration of one batch and are
//! never persisted; the only durable cross-run state is the cursor map.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

/// A conversation as resolved from the external message source.
///
/// Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    /// Source-side identifier.
    pub id: i64,
    /// Display name; also the cursor key and directory name seed.
    pub name: String,
}

impl Conversation {
    #[must_use]
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Opaque reference to a remote attachment, resolvable only by the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef(pub String);

impl AttachmentRef {
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }
}

/// One message within a conversation.
///
/// Ids increase monotonically within a conversation; the engine relies on
/// that for cursor comparison and batch ordering.
#[derive(Debug, Clone)]
pub struct Message {
    /// Monotonically increasing id within the conversation.
    pub id: i64,
    /// When the message was sent.
    pub date: DateTime<Utc>,
    /// Sender display name or identifier.
    pub sender: String,
    /// Whether the backed-up account sent this message.
    pub outgoing: bool,
    /// Text body, if any.
    pub text: Option<String>,
    /// At most one attachment reference.
    pub attachment: Option<AttachmentRef>,
}

impl Message {
    /// Whether this message carries an attachment.
    #[must_use]
    pub const fn has_attachment(&self) -> bool {
        self.attachment.is_some()
    }
}

/// Coarse content class of a fetched attachment, advisory only.
///
/// Drives the rendering strategy; never blocks a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaClass {
    Image,
    Video,
    Document,
    Other,
}

/// Extension families per content class.
const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];
const VIDEO_EXTS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm"];
const DOCUMENT_EXTS: &[&str] = &["pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt"];

impl MediaClass {
    /// Classify a local file by its extension family.
    ///
    /// Unknown or missing extensions classify as [`Self::Other`].
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return Self::Other;
        };
        let ext = ext.to_lowercase();

        if IMAGE_EXTS.contains(&ext.as_str()) {
            Self::Image
        } else if VIDEO_EXTS.contains(&ext.as_str()) {
            Self::Video
        } else if DOCUMENT_EXTS.contains(&ext.as_str()) {
            Self::Document
        } else {
            Self::Other
        }
    }
}

impl std::fmt::Display for MediaClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
            Self::Document => write!(f, "document"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// A fetched attachment: local path plus content class.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    /// Where the attachment landed on disk.
    pub path: PathBuf,
    /// Advisory content class derived from the file extension.
    pub class: MediaClass,
}

impl MediaAsset {
    /// Create an asset, classifying by the path's extension.
    #[must_use]
    pub fn from_downloaded(path: PathBuf) -> Self {
        let class = MediaClass::from_path(&path);
        Self { path, class }
    }

    /// File name component of the local path.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("attachment")
    }
}

/// Per-message result of the media fetch phase, aligned with the batch.
#[derive(Debug, Clone)]
pub enum MediaOutcome {
    /// The message has no attachment.
    Absent,
    /// The attachment was downloaded and classified.
    Fetched(MediaAsset),
    /// The fetch failed; rendered as a text-only fallback.
    Failed(String),
}

/// Durable per-conversation progress: name to last committed message id.
pub type CursorMap = HashMap<String, i64>;

/// Outcome of one conversation within a run.
#[derive(Debug, Clone, Default)]
pub struct ChatReport {
    /// Conversation name.
    pub conversation: String,
    /// Messages appended to the output document.
    pub messages_written: usize,
    /// Attachments fetched and referenced.
    pub media_written: usize,
    /// Attachments that failed to fetch (rendered as fallback).
    pub media_failed: usize,
    /// Reason the conversation was skipped, if it was.
    pub skipped: Option<String>,
}

impl ChatReport {
    /// Report for a conversation with no new messages.
    #[must_use]
    pub fn empty(conversation: impl Into<String>) -> Self {
        Self {
            conversation: conversation.into(),
            ..Self::default()
        }
    }

    /// Report for a conversation skipped with a reason.
    #[must_use]
    pub fn skipped(conversation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            conversation: conversation.into(),
            skipped: Some(reason.into()),
            ..Self::default()
        }
    }
}

/// Aggregate result of one backup run across all selected conversations.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Per-conversation outcomes, in processing order.
    pub chats: Vec<ChatReport>,
    /// Set when the cursor file could not be replaced at the end of the run.
    pub cursor_warning: Option<String>,
}

impl RunReport {
    /// Total messages written across all conversations.
    #[must_use]
    pub fn total_messages(&self) -> usize {
        self.chats.iter().map(|c| c.messages_written).sum()
    }

    /// Total media files written across all conversations.
    #[must_use]
    pub fn total_media(&self) -> usize {
        self.chats.iter().map(|c| c.media_written).sum()
    }

    /// Total media fetch failures across all conversations.
    #[must_use]
    pub fn total_media_failed(&self) -> usize {
        self.chats.iter().map(|c| c.media_failed).sum()
    }

    /// Conversations skipped with an error.
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.chats.iter().filter(|c| c.skipped.is_some()).count()
    }
}
