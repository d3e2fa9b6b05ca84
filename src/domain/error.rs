//! Domain-level error types for the backup engine.
//!
//! All errors are typed with `thiserror` and map onto the failure taxonomy
//! the orchestrator aggregates: source failures skip a conversation, render
//! failures block that conversation's commit, cursor persistence failures
//! surface as a run-level warning.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the backup engine and its collaborators.
#[derive(Error, Debug)]
pub enum BackupError {
    /// The external message source could not be reached or errored.
    #[error("message source unavailable: {message}")]
    SourceUnavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A single attachment download failed. Isolated per message.
    #[error("attachment fetch failed: {message}")]
    AttachmentFetchFailed { message: String },

    /// Appending to an output document failed; the conversation's cursor
    /// must not advance.
    #[error("render write failed for {path}: {message}")]
    RenderWriteFailed {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The cursor file could not be replaced. The prior file is untouched.
    #[error("cursor persist failed for {path}: {message}")]
    CursorPersistFailed {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Another backup run currently holds the run lock.
    #[error("a backup run is already in progress")]
    RunInProgress,

    /// Every conversation attempted in a run failed.
    #[error("backup failed for all {failed} conversations")]
    AllFailed { failed: usize },

    /// Configuration or environment error.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl BackupError {
    /// Create a source-unavailable error from a plain message.
    pub fn source_unavailable(message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            message: message.into(),
            source: None,
        }
    }

    /// Create a render write error from an IO error.
    pub fn render_write(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::RenderWriteFailed {
            path: path.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create a cursor persistence error from an IO error.
    pub fn cursor_persist(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::CursorPersistFailed {
            path: path.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }
}

/// Result type alias using `BackupError`.
pub type Result<T> = std::result::Result<T, BackupError>;
