//! Domain layer - core types and errors.
//!
//! This layer contains pure domain models, configuration and error types
//! without any external dependencies (network, IO, etc.).

pub mod config;
pub mod error;
pub mod models;

pub use config::{AppConfig, BackupConfig, PathConfig, ScheduleConfig};
pub use error::{BackupError, Result};
pub use models::{
    AttachmentRef, ChatReport, Conversation, CursorMap, MediaAsset, MediaClass, MediaOutcome,
    Message, RunReport,
};
