//! Incremental backup engine for chat histories.
//!
//! Mirrors conversation histories from a remote chat service into local
//! files, tracking per-conversation progress so repeated runs fetch only new
//! content. The host supplies an already-authenticated [`MessageSource`];
//! the engine handles cursor-based delta computation, bounded-concurrency
//! attachment retrieval and idempotent append-only rendering.
//!
//! ```no_run
//! # async fn example(source: std::sync::Arc<impl telegram_chat_backup::MessageSource + 'static>) -> telegram_chat_backup::Result<()> {
//! use telegram_chat_backup::{AppConfig, BackupEngine};
//!
//! let engine = BackupEngine::new(AppConfig::default(), source)?;
//! let report = engine.run().await?;
//! println!("{} messages, {} media files", report.total_messages(), report.total_media());
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{BackupEngine, MediaFetcher, MessageSource, RenderFormat, Renderer, RunContext};
pub use domain::{
    AppConfig, AttachmentRef, BackupError, ChatReport, Conversation, CursorMap, MediaAsset,
    MediaClass, MediaOutcome, Message, Result, RunReport,
};
pub use infrastructure::{CursorStore, OutputLayout};
