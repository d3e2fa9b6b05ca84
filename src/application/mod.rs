//! Application layer - the backup engine and its collaborators.
//!
//! This layer contains the orchestrating state machine, the bounded media
//! fetcher, the append-only renderer and the message-source seam.

pub mod media;
pub mod orchestrator;
pub mod renderer;
pub mod source;

pub use media::MediaFetcher;
pub use orchestrator::BackupEngine;
pub use renderer::{RenderFormat, Renderer};
pub use source::{MessageSource, RunContext};
