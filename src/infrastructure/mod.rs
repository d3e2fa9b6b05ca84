//! Infrastructure layer - filesystem adapters.
//!
//! This layer handles durable state (cursor file, config file) and the
//! output directory convention.

pub mod config;
pub mod cursor_store;
pub mod layout;

pub use config::{ensure_config_exists, load_config, load_config_from_file, save_config};
pub use cursor_store::CursorStore;
pub use layout::{sanitize_name, ChatPaths, OutputLayout};
