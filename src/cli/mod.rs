//! CLI interface using clap.
//!
//! Inspection and setup commands for the backup data directory. The backup
//! run itself is invoked by a host embedding the library with a real
//! message source.

use clap::{Parser, Subcommand};

/// Telegram Chat Backup - inspect and manage incremental backup state.
#[derive(Parser, Debug)]
#[command(name = "tg-backup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show per-conversation cursor state and configuration summary.
    Status,

    /// Create the default configuration file if it doesn't exist.
    InitConfig,

    /// Show resolved data and output paths.
    Paths,
}
