//! Telegram Chat Backup - incremental chat history mirroring.
//!
//! The binary exposes inspection and setup commands over the backup data
//! directory. Backup runs are driven by a host that embeds the library and
//! supplies an authenticated message source; see the crate docs.

mod cli;

use clap::Parser;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use telegram_chat_backup::domain::Result;
use telegram_chat_backup::infrastructure::{ensure_config_exists, load_config};
use telegram_chat_backup::CursorStore;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Status => cmd_status(),
        Commands::InitConfig => cmd_init_config(),
        Commands::Paths => cmd_paths(),
    }
}

/// Show cursor state and configuration summary.
fn cmd_status() -> Result<()> {
    let config = load_config()?;
    let cursors = CursorStore::new(config.cursor_file_path()).load();

    println!("{}", "Backup status".bold());
    println!();

    if cursors.is_empty() {
        println!("No conversations backed up yet.");
    } else {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["Conversation", "Last message id"]);

        let mut entries: Vec<_> = cursors.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for (name, last_id) in entries {
            table.add_row(vec![name.as_str(), &last_id.to_string()]);
        }

        println!("{table}");
    }

    println!();
    println!(
        "Format: {}  Page limit: {}  Max concurrent fetches: {}",
        config.backup.format.cyan(),
        config.backup.page_limit.to_string().cyan(),
        config.backup.max_concurrent_fetches.to_string().cyan()
    );
    if config.backup.chats.is_empty() {
        println!("Chats: {}", "all".cyan());
    } else {
        println!("Chats: {}", config.backup.chats.join(", ").cyan());
    }
    println!(
        "Schedule hint: {} at {}",
        if config.schedule.enabled {
            "enabled".green()
        } else {
            "disabled".yellow()
        },
        config.schedule.daily_at
    );

    Ok(())
}

/// Create the default configuration file.
fn cmd_init_config() -> Result<()> {
    ensure_config_exists()?;
    let config = load_config()?;
    println!(
        "{} Configuration ready at {}",
        "✓".green().bold(),
        config.config_file_path().display()
    );
    Ok(())
}

/// Show resolved paths.
fn cmd_paths() -> Result<()> {
    let config = load_config()?;

    println!("{}", "Resolved paths".bold());
    println!();
    println!("  data dir:    {}", config.data_dir().display());
    println!("  config file: {}", config.config_file_path().display());
    println!("  cursor file: {}", config.cursor_file_path().display());
    println!("  output root: {}", config.output_root().display());

    Ok(())
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
