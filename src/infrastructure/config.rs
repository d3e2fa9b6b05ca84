//! Configuration file management.
//!
//! Handles loading and saving TOML configuration files.

use std::fs;
use std::path::Path;

use crate::domain::{AppConfig, BackupError, Result};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# Telegram Chat Backup Configuration
# Auto-generated - edit as needed

[backup]
# Maximum messages fetched per conversation per run (default: 200).
# Larger backlogs drain over successive runs.
page_limit = 200

# Maximum concurrent attachment downloads per batch (default: 8)
max_concurrent_fetches = 8

# Output document format: "html" or "text"
format = "html"

# Conversation names to back up (empty = all)
chats = []

[schedule]
# Hint for an external trigger; the engine never schedules itself
enabled = true
daily_at = "16:42"

[paths]
# Custom data directory (optional, defaults to ~/.telegram-chat-backup)
# data_dir = "/custom/path"

# Root for backup_<date>/ subtrees (optional, defaults to the working dir)
# output_root = "/backups"
"#;

/// Load configuration from the default location or fall back to defaults.
///
/// # Errors
/// Returns error if the file exists but cannot be read or parsed.
pub fn load_config() -> Result<AppConfig> {
    let config_path = AppConfig::default_data_dir().join("config.toml");

    if config_path.exists() {
        load_config_from_file(&config_path)
    } else {
        Ok(AppConfig::default())
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if the file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| BackupError::io(format!("failed to read config file: {}", path.display()), e))?;

    toml::from_str(&content).map_err(|e| BackupError::Config {
        message: format!("failed to parse config file: {e}"),
    })
}

/// Save configuration to its file.
///
/// # Errors
/// Returns error if the file cannot be written.
pub fn save_config(config: &AppConfig) -> Result<()> {
    let config_path = config.config_file_path();

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| BackupError::io("failed to create config directory", e))?;
    }

    let content = toml::to_string_pretty(config).map_err(|e| BackupError::Config {
        message: format!("failed to serialize config: {e}"),
    })?;

    fs::write(&config_path, content).map_err(|e| {
        BackupError::io(format!("failed to write config file: {}", config_path.display()), e)
    })?;

    tracing::info!(path = %config_path.display(), "configuration saved");

    Ok(())
}

/// Create the default configuration file if it doesn't exist.
///
/// # Errors
/// Returns error if the file cannot be created.
pub fn ensure_config_exists() -> Result<()> {
    let config_path = AppConfig::default_data_dir().join("config.toml");

    if !config_path.exists() {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| BackupError::io("failed to create config directory", e))?;
        }

        fs::write(&config_path, DEFAULT_CONFIG)
            .map_err(|e| BackupError::io("failed to create default config", e))?;

        tracing::info!(path = %config_path.display(), "created default configuration");
    }

    Ok(())
}
