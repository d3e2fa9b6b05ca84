//! Configuration types for the backup engine.
//!
//! Sectioned TOML configuration with per-field defaults, plus the path
//! helpers that derive the data directory layout.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for one backup run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Maximum messages fetched per conversation per run. A backlog larger
    /// than this drains over successive runs.
    #[serde(default = "default_page_limit")]
    pub page_limit: usize,

    /// Maximum concurrent attachment downloads within one batch.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Output document format: "html" or "text".
    #[serde(default = "default_format")]
    pub format: String,

    /// Conversation names to back up. Empty means all.
    #[serde(default)]
    pub chats: Vec<String>,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            page_limit: default_page_limit(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            format: default_format(),
            chats: Vec::new(),
        }
    }
}

const fn default_page_limit() -> usize {
    200
}

const fn default_max_concurrent_fetches() -> usize {
    8
}

fn default_format() -> String {
    "html".to_string()
}

/// Schedule hint consumed by an external trigger.
///
/// The engine itself is trigger-agnostic; it only exposes these values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Whether the external trigger should run backups at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Time of day (HH:MM) for a daily trigger.
    #[serde(default = "default_daily_at")]
    pub daily_at: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            daily_at: default_daily_at(),
        }
    }
}

const fn default_enabled() -> bool {
    true
}

fn default_daily_at() -> String {
    "16:42".to_string()
}

/// Path configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathConfig {
    /// Base data directory for cursor and config files.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Root directory under which `backup_<date>/` subtrees are created.
    #[serde(default)]
    pub output_root: Option<PathBuf>,
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backup run configuration.
    #[serde(default)]
    pub backup: BackupConfig,

    /// Schedule hint for the external trigger.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Path configuration.
    #[serde(default)]
    pub paths: PathConfig,
}

impl AppConfig {
    /// Get the data directory, using the default if not configured.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.paths
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".telegram-chat-backup")
    }

    /// Get the cursor file path.
    #[must_use]
    pub fn cursor_file_path(&self) -> PathBuf {
        self.data_dir().join("last_ids.json")
    }

    /// Get the config file path.
    #[must_use]
    pub fn config_file_path(&self) -> PathBuf {
        self.data_dir().join("config.toml")
    }

    /// Get the output root, defaulting to the working directory.
    #[must_use]
    pub fn output_root(&self) -> PathBuf {
        self.paths
            .output_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
