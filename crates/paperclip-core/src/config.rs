use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PaperclipError, Result};

/// Top-level configuration for the paperclip engine.
///
/// Loaded from `~/.paperclip/config.toml` by default. Each section
/// corresponds to one engine component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperclipConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl PaperclipConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PaperclipConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| PaperclipError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.paperclip/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl GeneralConfig {
    /// The data directory with a leading `~` expanded to the home directory.
    pub fn resolved_data_dir(&self) -> PathBuf {
        let dir = &self.data_dir;
        if dir.starts_with("~/") || dir.starts_with("~\\") {
            #[cfg(target_os = "windows")]
            let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
            #[cfg(not(target_os = "windows"))]
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(&dir[2..])
        } else {
            PathBuf::from(dir)
        }
    }
}

/// Frustration detector thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Identical errors needed to raise `repeated_error`.
    pub repeated_error_threshold: u32,
    /// Sliding window for the repeated-error rule, in milliseconds.
    pub repeated_error_window_ms: i64,
    /// Deleted characters needed to raise `rapid_deletion`.
    pub rapid_deletion_threshold: u32,
    /// Sliding window for the rapid-deletion rule, in milliseconds.
    pub rapid_deletion_window_ms: i64,
    /// Uninterrupted productive time before flow state, in milliseconds.
    pub flow_state_threshold_ms: i64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            repeated_error_threshold: 3,
            repeated_error_window_ms: 60_000,
            rapid_deletion_threshold: 50,
            rapid_deletion_window_ms: 5_000,
            flow_state_threshold_ms: 300_000,
        }
    }
}

/// Context store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Same-intent contexts needed for a recurring pattern.
    pub recurring_threshold: usize,
    /// Default horizon for recurring-pattern queries, in hours.
    pub recurring_hours: u32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            recurring_threshold: 3,
            recurring_hours: 24,
        }
    }
}

/// Action capability settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    /// Backup sub-directory created next to overwritten files.
    pub backup_dir_name: String,
    /// Default terminal command timeout, in milliseconds.
    pub terminal_timeout_ms: u64,
    /// Maximum captured bytes per output stream.
    pub terminal_output_cap_bytes: usize,
    /// Timeout for the terminal health probe, in milliseconds.
    pub health_check_timeout_ms: u64,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            backup_dir_name: ".paperclip-backups".to_string(),
            terminal_timeout_ms: 30_000,
            terminal_output_cap_bytes: 10 * 1024 * 1024,
            health_check_timeout_ms: 5_000,
        }
    }
}

/// Active-window monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Whether the window monitor runs at all.
    pub enabled: bool,
    /// Poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Window titles or process names to ignore (case-insensitive substring).
    pub ignored_windows: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 1_000,
            ignored_windows: vec![
                "paperclip".to_string(),
                "clippy".to_string(),
                "electron".to_string(),
            ],
        }
    }
}
