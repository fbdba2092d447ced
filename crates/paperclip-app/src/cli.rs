//! CLI argument definitions for the Paperclip binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Paperclip: watches for signs of frustration and steps in with an action.
#[derive(Parser, Debug)]
#[command(name = "paperclip", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Data directory for the SQLite database.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Read NDJSON events from stdin and print assistant messages (default).
    Run {
        /// Do not poll the focused window.
        #[arg(long = "no-monitor")]
        no_monitor: bool,
    },
    /// Probe the filesystem, terminal, and browser capabilities.
    Health,
    /// Delete every stored signal, context, action, and preference.
    Wipe,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > PAPERCLIP_CONFIG env var > ~/.paperclip/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("PAPERCLIP_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or(Command::Run { no_monitor: false })
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".paperclip").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".paperclip").join("config.toml");
    }
    PathBuf::from("config.toml")
}
