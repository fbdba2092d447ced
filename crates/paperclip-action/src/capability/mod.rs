//! Capability seams the orchestrator routes actions through.
//!
//! Each capability is a trait so tests (and alternative hosts) can swap in
//! their own backing. The `Local*` / `SystemBrowser` implementations talk to
//! the real filesystem, shell, and desktop browser.

pub mod browser;
pub mod filesystem;
pub mod terminal;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use paperclip_core::config::ActionsConfig;

use crate::error::CapabilityError;

pub use browser::SystemBrowser;
pub use filesystem::LocalFilesystem;
pub use terminal::LocalTerminal;

pub type CapabilityResult<T> = std::result::Result<T, CapabilityError>;

// =============================================================================
// Outputs
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReadOutput {
    pub content: String,
    pub encoding: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileWriteOutput {
    pub success: bool,
    /// Copy of the previous contents, if the file existed before the write.
    pub backup_path: Option<PathBuf>,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub timed_out: bool,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowserOutput {
    pub success: bool,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// Traits
// =============================================================================

#[async_trait]
pub trait FilesystemCapability: Send + Sync {
    async fn read(&self, path: &Path) -> CapabilityResult<FileReadOutput>;

    /// Write `content`, backing up any existing file first.
    async fn write(&self, path: &Path, content: &str) -> CapabilityResult<FileWriteOutput>;

    /// Copy `backup` over `target`. `Ok(false)` when the backup is gone.
    async fn restore(&self, backup: &Path, target: &Path) -> CapabilityResult<bool>;

    /// Entry names of a directory, sorted.
    async fn list_directory(&self, path: &Path) -> CapabilityResult<Vec<String>>;
}

#[async_trait]
pub trait TerminalCapability: Send + Sync {
    /// Run `command` through the platform shell. Timeouts and cancellation
    /// are reported in the output; only a failure to start is an error.
    async fn run(
        &self,
        command: &str,
        timeout: Option<Duration>,
        cancel: CancellationToken,
    ) -> CapabilityResult<CommandOutput>;
}

#[async_trait]
pub trait BrowserCapability: Send + Sync {
    /// Open `url` in the default browser. Never fails; rejection and launch
    /// problems are reported through `BrowserOutput::error`.
    async fn open(&self, url: &str) -> BrowserOutput;
}

/// The set of capabilities an orchestrator routes through.
#[derive(Clone)]
pub struct Capabilities {
    pub filesystem: Arc<dyn FilesystemCapability>,
    pub terminal: Arc<dyn TerminalCapability>,
    pub browser: Arc<dyn BrowserCapability>,
}

impl Capabilities {
    /// Capabilities backed by the local machine.
    pub fn local(config: &ActionsConfig) -> Self {
        Self {
            filesystem: Arc::new(LocalFilesystem::new(&config.backup_dir_name)),
            terminal: Arc::new(LocalTerminal::new(
                Duration::from_millis(config.terminal_timeout_ms),
                config.terminal_output_cap_bytes,
            )),
            browser: Arc::new(SystemBrowser::new()),
        }
    }
}
