//! Error types for the action orchestrator and its capabilities.

use std::path::PathBuf;

use paperclip_core::error::PaperclipError;
use paperclip_core::ActionType;

/// Failures raised by a backing capability (filesystem, terminal, browser).
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to spawn command: {0}")]
    Spawn(String),
    #[error("Failed to restore {} from backup {}", target.display(), backup.display())]
    RestoreFailed { backup: PathBuf, target: PathBuf },
}

impl CapabilityError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CapabilityError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while executing a single action request.
///
/// These never escape `ActionOrchestrator::execute`; they become the
/// `error` message of a failed `ActionResult`.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Unknown action type: {0}")]
    UnknownActionType(ActionType),
    #[error("Missing parameter '{name}' for {action}")]
    MissingParameter { action: ActionType, name: &'static str },
    #[error(transparent)]
    Capability(#[from] CapabilityError),
    #[error("Failed to encode action output: {0}")]
    Output(#[from] serde_json::Error),
}

impl From<ActionError> for PaperclipError {
    fn from(err: ActionError) -> Self {
        PaperclipError::Capability(err.to_string())
    }
}
