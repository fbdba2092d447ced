//! Pre-action snapshots and the per-type rollback table.
//!
//! An action type is reversible exactly when the table holds a procedure
//! for it. The orchestrator only stores snapshots for reversible types.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use paperclip_core::{ActionRequest, ActionType, Timestamp};

use crate::capability::Capabilities;
use crate::error::{ActionError, CapabilityError};

// =============================================================================
// Snapshot data
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OriginalFile {
    /// The file existed; `backup_path` is filled once the write has run.
    Existing {
        content: String,
        backup_path: Option<PathBuf>,
    },
    /// The file did not exist before the write.
    New,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileWriteSnapshot {
    pub original_path: PathBuf,
    pub original: OriginalFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SnapshotData {
    FileWrite(FileWriteSnapshot),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollbackSnapshot {
    pub action_id: Uuid,
    pub action_type: ActionType,
    pub data: SnapshotData,
    pub timestamp: Timestamp,
}

// =============================================================================
// Procedures
// =============================================================================

#[async_trait]
pub trait RollbackProcedure: Send + Sync {
    /// Record the state `request` is about to change.
    async fn capture(
        &self,
        request: &ActionRequest,
        capabilities: &Capabilities,
    ) -> Result<SnapshotData, ActionError>;

    /// Fold details only known after execution into the snapshot.
    fn record_output(&self, _data: &mut SnapshotData, _output: &serde_json::Value) {}

    /// Put the captured state back.
    async fn restore(&self, data: &SnapshotData, capabilities: &Capabilities) -> Result<(), ActionError>;
}

pub(crate) fn required_path(request: &ActionRequest) -> Result<PathBuf, ActionError> {
    request
        .str_param("path")
        .map(PathBuf::from)
        .ok_or(ActionError::MissingParameter {
            action: request.action_type,
            name: "path",
        })
}

/// Undo a file write: copy the backup back, or rewrite the captured content.
pub struct FileWriteRollback;

#[async_trait]
impl RollbackProcedure for FileWriteRollback {
    async fn capture(
        &self,
        request: &ActionRequest,
        capabilities: &Capabilities,
    ) -> Result<SnapshotData, ActionError> {
        let original_path = required_path(request)?;
        let original = match capabilities.filesystem.read(&original_path).await {
            Ok(existing) => OriginalFile::Existing {
                content: existing.content,
                backup_path: None,
            },
            Err(e) => {
                debug!(path = %original_path.display(), error = %e, "No original file to snapshot");
                OriginalFile::New
            }
        };
        Ok(SnapshotData::FileWrite(FileWriteSnapshot {
            original_path,
            original,
        }))
    }

    fn record_output(&self, data: &mut SnapshotData, output: &serde_json::Value) {
        let SnapshotData::FileWrite(snapshot) = data;
        if let OriginalFile::Existing { backup_path, .. } = &mut snapshot.original {
            if let Some(path) = output.get("backup_path").and_then(|v| v.as_str()) {
                *backup_path = Some(PathBuf::from(path));
            }
        }
    }

    async fn restore(&self, data: &SnapshotData, capabilities: &Capabilities) -> Result<(), ActionError> {
        let SnapshotData::FileWrite(snapshot) = data;
        let target = &snapshot.original_path;
        match &snapshot.original {
            OriginalFile::Existing {
                backup_path: Some(backup),
                ..
            } => {
                if !capabilities.filesystem.restore(backup, target).await? {
                    return Err(CapabilityError::RestoreFailed {
                        backup: backup.clone(),
                        target: target.clone(),
                    }
                    .into());
                }
            }
            OriginalFile::Existing {
                content,
                backup_path: None,
            } => {
                capabilities.filesystem.write(target, content).await?;
            }
            // Nothing to restore; the file the write created stays on disk.
            OriginalFile::New => {}
        }
        Ok(())
    }
}

// =============================================================================
// Table
// =============================================================================

/// Maps action types to their rollback procedure. A missing entry means the
/// type cannot be rolled back.
#[derive(Clone, Default)]
pub struct RollbackTable {
    procedures: HashMap<ActionType, Arc<dyn RollbackProcedure>>,
}

impl RollbackTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in table: only `file_write` is reversible.
    pub fn standard() -> Self {
        let mut table = Self::empty();
        table.register(ActionType::FileWrite, Arc::new(FileWriteRollback));
        table
    }

    pub fn register(&mut self, action_type: ActionType, procedure: Arc<dyn RollbackProcedure>) {
        self.procedures.insert(action_type, procedure);
    }

    pub fn get(&self, action_type: ActionType) -> Option<&Arc<dyn RollbackProcedure>> {
        self.procedures.get(&action_type)
    }

    pub fn supports(&self, action_type: ActionType) -> bool {
        self.procedures.contains_key(&action_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_standard_table() {
        let table = RollbackTable::standard();
        assert!(table.supports(ActionType::FileWrite));
        for t in [
            ActionType::FileRead,
            ActionType::TerminalExecute,
            ActionType::BrowserOpen,
            ActionType::GenerateText,
        ] {
            assert!(!table.supports(t), "{} should not be reversible", t);
        }
    }

    #[test]
    fn test_record_output_fills_backup_path() {
        let mut data = SnapshotData::FileWrite(FileWriteSnapshot {
            original_path: PathBuf::from("/tmp/a.txt"),
            original: OriginalFile::Existing {
                content: "old".to_string(),
                backup_path: None,
            },
        });
        FileWriteRollback.record_output(&mut data, &json!({"backup_path": "/tmp/.b/a.txt.1.bak"}));
        let SnapshotData::FileWrite(snapshot) = &data;
        assert_eq!(
            snapshot.original,
            OriginalFile::Existing {
                content: "old".to_string(),
                backup_path: Some(PathBuf::from("/tmp/.b/a.txt.1.bak")),
            }
        );
    }

    #[test]
    fn test_record_output_ignores_new_files() {
        let mut data = SnapshotData::FileWrite(FileWriteSnapshot {
            original_path: PathBuf::from("/tmp/new.txt"),
            original: OriginalFile::New,
        });
        FileWriteRollback.record_output(&mut data, &json!({"backup_path": null}));
        let SnapshotData::FileWrite(snapshot) = &data;
        assert_eq!(snapshot.original, OriginalFile::New);
    }

    #[test]
    fn test_snapshot_serializes_tagged() {
        let data = SnapshotData::FileWrite(FileWriteSnapshot {
            original_path: PathBuf::from("/tmp/new.txt"),
            original: OriginalFile::New,
        });
        let value = serde_json::to_value(&data).unwrap();
        assert_eq!(value["type"], "file_write");
        assert_eq!(value["original"]["state"], "new");
    }
}
