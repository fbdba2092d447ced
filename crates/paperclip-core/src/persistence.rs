//! Persistence collaborator contract.
//!
//! Every engine component holds an optional `Arc<dyn Persistence>` and treats
//! it as best-effort: failures are logged and never change the outcome of the
//! operation that triggered the write.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{
    ActionParameters, ActionType, FrustrationSignal, TaskCategory, TaskContext, Timestamp,
};

/// A frustration signal as it was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFrustrationSignal {
    pub id: Uuid,
    pub signal: FrustrationSignal,
    pub created_at: Timestamp,
}

/// A context snapshot as it was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredContextSnapshot {
    pub context: TaskContext,
    pub created_at: Timestamp,
}

/// One executed action, written after a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionHistoryEntry {
    pub action_id: Uuid,
    pub context_id: Uuid,
    pub action_type: ActionType,
    pub parameters: ActionParameters,
    pub success: bool,
    pub output: Option<serde_json::Value>,
    pub rollback_data: Option<serde_json::Value>,
    pub timestamp: Timestamp,
}

/// An action-history entry as it was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredActionHistory {
    pub id: Uuid,
    pub entry: ActionHistoryEntry,
    pub created_at: Timestamp,
}

/// Append-only record keeping plus a flat preference store.
pub trait Persistence: Send + Sync {
    /// Record a signal; returns the id of the stored record.
    fn save_frustration_signal(&self, signal: &FrustrationSignal) -> Result<Uuid>;

    fn get_frustration_signal(&self, id: Uuid) -> Result<Option<StoredFrustrationSignal>>;

    /// Most recent signals first.
    fn recent_frustration_signals(&self, limit: usize) -> Result<Vec<StoredFrustrationSignal>>;

    /// Record a context snapshot under the context's own id.
    fn save_context_snapshot(&self, context: &TaskContext) -> Result<()>;

    fn get_context_snapshot(&self, id: Uuid) -> Result<Option<StoredContextSnapshot>>;

    /// Snapshots with the given intent captured in the last `hours_back`
    /// hours, newest first.
    fn context_snapshots_by_intent(
        &self,
        intent: TaskCategory,
        hours_back: u32,
    ) -> Result<Vec<StoredContextSnapshot>>;

    /// Record an action-history entry; returns the id of the stored record.
    fn save_action_history(&self, entry: &ActionHistoryEntry) -> Result<Uuid>;

    fn get_action_history(&self, id: Uuid) -> Result<Option<StoredActionHistory>>;

    /// Most recent action-history entries first.
    fn recent_action_history(&self, limit: usize) -> Result<Vec<StoredActionHistory>>;

    /// Insert or replace a preference value.
    fn set_preference(&self, key: &str, value: &str) -> Result<()>;

    fn get_preference(&self, key: &str) -> Result<Option<String>>;

    /// Remove every record and preference.
    fn delete_all_data(&self) -> Result<()>;
}
