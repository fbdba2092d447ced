//! Action orchestrator.
//!
//! Routes action requests to the filesystem, terminal, and browser
//! capabilities, snapshotting reversible actions beforehand and rolling
//! them back when execution fails. `execute` never returns an error; every
//! outcome is an `ActionResult`.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use paperclip_core::config::ActionsConfig;
use paperclip_core::persistence::ActionHistoryEntry;
use paperclip_core::{ActionRequest, ActionResult, ActionType, Clock, Persistence, TaskContext};

use crate::capability::Capabilities;
use crate::error::ActionError;
use crate::rollback::{required_path, RollbackSnapshot, RollbackTable};

/// Action types offered for any context, in preference order.
const AVAILABLE_ACTIONS: [ActionType; 4] = [
    ActionType::FileRead,
    ActionType::FileWrite,
    ActionType::TerminalExecute,
    ActionType::BrowserOpen,
];

const HEALTH_PROBE_COMMAND: &str = "echo test";

// =============================================================================
// Capability kinds
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Filesystem,
    Terminal,
    Browser,
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilityKind::Filesystem => write!(f, "filesystem"),
            CapabilityKind::Terminal => write!(f, "terminal"),
            CapabilityKind::Browser => write!(f, "browser"),
        }
    }
}

impl std::str::FromStr for CapabilityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "filesystem" => Ok(CapabilityKind::Filesystem),
            "terminal" => Ok(CapabilityKind::Terminal),
            "browser" => Ok(CapabilityKind::Browser),
            _ => Err(format!("Unknown capability: {}", s)),
        }
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

pub struct ActionOrchestrator {
    capabilities: Capabilities,
    rollbacks: RollbackTable,
    snapshots: Mutex<HashMap<Uuid, RollbackSnapshot>>,
    persistence: Option<Arc<dyn Persistence>>,
    config: ActionsConfig,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
}

impl ActionOrchestrator {
    pub fn new(capabilities: Capabilities, config: ActionsConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            capabilities,
            rollbacks: RollbackTable::standard(),
            snapshots: Mutex::new(HashMap::new()),
            persistence: None,
            config,
            clock,
            shutdown: CancellationToken::new(),
        }
    }

    /// Record successful actions through `persistence`.
    pub fn with_persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    pub fn with_rollback_table(mut self, table: RollbackTable) -> Self {
        self.rollbacks = table;
        self
    }

    fn snapshots(&self) -> MutexGuard<'_, HashMap<Uuid, RollbackSnapshot>> {
        self.snapshots.lock().unwrap_or_else(|e| e.into_inner())
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Execute `request`. The result's `action_id` is always `request.id`.
    ///
    /// On success `rollback_available` says whether a snapshot is held. On
    /// failure the action is rolled back and `rollback_available` reports
    /// whether that rollback succeeded.
    pub async fn execute(&self, request: ActionRequest) -> ActionResult {
        let action_id = request.id;
        match self.try_execute(&request).await {
            Ok(output) => {
                self.record_history(&request, &output);
                let rollback_available = self.has_snapshot(action_id);
                info!(
                    action_id = %action_id,
                    action_type = %request.action_type,
                    rollback_available,
                    "Action executed"
                );
                ActionResult::succeeded(action_id, output, rollback_available)
            }
            Err(e) => {
                warn!(
                    action_id = %action_id,
                    action_type = %request.action_type,
                    error = %e,
                    "Action failed"
                );
                let rolled_back = self.rollback(action_id).await;
                ActionResult::failed(action_id, e.to_string(), rolled_back)
            }
        }
    }

    async fn try_execute(&self, request: &ActionRequest) -> Result<serde_json::Value, ActionError> {
        let procedure = self.rollbacks.get(request.action_type).cloned();

        if let Some(procedure) = &procedure {
            let data = procedure.capture(request, &self.capabilities).await?;
            self.snapshots().insert(
                request.id,
                RollbackSnapshot {
                    action_id: request.id,
                    action_type: request.action_type,
                    data,
                    timestamp: self.clock.now(),
                },
            );
        }

        let output = self.route(request).await?;

        if let Some(procedure) = &procedure {
            if let Some(snapshot) = self.snapshots().get_mut(&request.id) {
                procedure.record_output(&mut snapshot.data, &output);
            }
        }
        Ok(output)
    }

    async fn route(&self, request: &ActionRequest) -> Result<serde_json::Value, ActionError> {
        let output = match request.action_type {
            ActionType::FileRead => {
                let path = required_path(request)?;
                serde_json::to_value(self.capabilities.filesystem.read(&path).await?)?
            }
            ActionType::FileWrite => {
                let path = required_path(request)?;
                let content = required_str(request, "content")?;
                serde_json::to_value(self.capabilities.filesystem.write(&path, content).await?)?
            }
            ActionType::TerminalExecute => {
                let command = required_str(request, "command")?;
                let timeout = request
                    .parameters
                    .get("timeout")
                    .and_then(|v| v.as_u64())
                    .filter(|ms| *ms > 0)
                    .map(Duration::from_millis);
                let out = self
                    .capabilities
                    .terminal
                    .run(command, timeout, self.shutdown.child_token())
                    .await?;
                serde_json::to_value(out)?
            }
            ActionType::BrowserOpen => {
                let url = required_str(request, "url")?;
                serde_json::to_value(self.capabilities.browser.open(url).await)?
            }
            ActionType::GenerateText => {
                return Err(ActionError::UnknownActionType(request.action_type));
            }
        };
        Ok(output)
    }

    fn record_history(&self, request: &ActionRequest, output: &serde_json::Value) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        let rollback_data = self
            .snapshots()
            .get(&request.id)
            .and_then(|s| serde_json::to_value(&s.data).ok());
        let entry = ActionHistoryEntry {
            action_id: request.id,
            context_id: request.context_id,
            action_type: request.action_type,
            parameters: request.parameters.clone(),
            success: true,
            output: Some(output.clone()),
            rollback_data,
            timestamp: self.clock.now(),
        };
        if let Err(e) = persistence.save_action_history(&entry) {
            warn!(error = %e, action_id = %request.id, "Failed to persist action history");
        }
    }

    // =========================================================================
    // Rollback
    // =========================================================================

    /// Undo the action with `action_id`.
    ///
    /// Returns false when no snapshot is held, when the action type has no
    /// rollback procedure, or when restoring fails. The snapshot is only
    /// discarded after a successful restore.
    pub async fn rollback(&self, action_id: Uuid) -> bool {
        let Some(snapshot) = self.snapshots().get(&action_id).cloned() else {
            debug!(action_id = %action_id, "No snapshot to roll back");
            return false;
        };
        let Some(procedure) = self.rollbacks.get(snapshot.action_type).cloned() else {
            debug!(
                action_id = %action_id,
                action_type = %snapshot.action_type,
                "Action type has no rollback procedure"
            );
            return false;
        };

        match procedure.restore(&snapshot.data, &self.capabilities).await {
            Ok(()) => {
                self.snapshots().remove(&action_id);
                info!(action_id = %action_id, "Action rolled back");
                true
            }
            Err(e) => {
                warn!(action_id = %action_id, error = %e, "Rollback failed");
                false
            }
        }
    }

    pub fn has_snapshot(&self, action_id: Uuid) -> bool {
        self.snapshots().contains_key(&action_id)
    }

    pub fn snapshot(&self, action_id: Uuid) -> Option<RollbackSnapshot> {
        self.snapshots().get(&action_id).cloned()
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots().len()
    }

    pub fn clear_snapshots(&self) {
        self.snapshots().clear();
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Action types that can be offered for `context`.
    pub fn available_actions(&self, _context: &TaskContext) -> Vec<ActionType> {
        AVAILABLE_ACTIONS.to_vec()
    }

    /// Probe one capability. Never fails; problems read as unhealthy.
    pub async fn check_capability_health(&self, kind: CapabilityKind) -> bool {
        let healthy = match kind {
            CapabilityKind::Filesystem => self
                .capabilities
                .filesystem
                .list_directory(Path::new("."))
                .await
                .is_ok(),
            CapabilityKind::Terminal => {
                let timeout = Duration::from_millis(self.config.health_check_timeout_ms);
                match self
                    .capabilities
                    .terminal
                    .run(HEALTH_PROBE_COMMAND, Some(timeout), self.shutdown.child_token())
                    .await
                {
                    Ok(out) => out.exit_code == 0,
                    Err(_) => false,
                }
            }
            CapabilityKind::Browser => true,
        };
        debug!(capability = %kind, healthy, "Capability health checked");
        healthy
    }

    /// Probe a capability by name. Unknown names are unhealthy.
    pub async fn check_server_health(&self, name: &str) -> bool {
        match name.parse::<CapabilityKind>() {
            Ok(kind) => self.check_capability_health(kind).await,
            Err(e) => {
                debug!(error = %e, "Health check for unknown capability");
                false
            }
        }
    }

    /// Cancel every in-flight terminal command.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

fn required_str<'a>(request: &'a ActionRequest, name: &'static str) -> Result<&'a str, ActionError> {
    request.str_param(name).ok_or(ActionError::MissingParameter {
        action: request.action_type,
        name,
    })
}
