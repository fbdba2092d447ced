//! SQLite implementation of the `Persistence` contract.
//!
//! Enum columns are stored as their snake_case names; free-form maps
//! (action parameters, outputs, browser context) as JSON text.

use std::sync::Arc;

use rusqlite::OptionalExtension;
use tracing::info;
use uuid::Uuid;

use paperclip_core::error::{PaperclipError, Result};
use paperclip_core::persistence::{
    ActionHistoryEntry, Persistence, StoredActionHistory, StoredContextSnapshot,
    StoredFrustrationSignal,
};
use paperclip_core::types::{
    BrowserContextInfo, FrustrationSignal, SignalKind, TaskCategory, TaskContext, Timestamp,
};

use crate::db::Database;

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Persistence backed by a [`Database`].
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// A store over a fresh in-memory database.
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Arc::new(Database::in_memory()?)))
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }
}

fn storage_err(e: rusqlite::Error) -> PaperclipError {
    PaperclipError::Storage(e.to_string())
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| PaperclipError::Storage(format!("Invalid UUID: {}", e)))
}

fn parse_json(s: Option<String>) -> Result<Option<serde_json::Value>> {
    match s {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

fn to_json(value: &Option<serde_json::Value>) -> Result<Option<String>> {
    match value {
        Some(v) => Ok(Some(serde_json::to_string(v)?)),
        None => Ok(None),
    }
}

// =============================================================================
// Row mapping
// =============================================================================

struct SignalRow {
    id: String,
    kind: String,
    timestamp: i64,
    application_context: String,
    severity: f64,
    created_at: i64,
}

impl SignalRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: row.get(1)?,
            timestamp: row.get(2)?,
            application_context: row.get(3)?,
            severity: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn into_stored(self) -> Result<StoredFrustrationSignal> {
        let kind: SignalKind = self.kind.parse().map_err(PaperclipError::Storage)?;
        Ok(StoredFrustrationSignal {
            id: parse_uuid(&self.id)?,
            signal: FrustrationSignal {
                kind,
                timestamp: Timestamp(self.timestamp),
                application_context: self.application_context,
                severity: self.severity,
            },
            created_at: Timestamp(self.created_at),
        })
    }
}

struct ContextRow {
    id: String,
    timestamp: i64,
    active_application: String,
    window_title: String,
    visible_content: String,
    inferred_intent: String,
    confidence: f64,
    browser_context: Option<String>,
    created_at: i64,
}

impl ContextRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            active_application: row.get(2)?,
            window_title: row.get(3)?,
            visible_content: row.get(4)?,
            inferred_intent: row.get(5)?,
            confidence: row.get(6)?,
            browser_context: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_stored(self) -> Result<StoredContextSnapshot> {
        let inferred_intent: TaskCategory =
            self.inferred_intent.parse().map_err(PaperclipError::Storage)?;
        let browser_context: Option<BrowserContextInfo> = match self.browser_context {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        };
        Ok(StoredContextSnapshot {
            context: TaskContext {
                id: parse_uuid(&self.id)?,
                timestamp: Timestamp(self.timestamp),
                active_application: self.active_application,
                window_title: self.window_title,
                visible_content: self.visible_content,
                inferred_intent,
                confidence: self.confidence,
                browser_context,
            },
            created_at: Timestamp(self.created_at),
        })
    }
}

const CONTEXT_COLUMNS: &str = "id, timestamp, active_application, window_title, visible_content,
     inferred_intent, confidence, browser_context, created_at";

// =============================================================================
// Persistence
// =============================================================================

const HISTORY_COLUMNS: &str = "id, action_id, context_id, action_type, parameters, success, \
     output, rollback_data, timestamp, created_at";

struct HistoryRow {
    id: String,
    action_id: String,
    context_id: String,
    action_type: String,
    parameters: String,
    success: i32,
    output: Option<String>,
    rollback_data: Option<String>,
    timestamp: i64,
    created_at: i64,
}

impl HistoryRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            action_id: row.get(1)?,
            context_id: row.get(2)?,
            action_type: row.get(3)?,
            parameters: row.get(4)?,
            success: row.get(5)?,
            output: row.get(6)?,
            rollback_data: row.get(7)?,
            timestamp: row.get(8)?,
            created_at: row.get(9)?,
        })
    }

    fn into_stored(self) -> Result<StoredActionHistory> {
        Ok(StoredActionHistory {
            id: parse_uuid(&self.id)?,
            entry: ActionHistoryEntry {
                action_id: parse_uuid(&self.action_id)?,
                context_id: parse_uuid(&self.context_id)?,
                action_type: self.action_type.parse().map_err(PaperclipError::Storage)?,
                parameters: serde_json::from_str(&self.parameters)?,
                success: self.success != 0,
                output: parse_json(self.output)?,
                rollback_data: parse_json(self.rollback_data)?,
                timestamp: Timestamp(self.timestamp),
            },
            created_at: Timestamp(self.created_at),
        })
    }
}

impl Persistence for SqliteStore {
    fn save_frustration_signal(&self, signal: &FrustrationSignal) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO frustration_signals (id, kind, timestamp, application_context, severity, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    id.to_string(),
                    signal.kind.to_string(),
                    signal.timestamp.0,
                    signal.application_context,
                    signal.severity,
                    Timestamp::now().0,
                ],
            )
            .map_err(|e| PaperclipError::Storage(format!("Failed to save frustration signal: {}", e)))?;
            Ok(())
        })?;
        Ok(id)
    }

    fn get_frustration_signal(&self, id: Uuid) -> Result<Option<StoredFrustrationSignal>> {
        let row = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, kind, timestamp, application_context, severity, created_at
                 FROM frustration_signals WHERE id = ?1",
                rusqlite::params![id.to_string()],
                SignalRow::from_row,
            )
            .optional()
            .map_err(storage_err)
        })?;
        row.map(SignalRow::into_stored).transpose()
    }

    fn recent_frustration_signals(&self, limit: usize) -> Result<Vec<StoredFrustrationSignal>> {
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, kind, timestamp, application_context, severity, created_at
                     FROM frustration_signals
                     ORDER BY timestamp DESC
                     LIMIT ?1",
                )
                .map_err(storage_err)?;
            let rows = stmt
                .query_map(rusqlite::params![limit as i64], SignalRow::from_row)
                .map_err(storage_err)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(storage_err)
        })?;
        rows.into_iter().map(SignalRow::into_stored).collect()
    }

    fn save_context_snapshot(&self, context: &TaskContext) -> Result<()> {
        let browser_context = match &context.browser_context {
            Some(info) => Some(serde_json::to_string(info)?),
            None => None,
        };
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO context_snapshots
                 (id, timestamp, active_application, window_title, visible_content,
                  inferred_intent, confidence, browser_context, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    context.id.to_string(),
                    context.timestamp.0,
                    context.active_application,
                    context.window_title,
                    context.visible_content,
                    context.inferred_intent.to_string(),
                    context.confidence,
                    browser_context,
                    Timestamp::now().0,
                ],
            )
            .map_err(|e| PaperclipError::Storage(format!("Failed to save context snapshot: {}", e)))?;
            Ok(())
        })
    }

    fn get_context_snapshot(&self, id: Uuid) -> Result<Option<StoredContextSnapshot>> {
        let sql = format!("SELECT {} FROM context_snapshots WHERE id = ?1", CONTEXT_COLUMNS);
        let row = self.db.with_conn(|conn| {
            conn.query_row(&sql, rusqlite::params![id.to_string()], ContextRow::from_row)
                .optional()
                .map_err(storage_err)
        })?;
        row.map(ContextRow::into_stored).transpose()
    }

    fn context_snapshots_by_intent(
        &self,
        intent: TaskCategory,
        hours_back: u32,
    ) -> Result<Vec<StoredContextSnapshot>> {
        let cutoff = Timestamp::now().minus_millis(i64::from(hours_back) * MILLIS_PER_HOUR);
        let sql = format!(
            "SELECT {} FROM context_snapshots
             WHERE inferred_intent = ?1 AND timestamp >= ?2
             ORDER BY timestamp DESC",
            CONTEXT_COLUMNS
        );
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql).map_err(storage_err)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![intent.to_string(), cutoff.0],
                    ContextRow::from_row,
                )
                .map_err(storage_err)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(storage_err)
        })?;
        rows.into_iter().map(ContextRow::into_stored).collect()
    }

    fn save_action_history(&self, entry: &ActionHistoryEntry) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let parameters = serde_json::to_string(&entry.parameters)?;
        let output = to_json(&entry.output)?;
        let rollback_data = to_json(&entry.rollback_data)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO action_history
                 (id, action_id, context_id, action_type, parameters, success, output,
                  rollback_data, timestamp, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    id.to_string(),
                    entry.action_id.to_string(),
                    entry.context_id.to_string(),
                    entry.action_type.to_string(),
                    parameters,
                    entry.success as i32,
                    output,
                    rollback_data,
                    entry.timestamp.0,
                    Timestamp::now().0,
                ],
            )
            .map_err(|e| PaperclipError::Storage(format!("Failed to save action history: {}", e)))?;
            Ok(())
        })?;
        Ok(id)
    }

    fn get_action_history(&self, id: Uuid) -> Result<Option<StoredActionHistory>> {
        let row = self.db.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM action_history WHERE id = ?1", HISTORY_COLUMNS),
                rusqlite::params![id.to_string()],
                HistoryRow::from_row,
            )
            .optional()
            .map_err(storage_err)
        })?;
        row.map(HistoryRow::into_stored).transpose()
    }

    fn recent_action_history(&self, limit: usize) -> Result<Vec<StoredActionHistory>> {
        let rows = self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {} FROM action_history ORDER BY timestamp DESC LIMIT ?1",
                    HISTORY_COLUMNS
                ))
                .map_err(storage_err)?;
            let rows = stmt
                .query_map(rusqlite::params![limit as i64], HistoryRow::from_row)
                .map_err(storage_err)?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(storage_err)
        })?;
        rows.into_iter().map(HistoryRow::into_stored).collect()
    }

    fn set_preference(&self, key: &str, value: &str) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO user_preferences (key, value, updated_at)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![key, value, Timestamp::now().0],
            )
            .map_err(|e| PaperclipError::Storage(format!("Failed to set preference: {}", e)))?;
            Ok(())
        })
    }

    fn get_preference(&self, key: &str) -> Result<Option<String>> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM user_preferences WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(storage_err)
        })
    }

    fn delete_all_data(&self) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute_batch(
                "DELETE FROM frustration_signals;
                 DELETE FROM context_snapshots;
                 DELETE FROM action_history;
                 DELETE FROM user_preferences;",
            )
            .map_err(|e| PaperclipError::Storage(format!("Failed to delete data: {}", e)))
        })?;
        info!("All stored data deleted");
        Ok(())
    }
}
