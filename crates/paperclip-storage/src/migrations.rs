//! Database schema migrations.
//!
//! Version 1 creates the frustration_signals, context_snapshots,
//! action_history and user_preferences tables.

use rusqlite::Connection;
use tracing::info;

use paperclip_core::error::PaperclipError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), PaperclipError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| PaperclipError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| PaperclipError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<(), PaperclipError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS frustration_signals (
            id                  TEXT PRIMARY KEY NOT NULL,
            kind                TEXT NOT NULL
                                CHECK (kind IN ('repeated_error', 'rapid_deletion',
                                                'idle_after_error', 'rage_click')),
            timestamp           INTEGER NOT NULL,
            application_context TEXT NOT NULL DEFAULT '',
            severity            REAL NOT NULL,
            created_at          INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_frustration_signals_timestamp
            ON frustration_signals (timestamp DESC);

        CREATE TABLE IF NOT EXISTS context_snapshots (
            id                  TEXT PRIMARY KEY NOT NULL,
            timestamp           INTEGER NOT NULL,
            active_application  TEXT NOT NULL DEFAULT '',
            window_title        TEXT NOT NULL DEFAULT '',
            visible_content     TEXT NOT NULL DEFAULT '',
            inferred_intent     TEXT NOT NULL,
            confidence          REAL NOT NULL,
            browser_context     TEXT,
            created_at          INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_context_snapshots_intent
            ON context_snapshots (inferred_intent, timestamp DESC);

        CREATE TABLE IF NOT EXISTS action_history (
            id              TEXT PRIMARY KEY NOT NULL,
            action_id       TEXT NOT NULL,
            context_id      TEXT NOT NULL,
            action_type     TEXT NOT NULL,
            parameters      TEXT NOT NULL DEFAULT '{}',
            success         INTEGER NOT NULL,
            output          TEXT,
            rollback_data   TEXT,
            timestamp       INTEGER NOT NULL,
            created_at      INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_action_history_timestamp
            ON action_history (timestamp DESC);

        CREATE TABLE IF NOT EXISTS user_preferences (
            key         TEXT PRIMARY KEY NOT NULL,
            value       TEXT NOT NULL,
            updated_at  INTEGER NOT NULL
        );

        INSERT INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| PaperclipError::Storage(format!("Migration v1 failed: {}", e)))?;

    Ok(())
}
