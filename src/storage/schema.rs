//! Resume-state schema and migrations.

use rusqlite::Connection;

use crate::error::StorageError;
use crate::Result;

use super::models::now_unix;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

const TABLES: [&str; 1] = ["resume_state"];

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if migrations fail.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| StorageError::Migration(format!("failed to create migrations table: {e}")))?;

    let current = current_version(conn)?;
    tracing::debug!(
        current,
        target = SCHEMA_VERSION,
        "Checking resume-state migrations"
    );

    if current < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn current_version(conn: &Connection) -> Result<i32> {
    match conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    ) {
        Ok(version) => Ok(version),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(StorageError::Migration(format!("failed to get version: {e}")).into()),
    }
}

fn record_migration(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)",
        rusqlite::params![version, now_unix()],
    )
    .map_err(|e| StorageError::Migration(format!("failed to record migration: {e}")))?;
    Ok(())
}

/// v1: one row per resume key.
fn migrate_v1(conn: &Connection) -> Result<()> {
    tracing::info!("Applying migration v1: resume_state");

    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS resume_state (
            key TEXT PRIMARY KEY,
            path TEXT NOT NULL,
            ino INTEGER NOT NULL,
            offset INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_resume_state_updated_at ON resume_state(updated_at);
        ",
    )
    .map_err(|e| StorageError::Migration(format!("v1 migration failed: {e}")))?;

    record_migration(conn, 1)
}

/// Verify all expected tables exist.
///
/// # Errors
///
/// Returns an error if a table is missing.
pub fn verify_schema(conn: &Connection) -> Result<()> {
    for table in TABLES {
        let exists: bool = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?",
                [table],
                |_| Ok(true),
            )
            .unwrap_or(false);

        if !exists {
            return Err(StorageError::Migration(format!("table '{table}' not found")).into());
        }
    }
    Ok(())
}
