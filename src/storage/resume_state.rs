//! Read-position persistence keyed by resume key.

use rusqlite::Connection;

use super::models::ResumeState;
use crate::error::StorageError;
use crate::Result;

#[allow(clippy::cast_possible_wrap)]
fn to_sql(value: u64) -> i64 {
    value as i64
}

#[allow(clippy::cast_sign_loss)]
fn from_sql(value: i64) -> u64 {
    value as u64
}

/// Get the saved state for a key.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_resume_state(conn: &Connection, key: &str) -> Result<Option<ResumeState>> {
    let result = conn.query_row(
        "SELECT key, path, ino, offset, updated_at FROM resume_state WHERE key = ?",
        [key],
        |row| {
            Ok(ResumeState {
                key: row.get(0)?,
                path: row.get(1)?,
                ino: from_sql(row.get(2)?),
                offset: from_sql(row.get(3)?),
                updated_at: row.get(4)?,
            })
        },
    );

    match result {
        Ok(state) => Ok(Some(state)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StorageError::Database(e.to_string()).into()),
    }
}

/// Insert or overwrite the state for `state.key`.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn upsert_resume_state(conn: &Connection, state: &ResumeState) -> Result<()> {
    conn.execute(
        "INSERT INTO resume_state (key, path, ino, offset, updated_at) VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(key) DO UPDATE SET
            path = excluded.path,
            ino = excluded.ino,
            offset = excluded.offset,
            updated_at = excluded.updated_at",
        rusqlite::params![
            state.key,
            state.path,
            to_sql(state.ino),
            to_sql(state.offset),
            state.updated_at
        ],
    )
    .map_err(|e| StorageError::Database(e.to_string()))?;
    Ok(())
}

/// Delete the state for a key. Returns whether a row was removed.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn delete_resume_state(conn: &Connection, key: &str) -> Result<bool> {
    let removed = conn
        .execute("DELETE FROM resume_state WHERE key = ?", [key])
        .map_err(|e| StorageError::Database(e.to_string()))?;
    Ok(removed > 0)
}

/// List all stored keys in order.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_resume_keys(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT key FROM resume_state ORDER BY key")
        .map_err(|e| StorageError::Database(e.to_string()))?;

    let keys = stmt
        .query_map([], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::Database(e.to_string()))?;

    Ok(keys)
}

/// Count stored states.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_resume_states(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM resume_state", [], |row| row.get(0))
        .map_err(|e| StorageError::Database(e.to_string()).into())
}
