//! `SQLite`-backed resume-state store.
//!
//! One row per resume key records how far a stream has been read, so a
//! restarted daemon (or a renamed file) picks up where it left off.

mod connection;
mod models;
mod resume_state;
mod schema;

pub use connection::Database;
pub use models::ResumeState;
pub use resume_state::{
    count_resume_states, delete_resume_state, get_resume_state, list_resume_keys,
    upsert_resume_state,
};
pub use schema::{migrate, verify_schema, SCHEMA_VERSION};

/// Initialize storage with migrations.
///
/// # Errors
///
/// Returns an error if database initialization fails.
pub fn init_storage(db: &Database) -> crate::Result<()> {
    db.with_conn(|conn| {
        migrate(conn)?;
        verify_schema(conn)?;
        tracing::info!(path = db.path(), "Resume-state store ready, schema version {SCHEMA_VERSION}");
        Ok(())
    })
}
