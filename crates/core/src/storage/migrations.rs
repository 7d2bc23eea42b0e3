//! Durable-tier schema setup.
//!
//! Schema changes are numbered [`Migration`] batches. A `schema_history`
//! table records the highest version that has run; [`apply_pending`]
//! replays every batch newer than that head on the connection's worker
//! thread. Re-running against an up-to-date database is a no-op.

use tokio_rusqlite::{Connection, params, rusqlite};

use crate::error::Error;

/// One numbered schema batch.
struct Migration {
    version: i64,
    sql: &'static str,
}

impl Migration {
    /// Execute the batch and record it in `schema_history`.
    fn apply(&self, conn: &rusqlite::Connection) -> Result<(), Error> {
        conn.execute_batch(self.sql)
            .map_err(|e| Error::MigrationFailed(format!("version {}: {e}", self.version)))?;
        conn.execute(
            "INSERT INTO schema_history (version, applied_at) VALUES (?1, ?2)",
            params![self.version, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

/// Ordered schema batches. Version 1 creates the `entries` table and its
/// three eviction indexes.
const SCHEMA: &[Migration] = &[Migration { version: 1, sql: include_str!("../../migrations/001_entries.sql") }];

/// Bring the schema up to date.
pub async fn apply_pending(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_history (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
        )?;

        let head: i64 =
            conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_history", [], |row| row.get(0))?;

        for migration in SCHEMA.iter().filter(|m| m.version > head) {
            migration.apply(conn)?;
            tracing::debug!(version = migration.version, "applied schema migration");
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}
