// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! SQLite-specific backend utilities.
//!
//! This module is limited to:
//! - Connection initialization
//! - Migration execution
//! - SQLite-specific configuration (PRAGMA statements)
//! - SQLite-specific workarounds (e.g., `last_insert_rowid()`)
//!
//! All domain queries and mutations live in `queries/` or `mutations/`.

use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Integer, Text};
use diesel::{Connection, RunQueryDsl, SqliteConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::JournalMode;
use crate::error::{PersistenceError, is_lock_message};

/// SQLite migrations embedded at compile time.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Helper row struct for `PRAGMA foreign_keys`.
///
/// This is a justified use of raw SQL as Diesel has no PRAGMA DSL.
#[derive(QueryableByName)]
struct PragmaRow {
    #[diesel(sql_type = Integer)]
    foreign_keys: i32,
}

/// Helper row struct for `PRAGMA journal_mode`.
#[derive(QueryableByName)]
struct JournalModeRow {
    #[diesel(sql_type = Text)]
    journal_mode: String,
}

/// Helper row struct for `PRAGMA wal_checkpoint`.
#[derive(QueryableByName)]
struct CheckpointRow {
    #[diesel(sql_type = Integer)]
    busy: i32,
    #[diesel(sql_type = Integer)]
    log: i32,
    #[diesel(sql_type = Integer)]
    checkpointed: i32,
}

/// Outcome of a WAL checkpoint.
///
/// `log_frames` and `checkpointed_frames` are `-1` when the database is not
/// in WAL mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointResult {
    /// True if the checkpoint could not complete because of a reader or
    /// writer holding the database.
    pub busy: bool,
    /// Frames in the WAL file.
    pub log_frames: i32,
    /// Frames copied back into the database.
    pub checkpointed_frames: i32,
}

/// Helper function to get the last inserted row ID.
///
/// This is a justified use of raw SQL as Diesel has no direct API for this.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_last_insert_rowid(conn: &mut SqliteConnection) -> Result<i64, PersistenceError> {
    Ok(diesel::select(sql::<BigInt>("last_insert_rowid()")).get_result(conn)?)
}

/// Verifies that foreign key enforcement is enabled.
///
/// # Errors
///
/// Returns an error if foreign key enforcement is not enabled.
pub fn verify_foreign_key_enforcement(conn: &mut SqliteConnection) -> Result<(), PersistenceError> {
    // NOTE: PRAGMA is raw SQL (justified - Diesel has no PRAGMA DSL)
    let foreign_keys_enabled: i32 = diesel::sql_query("PRAGMA foreign_keys")
        .get_result::<PragmaRow>(conn)?
        .foreign_keys;

    if foreign_keys_enabled == 0 {
        return Err(PersistenceError::ForeignKeyEnforcementNotEnabled);
    }

    debug!("SQLite foreign key enforcement is enabled");
    Ok(())
}

/// Run pending migrations on the provided connection.
///
/// # Errors
///
/// Returns an error if migration execution fails.
pub fn run_migrations(
    conn: &mut SqliteConnection,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Running SQLite database migrations");
    conn.run_pending_migrations(MIGRATIONS)?;
    Ok(())
}

/// Initialize a `SQLite` database at the given URL and run migrations.
///
/// # Arguments
///
/// * `database_url` - The `SQLite` database URL (e.g., a shared-cache memory URI or file path)
/// * `busy_timeout_ms` - How long `SQLite` itself waits on a lock before failing
///
/// # Errors
///
/// Returns an error if connection or migration fails.
pub fn initialize_database(
    database_url: &str,
    busy_timeout_ms: u64,
) -> Result<SqliteConnection, PersistenceError> {
    info!("Initializing SQLite database at: {}", database_url);

    let mut conn: SqliteConnection = SqliteConnection::establish(database_url)
        .map_err(|e| PersistenceError::DatabaseConnectionFailed(e.to_string()))?;

    // NOTE: PRAGMA is raw SQL (justified - Diesel has no PRAGMA DSL)
    diesel::sql_query(format!("PRAGMA busy_timeout = {busy_timeout_ms}")).execute(&mut conn)?;
    diesel::sql_query("PRAGMA foreign_keys = ON").execute(&mut conn)?;

    // Migrations write, so another process holding the lock surfaces here.
    run_migrations(&mut conn).map_err(|e| {
        let message: String = e.to_string();
        if is_lock_message(&message) {
            PersistenceError::Busy(message)
        } else {
            PersistenceError::MigrationFailed(message)
        }
    })?;

    Ok(conn)
}

/// Applies a journal mode to a file-based database.
///
/// `SQLite` silently keeps the old mode when it cannot switch (for example
/// while another connection holds the file), so the resulting mode is read
/// back and a mismatch is logged.
///
/// # Errors
///
/// Returns an error if the PRAGMA statement fails.
pub fn set_journal_mode(
    conn: &mut SqliteConnection,
    mode: JournalMode,
) -> Result<String, PersistenceError> {
    let applied: String =
        diesel::sql_query(format!("PRAGMA journal_mode = {}", mode.as_pragma()))
            .get_result::<JournalModeRow>(conn)?
            .journal_mode;

    if applied.eq_ignore_ascii_case(mode.as_pragma()) {
        info!("SQLite journal mode set to {}", applied);
    } else {
        warn!(
            requested = mode.as_pragma(),
            applied = %applied,
            "SQLite kept a different journal mode"
        );
    }
    Ok(applied)
}

/// Runs `PRAGMA wal_checkpoint(TRUNCATE)`.
///
/// # Errors
///
/// Returns an error if the PRAGMA statement fails.
pub fn checkpoint_truncate(conn: &mut SqliteConnection) -> Result<CheckpointResult, PersistenceError> {
    let row: CheckpointRow =
        diesel::sql_query("PRAGMA wal_checkpoint(TRUNCATE)").get_result(conn)?;

    let result = CheckpointResult {
        busy: row.busy != 0,
        log_frames: row.log,
        checkpointed_frames: row.checkpointed,
    };
    debug!(
        busy = result.busy,
        log_frames = result.log_frames,
        checkpointed_frames = result.checkpointed_frames,
        "WAL checkpoint complete"
    );
    Ok(result)
}
