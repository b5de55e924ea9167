// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Persistence layer for the employee vault.
//!
//! This crate owns the single `SQLite` connection of a process. Several
//! processes, possibly on different machines, open the same database file;
//! every write therefore runs in an immediate transaction under a
//! [`RetryingExecutor`] that turns lock contention into bounded backoff.
//!
//! ## Layout
//!
//! - `queries/` - Read-only lookups
//! - `mutations/` - State changes, each writing its audit row in the same
//!   transaction
//! - `maintenance/` - Health checks and backups
//! - `backend::sqlite` - Connection setup, migrations and PRAGMA helpers
//!
//! ## Testing
//!
//! [`Persistence::new_in_memory`] gives each caller an isolated shared-cache
//! memory database. Contention tests use a file database in a temporary
//! directory.

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all,
    clippy::suspicious,
    clippy::complexity,
    clippy::perf,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(clippy::multiple_crate_versions)]

use diesel::{Connection, SqliteConnection};
use emp_vault_audit::{Actor, AuditEntry, AuditRecord};
use emp_vault_domain::{Capability, Employee, EmployeeDetails, EmployeeId, Role};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

mod backend;
pub mod clock;
mod config;
mod data_models;
mod diesel_schema;
mod error;
pub mod maintenance;
mod mutations;
mod queries;
mod retry;

#[cfg(test)]
mod tests;

pub use backend::sqlite::CheckpointResult;
pub use config::{DeploymentMode, JournalMode, RetryPolicy, StoreConfig};
pub use data_models::{
    AttachmentData, AuditFilter, EditLockData, PendingFileMove, PlannedMove, UserData,
};
pub use error::PersistenceError;
pub use maintenance::{
    BackupOutcome, BackupSummary, HealthCheck, HealthReport, RestoreOutcome, StagedRestore,
};
pub use mutations::SwapPlan;
pub use mutations::locks::LOCK_DURATION;
pub use mutations::users::BOOTSTRAP_ADMIN;
pub use retry::RetryingExecutor;

/// Atomic counter for generating unique in-memory database names.
///
/// Each call to `new_in_memory()` receives a unique sequential ID.
static DB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Persistence adapter over one `SQLite` connection.
pub struct Persistence {
    pub(crate) conn: SqliteConnection,
    executor: RetryingExecutor,
    database_path: Option<PathBuf>,
}

impl Persistence {
    /// Creates a new persistence adapter with an in-memory `SQLite` database.
    ///
    /// Each call receives a unique database instance via atomic counter.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn new_in_memory() -> Result<Self, PersistenceError> {
        let db_id = DB_COUNTER.fetch_add(1, Ordering::SeqCst);
        let shared_memory_url = format!("file:memdb_test_{db_id}?mode=memory&cache=shared");

        let mut conn: SqliteConnection = backend::sqlite::initialize_database(&shared_memory_url, 0)?;
        backend::sqlite::verify_foreign_key_enforcement(&mut conn)?;

        Ok(Self {
            conn,
            executor: RetryingExecutor::default(),
            database_path: None,
        })
    }

    /// Creates a new persistence adapter with a file-based `SQLite` database
    /// and default settings.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to the `SQLite` database file
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new_with_file<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        Self::open(&StoreConfig {
            database_path: path.as_ref().to_path_buf(),
            ..StoreConfig::default()
        })
    }

    /// Opens the database described by `config`.
    ///
    /// Creates the parent directory if needed, applies the busy timeout and
    /// journal mode, runs migrations and verifies foreign key enforcement.
    /// Initialization runs under the configured retry policy, so a store
    /// opened while another process is writing waits like any other write.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn open(config: &StoreConfig) -> Result<Self, PersistenceError> {
        let path: &Path = &config.database_path;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let path_str = path.to_str().ok_or_else(|| {
            PersistenceError::InitializationError("Invalid database path".to_string())
        })?;

        let executor: RetryingExecutor = RetryingExecutor::new(config.retry);
        let conn: SqliteConnection = executor.execute("open", || {
            let mut conn: SqliteConnection =
                backend::sqlite::initialize_database(path_str, config.busy_timeout_ms)?;
            backend::sqlite::set_journal_mode(&mut conn, config.journal_mode)?;
            backend::sqlite::verify_foreign_key_enforcement(&mut conn)?;
            Ok(conn)
        })?;

        info!(
            path = %path.display(),
            mode = ?config.deployment_mode,
            "Record store opened"
        );

        Ok(Self {
            conn,
            executor,
            database_path: Some(path.to_path_buf()),
        })
    }

    /// Replaces the retry policy.
    #[must_use]
    pub const fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.executor = RetryingExecutor::new(policy);
        self
    }

    /// Returns the executor applied to every operation.
    #[must_use]
    pub const fn executor(&self) -> &RetryingExecutor {
        &self.executor
    }

    /// Returns the database file, or `None` for an in-memory database.
    #[must_use]
    pub fn database_path(&self) -> Option<&Path> {
        self.database_path.as_deref()
    }

    /// Runs `operation` on the connection under the retry policy.
    ///
    /// # Errors
    ///
    /// Returns whatever the executor returns for `operation`.
    pub fn execute<T, F>(&mut self, label: &str, mut operation: F) -> Result<T, PersistenceError>
    where
        F: FnMut(&mut SqliteConnection) -> Result<T, PersistenceError>,
    {
        let conn: &mut SqliteConnection = &mut self.conn;
        self.executor.execute(label, || operation(conn))
    }

    /// Verifies that foreign key enforcement is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if foreign key enforcement is not enabled.
    pub fn verify_foreign_key_enforcement(&mut self) -> Result<(), PersistenceError> {
        backend::sqlite::verify_foreign_key_enforcement(&mut self.conn)
    }

    // ========================================================================
    // Employees
    // ========================================================================

    /// Retrieves an employee, archived or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_employee(&mut self, id: &EmployeeId) -> Result<Option<Employee>, PersistenceError> {
        self.execute("get_employee", |conn| queries::employees::get_employee(conn, id))
    }

    /// Lists employees ordered by identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list_employees(
        &mut self,
        include_archived: bool,
    ) -> Result<Vec<Employee>, PersistenceError> {
        self.execute("list_employees", |conn| {
            queries::employees::list_employees(conn, include_archived)
        })
    }

    /// Lists every stored identifier, archived rows included.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list_identifiers(&mut self) -> Result<Vec<EmployeeId>, PersistenceError> {
        self.execute("list_identifiers", queries::employees::list_identifiers)
    }

    /// Inserts a new employee.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier exists or the insert fails.
    pub fn insert_employee(
        &mut self,
        id: &EmployeeId,
        details: &EmployeeDetails,
        actor: &Actor,
    ) -> Result<(), PersistenceError> {
        self.execute("insert_employee", |conn| {
            mutations::employees::insert_employee(conn, id, details, actor)
        })
    }

    /// Replaces the attributes of an employee.
    ///
    /// # Errors
    ///
    /// Returns an error if the employee does not exist or the update fails.
    pub fn update_employee(
        &mut self,
        id: &EmployeeId,
        details: &EmployeeDetails,
        actor: &Actor,
    ) -> Result<(), PersistenceError> {
        self.execute("update_employee", |conn| {
            mutations::employees::update_employee(conn, id, details, actor)
        })
    }

    /// Archives an employee.
    ///
    /// # Errors
    ///
    /// Returns an error if the employee does not exist or the update fails.
    pub fn archive_employee(
        &mut self,
        id: &EmployeeId,
        actor: &Actor,
        reason: Option<&str>,
    ) -> Result<bool, PersistenceError> {
        self.execute("archive_employee", |conn| {
            mutations::employees::archive_employee(conn, id, actor, reason)
        })
    }

    /// Clears the archival marker on an employee.
    ///
    /// # Errors
    ///
    /// Returns an error if the employee is missing or not archived.
    pub fn restore_employee(
        &mut self,
        id: &EmployeeId,
        actor: &Actor,
    ) -> Result<(), PersistenceError> {
        self.execute("restore_employee", |conn| {
            mutations::employees::restore_employee(conn, id, actor)
        })
    }

    /// Removes an archived employee.
    ///
    /// # Errors
    ///
    /// Returns an error if the employee is missing or not archived.
    pub fn purge_employee(
        &mut self,
        id: &EmployeeId,
        actor: &Actor,
    ) -> Result<Employee, PersistenceError> {
        self.execute("purge_employee", |conn| {
            mutations::employees::purge_employee(conn, id, actor)
        })
    }

    // ========================================================================
    // Attachments
    // ========================================================================

    /// Records an attachment.
    ///
    /// # Errors
    ///
    /// Returns an error if the employee is missing or the name is taken.
    pub fn insert_attachment(
        &mut self,
        id: &EmployeeId,
        file_name: &str,
        actor: &Actor,
    ) -> Result<i64, PersistenceError> {
        self.execute("insert_attachment", |conn| {
            mutations::attachments::insert_attachment(conn, id, file_name, actor)
        })
    }

    /// Removes an attachment row.
    ///
    /// # Errors
    ///
    /// Returns an error if the attachment does not exist.
    pub fn delete_attachment(
        &mut self,
        attachment_id: i64,
        actor: &Actor,
    ) -> Result<AttachmentData, PersistenceError> {
        self.execute("delete_attachment", |conn| {
            mutations::attachments::delete_attachment(conn, attachment_id, actor)
        })
    }

    /// Lists the attachments of an employee.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list_attachments(
        &mut self,
        id: &EmployeeId,
    ) -> Result<Vec<AttachmentData>, PersistenceError> {
        let emp_id: String = id.to_string();
        self.execute("list_attachments", |conn| {
            queries::attachments::list_attachments(conn, &emp_id)
        })
    }

    // ========================================================================
    // Users & Capabilities
    // ========================================================================

    /// Seeds the default admin if no users exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn bootstrap_admin(&mut self, pin: &str) -> Result<bool, PersistenceError> {
        let pin_hash: String = mutations::users::hash_pin(pin)?;
        self.execute("bootstrap_admin", |conn| {
            mutations::users::bootstrap_admin(conn, &pin_hash)
        })
    }

    /// Creates a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the username exists or the insert fails.
    pub fn create_user(
        &mut self,
        username: &str,
        display_name: &str,
        pin: &str,
        role: Role,
        actor: &Actor,
    ) -> Result<(), PersistenceError> {
        let pin_hash: String = mutations::users::hash_pin(pin)?;
        self.execute("create_user", |conn| {
            mutations::users::create_user(conn, username, display_name, &pin_hash, role, actor)
        })
    }

    /// Changes the role of a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the user is missing or is the last admin.
    pub fn change_role(
        &mut self,
        username: &str,
        role: Role,
        actor: &Actor,
    ) -> Result<(), PersistenceError> {
        self.execute("change_role", |conn| {
            mutations::users::change_role(conn, username, role, actor)
        })
    }

    /// Deletes a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the user is missing or is the last admin.
    pub fn delete_user(&mut self, username: &str, actor: &Actor) -> Result<(), PersistenceError> {
        self.execute("delete_user", |conn| {
            mutations::users::delete_user(conn, username, actor)
        })
    }

    /// Sets a role capability.
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails.
    pub fn set_role_capability(
        &mut self,
        role: Role,
        capability: Capability,
        allowed: bool,
        actor: &Actor,
    ) -> Result<(), PersistenceError> {
        self.execute("set_role_capability", |conn| {
            mutations::users::set_role_capability(conn, role, capability, allowed, actor)
        })
    }

    /// Sets a per-user capability override.
    ///
    /// # Errors
    ///
    /// Returns an error if the user is missing or the upsert fails.
    pub fn set_user_capability(
        &mut self,
        username: &str,
        capability: Capability,
        allowed: bool,
        actor: &Actor,
    ) -> Result<(), PersistenceError> {
        self.execute("set_user_capability", |conn| {
            mutations::users::set_user_capability(conn, username, capability, allowed, actor)
        })
    }

    /// Retrieves a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_user(&mut self, username: &str) -> Result<Option<UserData>, PersistenceError> {
        self.execute("get_user", |conn| queries::users::get_user(conn, username))
    }

    /// Lists all users.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list_users(&mut self) -> Result<Vec<UserData>, PersistenceError> {
        self.execute("list_users", queries::users::list_users)
    }

    /// Checks a PIN against the stored hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query or hash check fails.
    pub fn verify_pin(&mut self, username: &str, pin: &str) -> Result<bool, PersistenceError> {
        self.execute("verify_pin", |conn| {
            queries::users::verify_pin(conn, username, pin)
        })
    }

    /// Looks up a role capability row.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn role_capability(
        &mut self,
        role: Role,
        capability: Capability,
    ) -> Result<Option<bool>, PersistenceError> {
        self.execute("role_capability", |conn| {
            queries::users::role_capability(conn, role, capability)
        })
    }

    /// Looks up a per-user capability override.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn user_capability(
        &mut self,
        username: &str,
        capability: Capability,
    ) -> Result<Option<bool>, PersistenceError> {
        self.execute("user_capability", |conn| {
            queries::users::user_capability(conn, username, capability)
        })
    }

    // ========================================================================
    // Audit
    // ========================================================================

    /// Appends an audit entry in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn append_audit_entry(&mut self, entry: &AuditEntry) -> Result<i64, PersistenceError> {
        self.execute("append_audit_entry", |conn| {
            mutations::audit::insert_audit_entry(conn, entry)
        })
    }

    /// Retrieves audit entries matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_audit_log(&mut self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, PersistenceError> {
        self.execute("get_audit_log", |conn| queries::audit::get_audit_log(conn, filter))
    }

    /// Retrieves the history of one record, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn record_history(&mut self, record_id: &str) -> Result<Vec<AuditRecord>, PersistenceError> {
        self.execute("record_history", |conn| {
            queries::audit::record_history(conn, record_id)
        })
    }

    // ========================================================================
    // Edit Locks
    // ========================================================================

    /// Takes or renews an edit lock.
    ///
    /// # Errors
    ///
    /// Returns `EditLockHeld` if another user holds a live lock.
    pub fn acquire_edit_lock(
        &mut self,
        emp_id: &str,
        username: &str,
    ) -> Result<EditLockData, PersistenceError> {
        self.execute("acquire_edit_lock", |conn| {
            mutations::locks::acquire_edit_lock(conn, emp_id, username)
        })
    }

    /// Releases an edit lock held by `username`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn release_edit_lock(&mut self, emp_id: &str, username: &str) -> Result<bool, PersistenceError> {
        self.execute("release_edit_lock", |conn| {
            mutations::locks::release_edit_lock(conn, emp_id, username)
        })
    }

    /// Extends an edit lock held by `username`.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn refresh_edit_lock(&mut self, emp_id: &str, username: &str) -> Result<bool, PersistenceError> {
        self.execute("refresh_edit_lock", |conn| {
            mutations::locks::refresh_edit_lock(conn, emp_id, username)
        })
    }

    /// Retrieves the lock on a record, live or expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_edit_lock(&mut self, emp_id: &str) -> Result<Option<EditLockData>, PersistenceError> {
        self.execute("get_edit_lock", |conn| queries::locks::get_edit_lock(conn, emp_id))
    }

    /// Removes expired edit locks.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn cleanup_expired_locks(&mut self) -> Result<usize, PersistenceError> {
        self.execute("cleanup_expired_locks", mutations::locks::cleanup_expired_locks)
    }

    // ========================================================================
    // Identifier Swap
    // ========================================================================

    /// Applies the database stage of a swap.
    ///
    /// # Errors
    ///
    /// Returns an error if the swap cannot be applied; nothing is changed.
    pub fn apply_identifier_swap(
        &mut self,
        plan: &SwapPlan,
    ) -> Result<Vec<PendingFileMove>, PersistenceError> {
        self.execute("apply_identifier_swap", |conn| {
            mutations::swap::apply_identifier_swap(conn, plan)
        })
    }

    /// Removes a completed ledger row.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn complete_file_move(&mut self, move_id: i64) -> Result<(), PersistenceError> {
        self.execute("complete_file_move", |conn| {
            mutations::swap::complete_file_move(conn, move_id)
        })
    }

    /// Lists outstanding ledger rows in replay order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list_pending_moves(&mut self) -> Result<Vec<PendingFileMove>, PersistenceError> {
        self.execute("list_pending_moves", queries::file_moves::list_pending_moves)
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Runs `PRAGMA wal_checkpoint(TRUNCATE)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the PRAGMA fails.
    pub fn checkpoint(&mut self) -> Result<CheckpointResult, PersistenceError> {
        self.execute("checkpoint", backend::sqlite::checkpoint_truncate)
    }

    /// Runs every health check.
    ///
    /// # Errors
    ///
    /// Returns an error only if the report itself cannot be produced.
    pub fn health_check(&mut self) -> Result<HealthReport, PersistenceError> {
        maintenance::run_health_checks(&mut self.conn)
    }

    /// Writes a timestamped backup into `dir`, keeping the newest `keep`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup cannot be written.
    pub fn backup_now(&mut self, dir: &Path, keep: usize) -> Result<BackupOutcome, PersistenceError> {
        self.execute("backup_now", |conn| {
            maintenance::create_timestamped_backup(conn, dir, keep)
        })
    }

    /// Replaces the database file with a staged, verified backup and
    /// reopens it with `config`.
    ///
    /// The connection is checkpointed and released first. The replaced file
    /// is set aside under `label`.
    ///
    /// # Errors
    ///
    /// Returns `RestoreFailed` for an in-memory store, or an error if the
    /// files cannot be moved or the restored database cannot be opened. In
    /// the last case the adapter is left without a usable connection.
    pub fn install_restore(
        &mut self,
        config: &StoreConfig,
        staged: StagedRestore,
        label: &str,
    ) -> Result<RestoreOutcome, PersistenceError> {
        if self.database_path.is_none() {
            staged.discard();
            return Err(PersistenceError::RestoreFailed(
                "an in-memory store has no file to replace".to_string(),
            ));
        }
        if let Err(err) = backend::sqlite::checkpoint_truncate(&mut self.conn) {
            warn!("Checkpoint before restore failed: {}", err);
        }
        // Release the file; the adapter is rebuilt below.
        self.conn = SqliteConnection::establish(":memory:")?;

        let outcome: RestoreOutcome = staged.install(label)?;
        *self = Self::open(config)?;
        Ok(outcome)
    }

    /// Counts audit rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn count_audit_entries(&mut self) -> Result<i64, PersistenceError> {
        self.execute("count_audit_entries", queries::audit::count_audit_entries)
    }

    /// Checkpoints a WAL database and closes the connection.
    ///
    /// A failed checkpoint is logged; the connection is closed regardless.
    pub fn close(mut self) {
        if self.database_path.is_some() {
            match backend::sqlite::checkpoint_truncate(&mut self.conn) {
                Ok(result) => debug!(busy = result.busy, "Final checkpoint complete"),
                Err(err) => warn!("Final checkpoint failed: {}", err),
            }
        }
        info!("Record store closed");
    }
}
