// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The record store: authorized access to employees, attachments, users
//! and the audit log.

use emp_vault_audit::{AuditAction, AuditEntry, AuditRecord};
use emp_vault_domain::{
    Capability, Employee, EmployeeDetails, EmployeeId, Role, next_sequence,
    validate_employee_details, validate_new_identifier,
};
use emp_vault_persistence::{
    AttachmentData, AuditFilter, BackupOutcome, CheckpointResult, EditLockData, HealthReport,
    Persistence, RestoreOutcome, StagedRestore, StoreConfig, UserData, maintenance,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::StoreError;
use crate::files::{FILES_SUBDIR, attachment_path, employee_folder, photo_paths};
use crate::permission::{AuthorizedActor, PermissionGate};
use crate::pin_policy::PinPolicy;
use crate::swap::{IdentifierSwapTransaction, SwapReport};

/// Parses an identifier typed by a user.
fn parse_id(raw: &str) -> Result<EmployeeId, StoreError> {
    Ok(raw.parse::<EmployeeId>()?)
}

/// Authorized operations over one open store.
///
/// Every mutating operation takes the acting username explicitly and
/// checks it against the [`PermissionGate`] before touching storage.
pub struct RecordStore {
    persistence: Persistence,
    config: StoreConfig,
}

impl RecordStore {
    /// Opens the database described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let persistence: Persistence = Persistence::open(&config)?;
        Ok(Self::with_persistence(persistence, config))
    }

    /// Wraps an already open persistence adapter.
    #[must_use]
    pub const fn with_persistence(persistence: Persistence, config: StoreConfig) -> Self {
        Self {
            persistence,
            config,
        }
    }

    /// Returns the configuration the store was opened with.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) const fn persistence_mut(&mut self) -> &mut Persistence {
        &mut self.persistence
    }

    fn authorize(
        &mut self,
        username: &str,
        capability: Capability,
    ) -> Result<AuthorizedActor, StoreError> {
        PermissionGate::authorize(&mut self.persistence, username, capability)
    }

    // ========================================================================
    // Employees
    // ========================================================================

    /// Retrieves an employee, archived or not.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for a malformed identifier and `NotFound`
    /// if no record carries it.
    pub fn get_employee(&mut self, id: &str) -> Result<Employee, StoreError> {
        let id: EmployeeId = parse_id(id)?;
        self.persistence
            .get_employee(&id)?
            .ok_or_else(|| StoreError::NotFound(format!("Employee not found: {id}")))
    }

    /// Lists employees ordered by identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list_employees(&mut self, include_archived: bool) -> Result<Vec<Employee>, StoreError> {
        Ok(self.persistence.list_employees(include_archived)?)
    }

    /// Same as [`Self::list_employees`].
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn get_all_employees(&mut self, include_archived: bool) -> Result<Vec<Employee>, StoreError> {
        self.list_employees(include_archived)
    }

    /// Adds a new employee.
    ///
    /// Requires `add_employee`.
    ///
    /// # Arguments
    ///
    /// * `id` - The new identifier, `PREFIX-SEQ-YEAR`
    /// * `details` - The employee's attributes
    /// * `username` - The acting user
    ///
    /// # Errors
    ///
    /// Returns `Denied`, `ValidationError` for bad input or a taken
    /// identifier (archived records included), or a storage error.
    pub fn add_employee(
        &mut self,
        id: &str,
        details: &EmployeeDetails,
        username: &str,
    ) -> Result<EmployeeId, StoreError> {
        let authorized: AuthorizedActor = self.authorize(username, Capability::AddEmployee)?;
        let id: EmployeeId = parse_id(id)?;
        validate_new_identifier(&id)?;
        validate_employee_details(details)?;

        info!(actor = %username, "Adding employee: {}", id);
        self.persistence
            .insert_employee(&id, details, &authorized.actor)?;
        Ok(id)
    }

    /// Replaces the attributes of an employee. The identifier never changes;
    /// use [`Self::swap_identifiers`] for that.
    ///
    /// Requires `edit_employee`.
    ///
    /// # Errors
    ///
    /// Returns `Denied`, `ValidationError`, `NotFound`, or a storage error.
    pub fn update_employee(
        &mut self,
        id: &str,
        details: &EmployeeDetails,
        username: &str,
    ) -> Result<(), StoreError> {
        let authorized: AuthorizedActor = self.authorize(username, Capability::EditEmployee)?;
        let id: EmployeeId = parse_id(id)?;
        validate_employee_details(details)?;

        info!(actor = %username, "Updating employee: {}", id);
        Ok(self
            .persistence
            .update_employee(&id, details, &authorized.actor)?)
    }

    /// Archives an employee. The row is kept.
    ///
    /// Requires `delete_employee`. Returns false if the record was already
    /// archived.
    ///
    /// # Errors
    ///
    /// Returns `Denied`, `NotFound`, or a storage error.
    pub fn archive_employee(
        &mut self,
        id: &str,
        username: &str,
        reason: Option<&str>,
    ) -> Result<bool, StoreError> {
        let authorized: AuthorizedActor = self.authorize(username, Capability::DeleteEmployee)?;
        let id: EmployeeId = parse_id(id)?;

        info!(actor = %username, "Archiving employee: {}", id);
        Ok(self
            .persistence
            .archive_employee(&id, &authorized.actor, reason)?)
    }

    /// Clears the archival marker of an employee.
    ///
    /// Requires `delete_employee`.
    ///
    /// # Errors
    ///
    /// Returns `Denied`, `NotFound`, `ValidationError` if the record is not
    /// archived, or a storage error.
    pub fn restore_employee(&mut self, id: &str, username: &str) -> Result<(), StoreError> {
        let authorized: AuthorizedActor = self.authorize(username, Capability::DeleteEmployee)?;
        let id: EmployeeId = parse_id(id)?;

        info!(actor = %username, "Restoring employee: {}", id);
        Ok(self.persistence.restore_employee(&id, &authorized.actor)?)
    }

    /// Permanently removes an archived employee together with its
    /// attachment rows, folder and photos.
    ///
    /// Requires `delete_employee`. Files that cannot be removed are logged;
    /// the database row is gone either way.
    ///
    /// # Errors
    ///
    /// Returns `Denied`, `NotFound`, `ValidationError` if the record is not
    /// archived, or a storage error.
    pub fn purge_employee(&mut self, id: &str, username: &str) -> Result<Employee, StoreError> {
        let authorized: AuthorizedActor = self.authorize(username, Capability::DeleteEmployee)?;
        let id: EmployeeId = parse_id(id)?;

        warn!(actor = %username, "Permanently deleting employee: {}", id);
        let purged: Employee = self.persistence.purge_employee(&id, &authorized.actor)?;

        let folder: PathBuf = employee_folder(&self.config.files_dir, &id);
        if folder.exists()
            && let Err(err) = fs::remove_dir_all(&folder)
        {
            warn!("Failed to remove folder {}: {}", folder.display(), err);
        }
        match photo_paths(&self.config.photos_dir, &id.to_string()) {
            Ok(photos) => {
                for photo in photos {
                    if let Err(err) = fs::remove_file(&photo) {
                        warn!("Failed to remove photo {}: {}", photo.display(), err);
                    }
                }
            }
            Err(err) => warn!("Failed to list photos of {}: {}", id, err),
        }

        Ok(purged)
    }

    /// Returns the smallest unused sequence number.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if every sequence is taken.
    pub fn next_sequence(&mut self) -> Result<u16, StoreError> {
        let known: Vec<EmployeeId> = self.persistence.list_identifiers()?;
        Ok(next_sequence(&known)?)
    }

    // ========================================================================
    // Attachments
    // ========================================================================

    /// Copies `source` into the employee's folder and records it.
    ///
    /// Requires `edit_employee`. Existing files are never overwritten.
    ///
    /// # Errors
    ///
    /// Returns `Denied`, `NotFound`, `ValidationError` for a clashing or
    /// unusable file name, or a storage error.
    pub fn add_attachment(
        &mut self,
        id: &str,
        source: &Path,
        username: &str,
    ) -> Result<i64, StoreError> {
        let authorized: AuthorizedActor = self.authorize(username, Capability::EditEmployee)?;
        let id: EmployeeId = parse_id(id)?;
        if self.persistence.get_employee(&id)?.is_none() {
            return Err(StoreError::NotFound(format!("Employee not found: {id}")));
        }
        let file_name: String = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                StoreError::ValidationError(format!("{} has no file name", source.display()))
            })?;

        let target: PathBuf = attachment_path(&self.config.files_dir, &id.to_string(), &file_name);
        if target.exists() {
            return Err(StoreError::ValidationError(format!(
                "{} already exists",
                target.display()
            )));
        }
        fs::create_dir_all(employee_folder(&self.config.files_dir, &id).join(FILES_SUBDIR))?;
        fs::copy(source, &target)?;

        match self
            .persistence
            .insert_attachment(&id, &file_name, &authorized.actor)
        {
            Ok(attachment_id) => {
                info!(actor = %username, "Attached {} to {}", file_name, id);
                Ok(attachment_id)
            }
            Err(err) => {
                if let Err(cleanup) = fs::remove_file(&target) {
                    warn!("Failed to remove {}: {}", target.display(), cleanup);
                }
                Err(err.into())
            }
        }
    }

    /// Removes an attachment row and its file.
    ///
    /// Requires `edit_employee`.
    ///
    /// # Errors
    ///
    /// Returns `Denied`, `NotFound`, or a storage error.
    pub fn remove_attachment(
        &mut self,
        attachment_id: i64,
        username: &str,
    ) -> Result<AttachmentData, StoreError> {
        let authorized: AuthorizedActor = self.authorize(username, Capability::EditEmployee)?;
        let removed: AttachmentData = self
            .persistence
            .delete_attachment(attachment_id, &authorized.actor)?;

        let path: PathBuf =
            attachment_path(&self.config.files_dir, &removed.emp_id, &removed.file_name);
        if path.exists()
            && let Err(err) = fs::remove_file(&path)
        {
            warn!("Failed to remove {}: {}", path.display(), err);
        }
        Ok(removed)
    }

    /// Lists the attachments of an employee.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for a malformed identifier, or a storage
    /// error.
    pub fn list_attachments(&mut self, id: &str) -> Result<Vec<AttachmentData>, StoreError> {
        let id: EmployeeId = parse_id(id)?;
        Ok(self.persistence.list_attachments(&id)?)
    }

    // ========================================================================
    // Users & Capabilities
    // ========================================================================

    /// Seeds the `admin` user if the store has no users.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if the PIN breaks the policy.
    pub fn bootstrap_admin(&mut self, pin: &str) -> Result<bool, StoreError> {
        PinPolicy::default().validate(pin)?;
        Ok(self.persistence.bootstrap_admin(pin)?)
    }

    /// Checks a user's PIN.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn verify_pin(&mut self, username: &str, pin: &str) -> Result<bool, StoreError> {
        Ok(self.persistence.verify_pin(username, pin)?)
    }

    /// Lists every user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list_users(&mut self) -> Result<Vec<UserData>, StoreError> {
        Ok(self.persistence.list_users()?)
    }

    /// Creates a user.
    ///
    /// Requires `manage_users`.
    ///
    /// # Errors
    ///
    /// Returns `Denied`, `ValidationError` for a blank or taken username or
    /// a PIN outside the policy, or a storage error.
    pub fn create_user(
        &mut self,
        new_username: &str,
        display_name: &str,
        pin: &str,
        role: Role,
        username: &str,
    ) -> Result<(), StoreError> {
        let authorized: AuthorizedActor = self.authorize(username, Capability::ManageUsers)?;
        let new_username: &str = new_username.trim();
        if new_username.is_empty() {
            return Err(StoreError::ValidationError(String::from(
                "Username must not be empty",
            )));
        }
        PinPolicy::default().validate(pin)?;

        info!(actor = %username, role = %role, "Creating user: {}", new_username);
        Ok(self.persistence.create_user(
            new_username,
            display_name.trim(),
            pin,
            role,
            &authorized.actor,
        )?)
    }

    /// Changes the role of a user.
    ///
    /// Requires `manage_users`. The last admin cannot be demoted.
    ///
    /// # Errors
    ///
    /// Returns `Denied`, `NotFound`, `ValidationError`, or a storage error.
    pub fn change_role(
        &mut self,
        target: &str,
        role: Role,
        username: &str,
    ) -> Result<(), StoreError> {
        let authorized: AuthorizedActor = self.authorize(username, Capability::ManageUsers)?;
        info!(actor = %username, role = %role, "Changing role of user: {}", target);
        Ok(self.persistence.change_role(target, role, &authorized.actor)?)
    }

    /// Deletes a user.
    ///
    /// Requires `manage_users`. The last admin cannot be deleted.
    ///
    /// # Errors
    ///
    /// Returns `Denied`, `NotFound`, `ValidationError`, or a storage error.
    pub fn delete_user(&mut self, target: &str, username: &str) -> Result<(), StoreError> {
        let authorized: AuthorizedActor = self.authorize(username, Capability::ManageUsers)?;
        info!(actor = %username, "Deleting user: {}", target);
        Ok(self.persistence.delete_user(target, &authorized.actor)?)
    }

    /// Grants or revokes a capability for every user of a role.
    ///
    /// Requires `manage_users`.
    ///
    /// # Errors
    ///
    /// Returns `Denied` or a storage error.
    pub fn set_role_capability(
        &mut self,
        role: Role,
        capability: Capability,
        allowed: bool,
        username: &str,
    ) -> Result<(), StoreError> {
        let authorized: AuthorizedActor = self.authorize(username, Capability::ManageUsers)?;
        Ok(self
            .persistence
            .set_role_capability(role, capability, allowed, &authorized.actor)?)
    }

    /// Grants or revokes a capability for one user, overriding the role.
    ///
    /// Requires `manage_users`.
    ///
    /// # Errors
    ///
    /// Returns `Denied`, `NotFound`, or a storage error.
    pub fn set_user_capability(
        &mut self,
        target: &str,
        capability: Capability,
        allowed: bool,
        username: &str,
    ) -> Result<(), StoreError> {
        let authorized: AuthorizedActor = self.authorize(username, Capability::ManageUsers)?;
        Ok(self
            .persistence
            .set_user_capability(target, capability, allowed, &authorized.actor)?)
    }

    // ========================================================================
    // Audit
    // ========================================================================

    /// Returns the newest `limit` audit entries.
    ///
    /// Requires `view_reports`.
    ///
    /// # Errors
    ///
    /// Returns `Denied` or a storage error.
    pub fn audit_trail(&mut self, limit: i64, username: &str) -> Result<Vec<AuditRecord>, StoreError> {
        self.authorize(username, Capability::ViewReports)?;
        Ok(self.persistence.get_audit_log(&AuditFilter::latest(limit))?)
    }

    /// Returns the history of one employee, oldest first.
    ///
    /// History follows the employee through identifier swaps.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for a malformed identifier, or a storage
    /// error.
    pub fn employee_history(&mut self, id: &str) -> Result<Vec<AuditRecord>, StoreError> {
        let id: EmployeeId = parse_id(id)?;
        Ok(self.persistence.record_history(&id.to_string())?)
    }

    // ========================================================================
    // Edit Locks
    // ========================================================================

    /// Takes or renews the edit lock on a record for 30 minutes.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if another user holds a live lock.
    pub fn acquire_edit_lock(&mut self, id: &str, username: &str) -> Result<EditLockData, StoreError> {
        let id: EmployeeId = parse_id(id)?;
        Ok(self.persistence.acquire_edit_lock(&id.to_string(), username)?)
    }

    /// Releases a lock held by `username`. Returns false if none was held.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn release_edit_lock(&mut self, id: &str, username: &str) -> Result<bool, StoreError> {
        let id: EmployeeId = parse_id(id)?;
        Ok(self.persistence.release_edit_lock(&id.to_string(), username)?)
    }

    /// Extends a lock held by `username`. Returns false if none was held.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn refresh_edit_lock(&mut self, id: &str, username: &str) -> Result<bool, StoreError> {
        let id: EmployeeId = parse_id(id)?;
        Ok(self.persistence.refresh_edit_lock(&id.to_string(), username)?)
    }

    /// Removes expired locks and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn cleanup_expired_locks(&mut self) -> Result<usize, StoreError> {
        Ok(self.persistence.cleanup_expired_locks()?)
    }

    // ========================================================================
    // Identifier Swap
    // ========================================================================

    /// Exchanges the sequence numbers of two employees.
    ///
    /// See [`IdentifierSwapTransaction`].
    ///
    /// # Errors
    ///
    /// Returns an error if the swap is rejected or rolled back.
    pub fn swap_identifiers(
        &mut self,
        first_token: &str,
        second_token: &str,
        username: &str,
    ) -> Result<SwapReport, StoreError> {
        IdentifierSwapTransaction::new(&mut self.persistence, &self.config).execute(
            username,
            first_token,
            second_token,
        )
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Writes a timestamped backup into the configured backup directory.
    ///
    /// Requires `backup_restore`.
    ///
    /// # Errors
    ///
    /// Returns `Denied` or a storage error.
    pub fn backup_now(&mut self, username: &str) -> Result<BackupOutcome, StoreError> {
        let authorized: AuthorizedActor = self.authorize(username, Capability::BackupRestore)?;
        let outcome: BackupOutcome = self
            .persistence
            .backup_now(&self.config.backup_dir, self.config.backup_keep)?;

        let entry: AuditEntry = AuditEntry::new(authorized.actor, AuditAction::Backup)
            .with_details(format!("Backup written to {}", outcome.path.display()));
        if let Err(err) = self.persistence.append_audit_entry(&entry) {
            warn!("Failed to record backup audit entry: {}", err);
        }
        Ok(outcome)
    }

    /// Replaces the database with the backup at `backup`.
    ///
    /// Requires `backup_restore`. The backup is verified on a copy first;
    /// a backup that fails leaves the database untouched. A safety backup
    /// of the current database is written to the backup directory before
    /// it is replaced, and the replaced file is kept beside the database as
    /// `<file>.pre_restore_<timestamp>`.
    ///
    /// # Errors
    ///
    /// Returns `Denied`, or a storage error if verification, the safety
    /// backup or the file replacement fails.
    pub fn restore_from_backup(
        &mut self,
        backup: &Path,
        username: &str,
    ) -> Result<RestoreOutcome, StoreError> {
        let authorized: AuthorizedActor = self.authorize(username, Capability::BackupRestore)?;
        let staged: StagedRestore =
            maintenance::stage_restore(backup, &self.config.database_path)?;

        let safety: BackupOutcome = match self
            .persistence
            .backup_now(&self.config.backup_dir, self.config.backup_keep)
        {
            Ok(outcome) => outcome,
            Err(err) => {
                staged.discard();
                return Err(err.into());
            }
        };
        info!(actor = %username, "Safety backup before restore: {}", safety.path.display());

        let outcome: RestoreOutcome =
            self.persistence
                .install_restore(&self.config, staged, "pre_restore")?;

        let entry: AuditEntry = AuditEntry::new(authorized.actor, AuditAction::RestoreBackup)
            .with_details(format!(
                "Restored from {}; safety backup {}",
                outcome.source.display(),
                safety.path.display()
            ));
        if let Err(err) = self.persistence.append_audit_entry(&entry) {
            warn!("Failed to record restore audit entry: {}", err);
        }
        Ok(outcome)
    }

    /// Runs every health check.
    ///
    /// # Errors
    ///
    /// Returns an error only if the report itself cannot be produced.
    pub fn health_check(&mut self) -> Result<HealthReport, StoreError> {
        Ok(self.persistence.health_check()?)
    }

    /// Checkpoints the WAL into the database file.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint fails.
    pub fn checkpoint(&mut self) -> Result<CheckpointResult, StoreError> {
        Ok(self.persistence.checkpoint()?)
    }

    /// Checkpoints and closes the store.
    pub fn close(self) {
        self.persistence.close();
    }
}
