// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all
)]

use emp_vault_domain::{EmployeeId, Role};
use serde::{Deserialize, Serialize};

#[cfg(test)]
mod tests;

/// Represents the user performing an action.
///
/// Every audit entry is attributed to exactly one username. Actions taken
/// by the store itself (startup recovery, shutdown backup) use
/// [`Actor::system`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// The username of the acting user.
    pub username: String,
}

impl Actor {
    /// Creates a new Actor.
    ///
    /// # Arguments
    ///
    /// * `username` - The username of the acting user
    #[must_use]
    pub const fn new(username: String) -> Self {
        Self { username }
    }

    /// The actor used for store-initiated maintenance.
    #[must_use]
    pub fn system() -> Self {
        Self::new(String::from("system"))
    }
}

/// The kind of change an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    Added,
    Edited,
    Archived,
    Restored,
    PermanentlyDeleted,
    SwapEmpId,
    AttachmentAdded,
    AttachmentRemoved,
    UserCreated,
    UserRoleChanged,
    UserDeleted,
    CapabilityChanged,
    PermissionDenied,
    Backup,
    RestoreBackup,
}

impl AuditAction {
    /// Every action, in declaration order.
    pub const ALL: [Self; 15] = [
        Self::Added,
        Self::Edited,
        Self::Archived,
        Self::Restored,
        Self::PermanentlyDeleted,
        Self::SwapEmpId,
        Self::AttachmentAdded,
        Self::AttachmentRemoved,
        Self::UserCreated,
        Self::UserRoleChanged,
        Self::UserDeleted,
        Self::CapabilityChanged,
        Self::PermissionDenied,
        Self::Backup,
        Self::RestoreBackup,
    ];

    /// Looks up an action by its stored string representation.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == name)
    }

    /// Converts this action to its stored string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "ADDED",
            Self::Edited => "EDITED",
            Self::Archived => "ARCHIVED",
            Self::Restored => "RESTORED",
            Self::PermanentlyDeleted => "PERMANENTLY_DELETED",
            Self::SwapEmpId => "SWAP_EMP_ID",
            Self::AttachmentAdded => "ATTACHMENT_ADDED",
            Self::AttachmentRemoved => "ATTACHMENT_REMOVED",
            Self::UserCreated => "USER_CREATED",
            Self::UserRoleChanged => "USER_ROLE_CHANGED",
            Self::UserDeleted => "USER_DELETED",
            Self::CapabilityChanged => "CAPABILITY_CHANGED",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Backup => "BACKUP",
            Self::RestoreBackup => "RESTORE_BACKUP",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An audit entry waiting to be appended to the log.
///
/// Entries are append-only. Once written, only the `record_id` of a row may
/// change, and only when an identifier swap moves history to the new
/// identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Who performed the action.
    pub actor: Actor,
    /// What was done.
    pub action: AuditAction,
    /// The table the action touched, if any.
    pub table_name: Option<String>,
    /// The affected record identifier(s), comma separated.
    pub record_id: Option<String>,
    /// The value before the change.
    pub old_value: Option<String>,
    /// The value after the change.
    pub new_value: Option<String>,
    /// Free-text description.
    pub details: Option<String>,
}

impl AuditEntry {
    /// Creates a new audit entry with no table, record or values attached.
    ///
    /// # Arguments
    ///
    /// * `actor` - The acting user
    /// * `action` - The action performed
    #[must_use]
    pub const fn new(actor: Actor, action: AuditAction) -> Self {
        Self {
            actor,
            action,
            table_name: None,
            record_id: None,
            old_value: None,
            new_value: None,
            details: None,
        }
    }

    /// Creates an entry about a single employee record.
    #[must_use]
    pub fn for_employee(actor: Actor, action: AuditAction, id: &EmployeeId) -> Self {
        Self::new(actor, action)
            .with_table("employees")
            .with_record(id.to_string())
    }

    /// Creates the entry recording an identifier swap.
    ///
    /// The record column lists both original identifiers and the value
    /// columns hold the identifiers before and after the exchange.
    #[must_use]
    pub fn for_swap(
        actor: Actor,
        originals: (&EmployeeId, &EmployeeId),
        swapped: (&EmployeeId, &EmployeeId),
    ) -> Self {
        let (old_1, old_2) = originals;
        let (new_1, new_2) = swapped;
        Self::new(actor, AuditAction::SwapEmpId)
            .with_table("employees")
            .with_record(format!("{old_1},{old_2}"))
            .with_values(
                Some(format!("{old_1},{old_2}")),
                Some(format!("{new_1},{new_2}")),
            )
            .with_details(format!(
                "Swapped IDs: {old_1}\u{2194}{old_2} \u{2192} {new_1}\u{2194}{new_2}"
            ))
    }

    /// Creates the entry recording a rejected authorization attempt.
    #[must_use]
    pub fn for_denial(actor: Actor, capability: &str, role: Option<Role>) -> Self {
        let role: &str = role.as_ref().map_or("unknown", Role::as_str);
        Self::new(actor, AuditAction::PermissionDenied)
            .with_details(format!("Attempted '{capability}' with role {role}"))
    }

    /// Sets the table name.
    #[must_use]
    pub fn with_table(mut self, table_name: &str) -> Self {
        self.table_name = Some(table_name.to_string());
        self
    }

    /// Sets the affected record identifier(s).
    #[must_use]
    pub fn with_record(mut self, record_id: String) -> Self {
        self.record_id = Some(record_id);
        self
    }

    /// Sets the before and after values.
    #[must_use]
    pub fn with_values(mut self, old_value: Option<String>, new_value: Option<String>) -> Self {
        self.old_value = old_value;
        self.new_value = new_value;
        self
    }

    /// Sets the free-text details.
    #[must_use]
    pub fn with_details(mut self, details: String) -> Self {
        self.details = Some(details);
        self
    }
}

/// A persisted audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// The row identifier.
    pub id: i64,
    /// When the entry was written.
    pub timestamp: String,
    /// The entry as written.
    pub entry: AuditEntry,
}
