// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::DomainError;

/// Roles an application user can hold.
///
/// Admins bypass capability checks entirely. Managers and plain users are
/// governed by the capability table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Highest trust tier.
    Admin,
    /// Supervisory role.
    Manager,
    /// Regular operator.
    User,
}

impl Role {
    /// Converts this role to its stored string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::User => "user",
        }
    }

    /// Returns true if this role bypasses capability checks.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl FromStr for Role {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "user" => Ok(Self::User),
            _ => Err(DomainError::InvalidRole(s.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A capability key checked before a mutating operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    AddEmployee,
    EditEmployee,
    DeleteEmployee,
    ManageUsers,
    ViewReports,
    BackupRestore,
}

impl Capability {
    /// Every capability, in key order.
    pub const ALL: [Self; 6] = [
        Self::AddEmployee,
        Self::EditEmployee,
        Self::DeleteEmployee,
        Self::ManageUsers,
        Self::ViewReports,
        Self::BackupRestore,
    ];

    /// Converts this capability to its string key.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AddEmployee => "add_employee",
            Self::EditEmployee => "edit_employee",
            Self::DeleteEmployee => "delete_employee",
            Self::ManageUsers => "manage_users",
            Self::ViewReports => "view_reports",
            Self::BackupRestore => "backup_restore",
        }
    }
}

impl FromStr for Capability {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|cap| cap.as_str() == s.trim())
            .ok_or_else(|| DomainError::InvalidCapability(s.to_string()))
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
