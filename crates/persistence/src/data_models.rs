// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use emp_vault_domain::Role;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A stored application user, without the PIN hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub created_at: String,
}

/// An attachment row.
///
/// The file itself lives at `<files-dir>/<emp_id>/files/<file_name>`, so the
/// row follows its owner through an identifier swap without rewriting paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentData {
    pub id: i64,
    pub emp_id: String,
    pub file_name: String,
    pub uploaded_at: String,
    pub uploaded_by: String,
}

/// An advisory edit lock on an employee record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditLockData {
    pub emp_id: String,
    pub locked_by: String,
    pub locked_at: String,
    pub expires_at: String,
}

/// One planned rename of a committed swap's filesystem stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFileMove {
    pub id: i64,
    pub swap_id: String,
    pub step_no: i32,
    /// Number of steps in the whole plan.
    pub step_count: i32,
    pub from_path: PathBuf,
    pub to_path: PathBuf,
}

/// A rename to be recorded in the pending move ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub from_path: PathBuf,
    pub to_path: PathBuf,
}

/// Filters for audit log queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditFilter {
    pub username: Option<String>,
    pub action: Option<String>,
    pub record_id: Option<String>,
    pub limit: i64,
}

impl AuditFilter {
    /// Creates a filter returning at most `limit` entries, newest first.
    #[must_use]
    pub fn latest(limit: i64) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }
}
