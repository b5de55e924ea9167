// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use serde::{Deserialize, Serialize};
use time::Date;

use crate::types::EmployeeId;

/// Editable attributes of an employee record.
///
/// Everything except the identifier, the modification stamp and the
/// archival marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeDetails {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub hire_date: Option<Date>,
    pub resign_date: Option<Date>,
    pub contract_start_date: Option<Date>,
    pub contract_months: Option<u16>,
    pub contract_expiry: Option<Date>,
    pub agency: Option<String>,
    pub sss_number: Option<String>,
    pub tin_number: Option<String>,
    pub pagibig_number: Option<String>,
    pub philhealth_number: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
    pub notes: Option<String>,
}

impl EmployeeDetails {
    /// Creates details carrying only a name.
    #[must_use]
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// Marks a record as archived (soft deleted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveMarker {
    /// When the record was archived.
    pub archived_at: String,
    /// Username of the actor who archived it.
    pub archived_by: String,
    /// Optional free-text reason.
    pub reason: Option<String>,
}

/// A persisted employee record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub details: EmployeeDetails,
    /// Timestamp of the last modification.
    pub modified: String,
    /// Username of the last modifier.
    pub modified_by: String,
    /// Present when the record is archived.
    pub archived: Option<ArchiveMarker>,
}

impl Employee {
    /// Returns true if the record carries the archival marker.
    #[must_use]
    pub const fn is_archived(&self) -> bool {
        self.archived.is_some()
    }
}
