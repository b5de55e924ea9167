// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Employee queries.

use diesel::prelude::*;
use diesel::SqliteConnection;
use emp_vault_domain::{ArchiveMarker, Employee, EmployeeDetails, EmployeeId};
use tracing::{debug, warn};

use crate::clock;
use crate::diesel_schema::employees;
use crate::error::PersistenceError;

/// Diesel Queryable struct for employee rows.
#[derive(Queryable, Selectable)]
#[diesel(table_name = employees)]
pub(crate) struct EmployeeRow {
    emp_id: String,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    department: Option<String>,
    position: Option<String>,
    hire_date: Option<String>,
    resign_date: Option<String>,
    contract_start_date: Option<String>,
    contract_months: Option<i32>,
    contract_expiry: Option<String>,
    agency: Option<String>,
    sss_number: Option<String>,
    tin_number: Option<String>,
    pagibig_number: Option<String>,
    philhealth_number: Option<String>,
    emergency_contact_name: Option<String>,
    emergency_contact_phone: Option<String>,
    notes: Option<String>,
    modified: String,
    modified_by: String,
    archived_at: Option<String>,
    archived_by: Option<String>,
    archive_reason: Option<String>,
}

fn parse_date(value: Option<String>) -> Result<Option<time::Date>, PersistenceError> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| clock::date_from_str(&v))
        .transpose()
}

impl EmployeeRow {
    /// Converts a stored row into a domain employee.
    pub(crate) fn into_employee(self) -> Result<Employee, PersistenceError> {
        let id: EmployeeId = self
            .emp_id
            .parse()
            .map_err(|e| PersistenceError::SerializationError(format!("{e}")))?;

        let contract_months: Option<u16> = self
            .contract_months
            .map(u16::try_from)
            .transpose()
            .map_err(|e| PersistenceError::SerializationError(e.to_string()))?;

        let archived: Option<ArchiveMarker> = self.archived_at.map(|archived_at| ArchiveMarker {
            archived_at,
            archived_by: self.archived_by.unwrap_or_default(),
            reason: self.archive_reason,
        });

        Ok(Employee {
            id,
            details: EmployeeDetails {
                name: self.name,
                email: self.email,
                phone: self.phone,
                department: self.department,
                position: self.position,
                hire_date: parse_date(self.hire_date)?,
                resign_date: parse_date(self.resign_date)?,
                contract_start_date: parse_date(self.contract_start_date)?,
                contract_months,
                contract_expiry: parse_date(self.contract_expiry)?,
                agency: self.agency,
                sss_number: self.sss_number,
                tin_number: self.tin_number,
                pagibig_number: self.pagibig_number,
                philhealth_number: self.philhealth_number,
                emergency_contact_name: self.emergency_contact_name,
                emergency_contact_phone: self.emergency_contact_phone,
                notes: self.notes,
            },
            modified: self.modified,
            modified_by: self.modified_by,
            archived,
        })
    }
}

/// Retrieves an employee by identifier, archived or not.
///
/// # Errors
///
/// Returns an error if the database query fails.
/// Returns `Ok(None)` if the employee is not found.
pub fn get_employee(
    conn: &mut SqliteConnection,
    id: &EmployeeId,
) -> Result<Option<Employee>, PersistenceError> {
    debug!("Looking up employee: {}", id);

    let result: Result<EmployeeRow, diesel::result::Error> = employees::table
        .filter(employees::emp_id.eq(id.to_string()))
        .select(EmployeeRow::as_select())
        .first(conn);

    match result {
        Ok(row) => row.into_employee().map(Some),
        Err(diesel::result::Error::NotFound) => Ok(None),
        Err(e) => Err(PersistenceError::from(e)),
    }
}

/// Lists employees ordered by identifier.
///
/// # Arguments
///
/// * `conn` - The database connection
/// * `include_archived` - Whether archived records are returned
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_employees(
    conn: &mut SqliteConnection,
    include_archived: bool,
) -> Result<Vec<Employee>, PersistenceError> {
    let mut query = employees::table
        .select(EmployeeRow::as_select())
        .order(employees::emp_id.asc())
        .into_boxed();
    if !include_archived {
        query = query.filter(employees::archived_at.is_null());
    }

    query
        .load::<EmployeeRow>(conn)?
        .into_iter()
        .map(EmployeeRow::into_employee)
        .collect()
}

/// Returns every stored identifier, archived records included.
///
/// Values that do not parse (such as a placeholder left by an external
/// tool) are skipped with a warning; the health check reports them.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_identifiers(conn: &mut SqliteConnection) -> Result<Vec<EmployeeId>, PersistenceError> {
    let raw: Vec<String> = employees::table
        .select(employees::emp_id)
        .order(employees::emp_id.asc())
        .load(conn)?;

    Ok(raw
        .into_iter()
        .filter_map(|value| match value.parse::<EmployeeId>() {
            Ok(id) => Some(id),
            Err(_) => {
                warn!("Skipping malformed stored identifier: {}", value);
                None
            }
        })
        .collect())
}

/// Returns true if a row with this identifier exists.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn employee_exists(conn: &mut SqliteConnection, id: &str) -> Result<bool, PersistenceError> {
    let count: i64 = employees::table
        .filter(employees::emp_id.eq(id))
        .count()
        .get_result(conn)?;
    Ok(count > 0)
}

/// Counts identifiers still carrying the swap placeholder prefix.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_placeholder_identifiers(conn: &mut SqliteConnection) -> Result<i64, PersistenceError> {
    Ok(employees::table
        .filter(
            employees::emp_id
                .like(format!(
                    "{}%",
                    emp_vault_domain::PLACEHOLDER_PREFIX.replace('_', "\\_")
                ))
                .escape('\\'),
        )
        .count()
        .get_result(conn)?)
}
