// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Employee mutations.
//!
//! Archival is a field mutation. The only path that removes a row is
//! [`purge_employee`], which requires the record to be archived first.

use diesel::prelude::*;
use diesel::SqliteConnection;
use emp_vault_audit::{Actor, AuditAction, AuditEntry};
use emp_vault_domain::{Employee, EmployeeDetails, EmployeeId};
use tracing::{debug, info};

use crate::clock;
use crate::diesel_schema::{edit_locks, employees};
use crate::error::PersistenceError;
use crate::mutations::audit::insert_audit_entry;
use crate::queries::employees::{employee_exists, get_employee};

/// Column values written on insert and update.
#[derive(Insertable, AsChangeset)]
#[diesel(table_name = employees)]
#[diesel(treat_none_as_null = true)]
struct EmployeeChanges<'a> {
    name: &'a str,
    email: Option<&'a str>,
    phone: Option<&'a str>,
    department: Option<&'a str>,
    position: Option<&'a str>,
    hire_date: Option<String>,
    resign_date: Option<String>,
    contract_start_date: Option<String>,
    contract_months: Option<i32>,
    contract_expiry: Option<String>,
    agency: Option<&'a str>,
    sss_number: Option<&'a str>,
    tin_number: Option<&'a str>,
    pagibig_number: Option<&'a str>,
    philhealth_number: Option<&'a str>,
    emergency_contact_name: Option<&'a str>,
    emergency_contact_phone: Option<&'a str>,
    notes: Option<&'a str>,
    modified: &'a str,
    modified_by: &'a str,
}

/// A complete new row.
#[derive(Insertable)]
#[diesel(table_name = employees)]
struct NewEmployee<'a> {
    emp_id: &'a str,
    #[diesel(embed)]
    changes: EmployeeChanges<'a>,
}

impl<'a> EmployeeChanges<'a> {
    fn from_details(
        details: &'a EmployeeDetails,
        modified: &'a str,
        modified_by: &'a str,
    ) -> Result<Self, PersistenceError> {
        let date = |d: Option<time::Date>| d.map(clock::date_to_string).transpose();
        Ok(Self {
            name: details.name.trim(),
            email: details.email.as_deref(),
            phone: details.phone.as_deref(),
            department: details.department.as_deref(),
            position: details.position.as_deref(),
            hire_date: date(details.hire_date)?,
            resign_date: date(details.resign_date)?,
            contract_start_date: date(details.contract_start_date)?,
            contract_months: details.contract_months.map(i32::from),
            contract_expiry: date(details.contract_expiry)?,
            agency: details.agency.as_deref(),
            sss_number: details.sss_number.as_deref(),
            tin_number: details.tin_number.as_deref(),
            pagibig_number: details.pagibig_number.as_deref(),
            philhealth_number: details.philhealth_number.as_deref(),
            emergency_contact_name: details.emergency_contact_name.as_deref(),
            emergency_contact_phone: details.emergency_contact_phone.as_deref(),
            notes: details.notes.as_deref(),
            modified,
            modified_by,
        })
    }
}

fn require_employee(
    conn: &mut SqliteConnection,
    id: &EmployeeId,
) -> Result<Employee, PersistenceError> {
    get_employee(conn, id)?.ok_or_else(|| PersistenceError::EmployeeNotFound(id.to_string()))
}

/// Inserts a new employee.
///
/// Identifiers are unique across archived and active rows alike.
///
/// # Arguments
///
/// * `conn` - The database connection
/// * `id` - The new identifier
/// * `details` - The validated attributes
/// * `actor` - The acting user
///
/// # Errors
///
/// Returns an error if the identifier already exists or the insert fails.
pub fn insert_employee(
    conn: &mut SqliteConnection,
    id: &EmployeeId,
    details: &EmployeeDetails,
    actor: &Actor,
) -> Result<(), PersistenceError> {
    conn.immediate_transaction(|conn| {
        let emp_id: String = id.to_string();
        if employee_exists(conn, &emp_id)? {
            return Err(PersistenceError::DuplicateEmployee(emp_id));
        }

        info!("Adding employee: {} ({})", emp_id, details.name);

        let modified: String = clock::now()?;
        diesel::insert_into(employees::table)
            .values(NewEmployee {
                emp_id: &emp_id,
                changes: EmployeeChanges::from_details(details, &modified, &actor.username)?,
            })
            .execute(conn)?;

        insert_audit_entry(
            conn,
            &AuditEntry::for_employee(actor.clone(), AuditAction::Added, id)
                .with_details(format!("Added employee: {}", details.name.trim())),
        )?;
        Ok(())
    })
}

/// Replaces the attributes of an existing employee.
///
/// The identifier itself never changes here.
///
/// # Errors
///
/// Returns an error if the employee does not exist or the update fails.
pub fn update_employee(
    conn: &mut SqliteConnection,
    id: &EmployeeId,
    details: &EmployeeDetails,
    actor: &Actor,
) -> Result<(), PersistenceError> {
    conn.immediate_transaction(|conn| {
        let previous: Employee = require_employee(conn, id)?;

        info!("Updating employee: {}", id);

        let modified: String = clock::now()?;
        diesel::update(employees::table)
            .filter(employees::emp_id.eq(id.to_string()))
            .set(EmployeeChanges::from_details(details, &modified, &actor.username)?)
            .execute(conn)?;

        insert_audit_entry(
            conn,
            &AuditEntry::for_employee(actor.clone(), AuditAction::Edited, id)
                .with_values(
                    Some(serde_json::to_string(&previous.details)?),
                    Some(serde_json::to_string(details)?),
                )
                .with_details(format!("Edited employee: {}", details.name.trim())),
        )?;
        Ok(())
    })
}

/// Sets the archival marker on an employee.
///
/// Archiving an already archived record changes nothing.
///
/// # Returns
///
/// `true` if the record was archived by this call.
///
/// # Errors
///
/// Returns an error if the employee does not exist or the update fails.
pub fn archive_employee(
    conn: &mut SqliteConnection,
    id: &EmployeeId,
    actor: &Actor,
    reason: Option<&str>,
) -> Result<bool, PersistenceError> {
    conn.immediate_transaction(|conn| {
        let employee: Employee = require_employee(conn, id)?;
        if employee.is_archived() {
            debug!("Employee {} is already archived", id);
            return Ok(false);
        }

        info!("Archiving employee: {}", id);

        let now: String = clock::now()?;
        diesel::update(employees::table)
            .filter(employees::emp_id.eq(id.to_string()))
            .set((
                employees::archived_at.eq(Some(now.as_str())),
                employees::archived_by.eq(Some(actor.username.as_str())),
                employees::archive_reason.eq(reason),
                employees::modified.eq(&now),
                employees::modified_by.eq(&actor.username),
            ))
            .execute(conn)?;

        diesel::delete(edit_locks::table.filter(edit_locks::emp_id.eq(id.to_string())))
            .execute(conn)?;

        insert_audit_entry(
            conn,
            &AuditEntry::for_employee(actor.clone(), AuditAction::Archived, id).with_details(
                format!(
                    "Archived employee: {} - Reason: {}",
                    employee.details.name,
                    reason.unwrap_or("None specified")
                ),
            ),
        )?;
        Ok(true)
    })
}

/// Clears the archival marker on an employee.
///
/// # Errors
///
/// Returns an error if the employee does not exist, is not archived, or
/// the update fails.
pub fn restore_employee(
    conn: &mut SqliteConnection,
    id: &EmployeeId,
    actor: &Actor,
) -> Result<(), PersistenceError> {
    conn.immediate_transaction(|conn| {
        let employee: Employee = require_employee(conn, id)?;
        if !employee.is_archived() {
            return Err(PersistenceError::NotArchived(id.to_string()));
        }

        info!("Restoring employee: {}", id);

        let now: String = clock::now()?;
        diesel::update(employees::table)
            .filter(employees::emp_id.eq(id.to_string()))
            .set((
                employees::archived_at.eq(None::<String>),
                employees::archived_by.eq(None::<String>),
                employees::archive_reason.eq(None::<String>),
                employees::modified.eq(&now),
                employees::modified_by.eq(&actor.username),
            ))
            .execute(conn)?;

        insert_audit_entry(
            conn,
            &AuditEntry::for_employee(actor.clone(), AuditAction::Restored, id)
                .with_details(format!("Restored employee: {}", employee.details.name)),
        )?;
        Ok(())
    })
}

/// Removes an archived employee and its attachment rows.
///
/// # Returns
///
/// The removed record.
///
/// # Errors
///
/// Returns an error if the employee does not exist, is not archived, or
/// the delete fails.
pub fn purge_employee(
    conn: &mut SqliteConnection,
    id: &EmployeeId,
    actor: &Actor,
) -> Result<Employee, PersistenceError> {
    conn.immediate_transaction(|conn| {
        let employee: Employee = require_employee(conn, id)?;
        if !employee.is_archived() {
            return Err(PersistenceError::NotArchived(id.to_string()));
        }

        info!("Permanently deleting employee: {}", id);

        diesel::delete(employees::table.filter(employees::emp_id.eq(id.to_string())))
            .execute(conn)?;
        diesel::delete(edit_locks::table.filter(edit_locks::emp_id.eq(id.to_string())))
            .execute(conn)?;

        insert_audit_entry(
            conn,
            &AuditEntry::for_employee(actor.clone(), AuditAction::PermanentlyDeleted, id)
                .with_details(format!(
                    "Permanently deleted archived employee: {}",
                    employee.details.name
                )),
        )?;
        Ok(employee)
    })
}
