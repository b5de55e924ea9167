// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Attachment mutations.
//!
//! Only the rows are handled here; copying and removing the files is the
//! caller's job.

use diesel::prelude::*;
use diesel::SqliteConnection;
use emp_vault_audit::{Actor, AuditAction, AuditEntry};
use emp_vault_domain::EmployeeId;
use tracing::info;

use crate::backend::sqlite::get_last_insert_rowid;
use crate::data_models::AttachmentData;
use crate::diesel_schema::employee_files;
use crate::error::PersistenceError;
use crate::mutations::audit::insert_audit_entry;
use crate::queries::attachments::get_attachment;
use crate::queries::employees::employee_exists;

/// Records an attachment for an employee.
///
/// # Returns
///
/// The attachment row id.
///
/// # Errors
///
/// Returns an error if the employee does not exist, already has an
/// attachment with this name, or the insert fails.
pub fn insert_attachment(
    conn: &mut SqliteConnection,
    id: &EmployeeId,
    file_name: &str,
    actor: &Actor,
) -> Result<i64, PersistenceError> {
    conn.immediate_transaction(|conn| {
        let emp_id: String = id.to_string();
        if !employee_exists(conn, &emp_id)? {
            return Err(PersistenceError::EmployeeNotFound(emp_id));
        }

        let existing: i64 = employee_files::table
            .filter(employee_files::emp_id.eq(&emp_id))
            .filter(employee_files::file_name.eq(file_name))
            .count()
            .get_result(conn)?;
        if existing > 0 {
            return Err(PersistenceError::DuplicateAttachment {
                emp_id,
                file_name: file_name.to_string(),
            });
        }

        diesel::insert_into(employee_files::table)
            .values((
                employee_files::emp_id.eq(&emp_id),
                employee_files::file_name.eq(file_name),
                employee_files::uploaded_by.eq(&actor.username),
            ))
            .execute(conn)?;
        let attachment_id: i64 = get_last_insert_rowid(conn)?;

        info!(attachment_id, "Attachment {} recorded for {}", file_name, emp_id);

        insert_audit_entry(
            conn,
            &AuditEntry::for_employee(actor.clone(), AuditAction::AttachmentAdded, id)
                .with_values(None, Some(file_name.to_string())),
        )?;
        Ok(attachment_id)
    })
}

/// Removes an attachment row.
///
/// # Returns
///
/// The removed row.
///
/// # Errors
///
/// Returns an error if the attachment does not exist or the delete fails.
pub fn delete_attachment(
    conn: &mut SqliteConnection,
    attachment_id: i64,
    actor: &Actor,
) -> Result<AttachmentData, PersistenceError> {
    conn.immediate_transaction(|conn| {
        let attachment: AttachmentData = get_attachment(conn, attachment_id)?
            .ok_or(PersistenceError::AttachmentNotFound(attachment_id))?;

        diesel::delete(employee_files::table.filter(employee_files::id.eq(attachment_id)))
            .execute(conn)?;

        info!(attachment_id, "Attachment {} removed", attachment.file_name);

        insert_audit_entry(
            conn,
            &AuditEntry::new(actor.clone(), AuditAction::AttachmentRemoved)
                .with_table("employee_files")
                .with_record(attachment.emp_id.clone())
                .with_values(Some(attachment.file_name.clone()), None),
        )?;
        Ok(attachment)
    })
}
