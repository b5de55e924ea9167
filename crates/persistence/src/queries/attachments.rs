// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Attachment queries.

use diesel::prelude::*;
use diesel::SqliteConnection;

use crate::data_models::AttachmentData;
use crate::diesel_schema::{employee_files, employees};
use crate::error::PersistenceError;

/// Diesel Queryable struct for attachment rows.
#[derive(Queryable, Selectable)]
#[diesel(table_name = employee_files)]
struct AttachmentRow {
    id: i64,
    emp_id: String,
    file_name: String,
    uploaded_at: String,
    uploaded_by: String,
}

impl From<AttachmentRow> for AttachmentData {
    fn from(row: AttachmentRow) -> Self {
        Self {
            id: row.id,
            emp_id: row.emp_id,
            file_name: row.file_name,
            uploaded_at: row.uploaded_at,
            uploaded_by: row.uploaded_by,
        }
    }
}

/// Lists the attachments of one employee ordered by upload.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_attachments(
    conn: &mut SqliteConnection,
    emp_id: &str,
) -> Result<Vec<AttachmentData>, PersistenceError> {
    Ok(employee_files::table
        .filter(employee_files::emp_id.eq(emp_id))
        .select(AttachmentRow::as_select())
        .order(employee_files::id.asc())
        .load::<AttachmentRow>(conn)?
        .into_iter()
        .map(AttachmentData::from)
        .collect())
}

/// Retrieves an attachment by row id.
///
/// # Errors
///
/// Returns an error if the database query fails.
/// Returns `Ok(None)` if no such attachment exists.
pub fn get_attachment(
    conn: &mut SqliteConnection,
    attachment_id: i64,
) -> Result<Option<AttachmentData>, PersistenceError> {
    Ok(employee_files::table
        .filter(employee_files::id.eq(attachment_id))
        .select(AttachmentRow::as_select())
        .first::<AttachmentRow>(conn)
        .optional()?
        .map(AttachmentData::from))
}

/// Counts attachment rows whose owner no longer exists.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_orphaned_attachments(conn: &mut SqliteConnection) -> Result<i64, PersistenceError> {
    Ok(employee_files::table
        .filter(diesel::dsl::not(
            employee_files::emp_id.eq_any(employees::table.select(employees::emp_id)),
        ))
        .count()
        .get_result(conn)?)
}
