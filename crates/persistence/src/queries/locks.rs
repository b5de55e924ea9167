// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Edit lock queries.

use diesel::prelude::*;
use diesel::SqliteConnection;

use crate::data_models::EditLockData;
use crate::diesel_schema::edit_locks;
use crate::error::PersistenceError;

/// Diesel Queryable struct for edit lock rows.
#[derive(Queryable, Selectable)]
#[diesel(table_name = edit_locks)]
struct EditLockRow {
    emp_id: String,
    locked_by: String,
    locked_at: String,
    expires_at: String,
}

/// Retrieves the lock on a record, expired or not.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn get_edit_lock(
    conn: &mut SqliteConnection,
    emp_id: &str,
) -> Result<Option<EditLockData>, PersistenceError> {
    Ok(edit_locks::table
        .filter(edit_locks::emp_id.eq(emp_id))
        .select(EditLockRow::as_select())
        .first::<EditLockRow>(conn)
        .optional()?
        .map(|row| EditLockData {
            emp_id: row.emp_id,
            locked_by: row.locked_by,
            locked_at: row.locked_at,
            expires_at: row.expires_at,
        }))
}
