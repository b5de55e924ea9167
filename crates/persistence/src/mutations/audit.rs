// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Audit log mutations.

use diesel::prelude::*;
use diesel::SqliteConnection;
use emp_vault_audit::AuditEntry;
use tracing::debug;

use crate::backend::sqlite::get_last_insert_rowid;
use crate::clock;
use crate::diesel_schema::audit_log;
use crate::error::PersistenceError;

/// Appends an entry to the audit log.
///
/// # Arguments
///
/// * `conn` - The database connection
/// * `entry` - The entry to append
///
/// # Returns
///
/// The row id assigned to the entry.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_audit_entry(
    conn: &mut SqliteConnection,
    entry: &AuditEntry,
) -> Result<i64, PersistenceError> {
    let timestamp: String = clock::now()?;

    diesel::insert_into(audit_log::table)
        .values((
            audit_log::timestamp.eq(&timestamp),
            audit_log::username.eq(&entry.actor.username),
            audit_log::action.eq(entry.action.as_str()),
            audit_log::table_name.eq(entry.table_name.as_deref()),
            audit_log::record_id.eq(entry.record_id.as_deref()),
            audit_log::old_value.eq(entry.old_value.as_deref()),
            audit_log::new_value.eq(entry.new_value.as_deref()),
            audit_log::details.eq(entry.details.as_deref()),
        ))
        .execute(conn)?;

    let id: i64 = get_last_insert_rowid(conn)?;
    debug!(audit_id = id, action = %entry.action, "Audit entry appended");
    Ok(id)
}
