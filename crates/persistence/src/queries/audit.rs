// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Audit log queries.

use diesel::prelude::*;
use diesel::SqliteConnection;
use emp_vault_audit::{Actor, AuditAction, AuditEntry, AuditRecord};

use crate::data_models::AuditFilter;
use crate::diesel_schema::audit_log;
use crate::error::PersistenceError;

/// Diesel Queryable struct for audit rows.
#[derive(Queryable, Selectable)]
#[diesel(table_name = audit_log)]
struct AuditRow {
    id: i64,
    timestamp: String,
    username: String,
    action: String,
    table_name: Option<String>,
    record_id: Option<String>,
    old_value: Option<String>,
    new_value: Option<String>,
    details: Option<String>,
}

impl AuditRow {
    fn into_record(self) -> Result<AuditRecord, PersistenceError> {
        let action: AuditAction = AuditAction::from_name(&self.action).ok_or_else(|| {
            PersistenceError::SerializationError(format!("Unknown audit action: {}", self.action))
        })?;
        Ok(AuditRecord {
            id: self.id,
            timestamp: self.timestamp,
            entry: AuditEntry {
                actor: Actor::new(self.username),
                action,
                table_name: self.table_name,
                record_id: self.record_id,
                old_value: self.old_value,
                new_value: self.new_value,
                details: self.details,
            },
        })
    }
}

/// Retrieves audit entries matching a filter, newest first.
///
/// # Errors
///
/// Returns an error if the database query fails or a row holds an unknown
/// action.
pub fn get_audit_log(
    conn: &mut SqliteConnection,
    filter: &AuditFilter,
) -> Result<Vec<AuditRecord>, PersistenceError> {
    let mut query = audit_log::table
        .select(AuditRow::as_select())
        .order((audit_log::timestamp.desc(), audit_log::id.desc()))
        .limit(filter.limit)
        .into_boxed();

    if let Some(username) = &filter.username {
        query = query.filter(audit_log::username.eq(username.clone()));
    }
    if let Some(action) = &filter.action {
        query = query.filter(audit_log::action.eq(action.clone()));
    }
    if let Some(record_id) = &filter.record_id {
        query = query.filter(audit_log::record_id.eq(record_id.clone()));
    }

    query
        .load::<AuditRow>(conn)?
        .into_iter()
        .map(AuditRow::into_record)
        .collect()
}

/// Retrieves the full history of one record, oldest first.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn record_history(
    conn: &mut SqliteConnection,
    record_id: &str,
) -> Result<Vec<AuditRecord>, PersistenceError> {
    audit_log::table
        .filter(audit_log::record_id.eq(record_id))
        .select(AuditRow::as_select())
        .order(audit_log::id.asc())
        .load::<AuditRow>(conn)?
        .into_iter()
        .map(AuditRow::into_record)
        .collect()
}

/// Counts all audit rows.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_audit_entries(conn: &mut SqliteConnection) -> Result<i64, PersistenceError> {
    Ok(audit_log::table.count().get_result(conn)?)
}
