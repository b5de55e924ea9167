// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Read-only health checks.
//!
//! Every check runs even when an earlier one fails, so a report always
//! lists the full picture.

use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel::SqliteConnection;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

use crate::clock;
use crate::error::PersistenceError;
use crate::queries::attachments::count_orphaned_attachments;
use crate::queries::employees::count_placeholder_identifiers;
use crate::queries::file_moves::list_pending_moves;

/// Tables the store cannot run without.
pub const REQUIRED_TABLES: [&str; 8] = [
    "employees",
    "employee_files",
    "audit_log",
    "users",
    "role_capabilities",
    "user_capabilities",
    "edit_locks",
    "pending_file_moves",
];

/// Indexes the listing and history queries rely on.
pub const CRITICAL_INDEXES: [&str; 4] = [
    "idx_employees_archived_at",
    "idx_employee_files_emp_id",
    "idx_audit_log_record_id",
    "idx_audit_log_timestamp",
];

/// The outcome of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub passed: bool,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// The outcome of a full health run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub checks: Vec<HealthCheck>,
    pub generated_at: String,
}

impl HealthReport {
    /// Returns the named check, if it ran.
    #[must_use]
    pub fn check(&self, name: &str) -> Option<&HealthCheck> {
        self.checks.iter().find(|c| c.name == name)
    }

    /// Returns the checks that failed.
    pub fn failures(&self) -> impl Iterator<Item = &HealthCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

#[derive(QueryableByName)]
struct QuickCheckRow {
    #[diesel(sql_type = Text)]
    quick_check: String,
}

#[derive(QueryableByName)]
struct ForeignKeyRow {
    #[diesel(sql_type = Text)]
    table_name: String,
    #[diesel(sql_type = Text)]
    parent: String,
}

#[derive(QueryableByName)]
struct NameRow {
    #[diesel(sql_type = Text)]
    name: String,
}

/// Runs and times `check`, turning its result into a `HealthCheck`. `Ok(None)` passes,
/// `Ok(Some(_))` fails with details, and `Err` fails with the error.
fn timed<F>(name: &str, check: F) -> HealthCheck
where
    F: FnOnce() -> Result<Option<String>, PersistenceError>,
{
    let start: Instant = Instant::now();
    let (passed, details) = match check() {
        Ok(None) => (true, None),
        Ok(Some(problem)) => (false, Some(problem)),
        Err(err) => (false, Some(format!("{name} failed: {err}"))),
    };
    HealthCheck {
        name: name.to_string(),
        passed,
        duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        details,
    }
}

fn quick_check(conn: &mut SqliteConnection) -> Result<Option<String>, PersistenceError> {
    // NOTE: PRAGMA is raw SQL (justified - Diesel has no PRAGMA DSL)
    let rows: Vec<QuickCheckRow> = diesel::sql_query("PRAGMA quick_check").load(conn)?;
    let problems: Vec<String> = rows
        .into_iter()
        .map(|r| r.quick_check)
        .filter(|r| !r.eq_ignore_ascii_case("ok"))
        .collect();
    Ok((!problems.is_empty()).then(|| problems.join("; ")))
}

fn foreign_key_check(conn: &mut SqliteConnection) -> Result<Option<String>, PersistenceError> {
    // NOTE: PRAGMA is raw SQL (justified - Diesel has no PRAGMA DSL)
    let rows: Vec<ForeignKeyRow> = diesel::sql_query(
        "SELECT \"table\" AS table_name, parent FROM pragma_foreign_key_check()",
    )
    .load(conn)?;
    if rows.is_empty() {
        return Ok(None);
    }
    let first: &ForeignKeyRow = &rows[0];
    Ok(Some(format!(
        "{} foreign key violation(s), first in {} referencing {}",
        rows.len(),
        first.table_name,
        first.parent
    )))
}

fn schema_names(conn: &mut SqliteConnection, kind: &str) -> Result<Vec<String>, PersistenceError> {
    Ok(
        diesel::sql_query("SELECT name FROM sqlite_master WHERE type = ?")
            .bind::<Text, _>(kind)
            .load::<NameRow>(conn)?
            .into_iter()
            .map(|r| r.name)
            .collect(),
    )
}

fn missing_from(
    conn: &mut SqliteConnection,
    kind: &str,
    expected: &[&str],
) -> Result<Option<String>, PersistenceError> {
    let present: Vec<String> = schema_names(conn, kind)?;
    let missing: Vec<&str> = expected
        .iter()
        .copied()
        .filter(|name| !present.iter().any(|p| p == name))
        .collect();
    Ok((!missing.is_empty()).then(|| format!("missing {kind}(s): {}", missing.join(", "))))
}

/// Runs every health check.
///
/// # Errors
///
/// Returns an error only if the report timestamp cannot be produced;
/// failing checks are reported in the result.
pub fn run_health_checks(conn: &mut SqliteConnection) -> Result<HealthReport, PersistenceError> {
    let checks: Vec<HealthCheck> = vec![
        timed("quick_check", || quick_check(conn)),
        timed("foreign_key_check", || foreign_key_check(conn)),
        timed("required_tables", || missing_from(conn, "table", &REQUIRED_TABLES)),
        timed("critical_indexes", || missing_from(conn, "index", &CRITICAL_INDEXES)),
        timed("orphaned_attachments", || {
            let orphans: i64 = count_orphaned_attachments(conn)?;
            Ok((orphans > 0).then(|| format!("{orphans} attachment row(s) without an employee")))
        }),
        timed("placeholder_identifiers", || {
            let placeholders: i64 = count_placeholder_identifiers(conn)?;
            Ok((placeholders > 0)
                .then(|| format!("{placeholders} record(s) still carry a swap placeholder")))
        }),
        timed("pending_file_moves", || {
            let pending: usize = list_pending_moves(conn)?.len();
            Ok((pending > 0).then(|| format!("{pending} file move(s) not yet carried out")))
        }),
    ];

    let healthy: bool = checks.iter().all(|c| c.passed);
    if healthy {
        info!("Database health checks passed");
    } else {
        for failed in checks.iter().filter(|c| !c.passed) {
            warn!(
                check = %failed.name,
                details = failed.details.as_deref().unwrap_or(""),
                "Database health check failed"
            );
        }
    }

    Ok(HealthReport {
        healthy,
        checks,
        generated_at: clock::now()?,
    })
}
