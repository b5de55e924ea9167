// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The database stage of an identifier swap.
//!
//! The two identifiers exchange their sequence numbers. Because the new
//! identifier of one record may equal the old identifier of the other, the
//! rename passes through a placeholder:
//!
//! 1. `first` becomes `TEMP_<first>`
//! 2. `second` becomes `new_second`
//! 3. `TEMP_<first>` becomes `new_first`
//!
//! Each step is applied to employee rows, attachment rows and the
//! `record_id` of audit rows. The planned file renames are written to the
//! pending move ledger in the same transaction, so a crash after commit
//! leaves a complete record of the filesystem work still owed.

use diesel::prelude::*;
use diesel::SqliteConnection;
use emp_vault_domain::EmployeeId;
use tracing::{debug, info};

use crate::clock;
use crate::data_models::{PendingFileMove, PlannedMove};
use crate::diesel_schema::{audit_log, edit_locks, employee_files, employees, pending_file_moves};
use crate::error::PersistenceError;
use crate::queries::employees::employee_exists;
use crate::queries::file_moves::list_pending_moves;
use crate::queries::locks::get_edit_lock;

/// A validated swap ready to be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapPlan {
    /// Groups the ledger rows of this swap.
    pub swap_id: String,
    /// The user performing the swap. Their own edit locks on the pair are
    /// released; anyone else's live lock blocks the swap.
    pub actor: String,
    pub first: EmployeeId,
    pub second: EmployeeId,
    pub new_first: EmployeeId,
    pub new_second: EmployeeId,
    /// File renames in the order they must run.
    pub moves: Vec<PlannedMove>,
}

/// Renames one identifier across every table that references it.
fn rename_identifier(
    conn: &mut SqliteConnection,
    from: &str,
    to: &str,
) -> Result<(), PersistenceError> {
    let updated: usize = diesel::update(employees::table.filter(employees::emp_id.eq(from)))
        .set(employees::emp_id.eq(to))
        .execute(conn)?;
    if updated != 1 {
        return Err(PersistenceError::EmployeeNotFound(from.to_string()));
    }

    let files: usize = diesel::update(employee_files::table.filter(employee_files::emp_id.eq(from)))
        .set(employee_files::emp_id.eq(to))
        .execute(conn)?;

    let audit_rows: usize = diesel::update(audit_log::table.filter(audit_log::record_id.eq(from)))
        .set(audit_log::record_id.eq(to))
        .execute(conn)?;

    debug!(files, audit_rows, "Renamed {} to {}", from, to);
    Ok(())
}

/// Checks that a target identifier is free or held by one of the pair.
fn ensure_target_free(
    conn: &mut SqliteConnection,
    target: &EmployeeId,
    plan: &SwapPlan,
) -> Result<(), PersistenceError> {
    if *target == plan.first || *target == plan.second {
        return Ok(());
    }
    if employee_exists(conn, &target.to_string())? {
        return Err(PersistenceError::DuplicateEmployee(target.to_string()));
    }
    Ok(())
}

/// Fails if someone other than the actor holds a live lock on `emp_id`.
///
/// A lock is keyed by identifier, so an edit saved after the swap would
/// land on the other record.
fn ensure_not_locked_by_others(
    conn: &mut SqliteConnection,
    emp_id: &str,
    actor: &str,
    now: &str,
) -> Result<(), PersistenceError> {
    if let Some(lock) = get_edit_lock(conn, emp_id)?
        && lock.locked_by != actor
        && lock.expires_at.as_str() > now
    {
        return Err(PersistenceError::EditLockHeld {
            emp_id: emp_id.to_string(),
            holder: lock.locked_by,
        });
    }
    Ok(())
}

/// Applies the database stage of a swap in one transaction.
///
/// # Returns
///
/// The ledger rows written for the filesystem stage, in replay order.
///
/// # Errors
///
/// Returns an error if either record is missing, a target identifier is
/// held by a third record, another user is editing either record, or any
/// statement fails. Nothing is changed
/// when an error is returned.
pub fn apply_identifier_swap(
    conn: &mut SqliteConnection,
    plan: &SwapPlan,
) -> Result<Vec<PendingFileMove>, PersistenceError> {
    conn.immediate_transaction(|conn| {
        let first: String = plan.first.to_string();
        let second: String = plan.second.to_string();
        let placeholder: String = plan.first.placeholder();

        for id in [&first, &second] {
            if !employee_exists(conn, id)? {
                return Err(PersistenceError::EmployeeNotFound(id.clone()));
            }
        }
        let now: String = clock::now()?;
        for id in [&first, &second] {
            ensure_not_locked_by_others(conn, id, &plan.actor, &now)?;
        }
        ensure_target_free(conn, &plan.new_first, plan)?;
        ensure_target_free(conn, &plan.new_second, plan)?;
        if employee_exists(conn, &placeholder)? {
            return Err(PersistenceError::DuplicateEmployee(placeholder));
        }

        info!(
            swap_id = %plan.swap_id,
            "Swapping identifiers {} and {} to {} and {}",
            first, second, plan.new_first, plan.new_second
        );

        rename_identifier(conn, &first, &placeholder)?;
        rename_identifier(conn, &second, &plan.new_second.to_string())?;
        rename_identifier(conn, &placeholder, &plan.new_first.to_string())?;

        // Only the actor's own and expired locks remain on the pair.
        diesel::delete(edit_locks::table.filter(edit_locks::emp_id.eq_any([&first, &second])))
            .execute(conn)?;

        let step_count: i32 = i32::try_from(plan.moves.len())
            .map_err(|_| PersistenceError::Other(String::from("Swap plan has too many steps")))?;
        for (step_no, planned) in (1_i32..).zip(&plan.moves) {
            diesel::insert_into(pending_file_moves::table)
                .values((
                    pending_file_moves::swap_id.eq(&plan.swap_id),
                    pending_file_moves::step_no.eq(step_no),
                    pending_file_moves::step_count.eq(step_count),
                    pending_file_moves::from_path.eq(planned.from_path.to_string_lossy().into_owned()),
                    pending_file_moves::to_path.eq(planned.to_path.to_string_lossy().into_owned()),
                ))
                .execute(conn)?;
        }

        Ok(list_pending_moves(conn)?
            .into_iter()
            .filter(|m| m.swap_id == plan.swap_id)
            .collect())
    })
}

/// Removes a ledger row once its rename has been carried out.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn complete_file_move(
    conn: &mut SqliteConnection,
    move_id: i64,
) -> Result<(), PersistenceError> {
    diesel::delete(pending_file_moves::table.filter(pending_file_moves::id.eq(move_id)))
        .execute(conn)?;
    Ok(())
}
