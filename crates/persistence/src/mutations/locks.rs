// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Advisory edit lock mutations.
//!
//! Locks tell concurrent operators who is editing a record. They expire
//! after [`LOCK_DURATION`] so a crashed client never blocks a record for
//! long.

use diesel::prelude::*;
use diesel::SqliteConnection;
use time::Duration;
use tracing::{debug, info};

use crate::clock;
use crate::data_models::EditLockData;
use crate::diesel_schema::edit_locks;
use crate::error::PersistenceError;
use crate::queries::locks::get_edit_lock;

/// How long an edit lock stays valid without a refresh.
pub const LOCK_DURATION: Duration = Duration::minutes(30);

/// Takes or renews the edit lock on a record.
///
/// # Errors
///
/// Returns `EditLockHeld` if another user holds a live lock.
pub fn acquire_edit_lock(
    conn: &mut SqliteConnection,
    emp_id: &str,
    username: &str,
) -> Result<EditLockData, PersistenceError> {
    conn.immediate_transaction(|conn| {
        let now: String = clock::now()?;
        if let Some(existing) = get_edit_lock(conn, emp_id)?
            && existing.locked_by != username
            && existing.expires_at > now
        {
            return Err(PersistenceError::EditLockHeld {
                emp_id: emp_id.to_string(),
                holder: existing.locked_by,
            });
        }

        let expires_at: String = clock::from_now(LOCK_DURATION)?;
        diesel::insert_into(edit_locks::table)
            .values((
                edit_locks::emp_id.eq(emp_id),
                edit_locks::locked_by.eq(username),
                edit_locks::locked_at.eq(&now),
                edit_locks::expires_at.eq(&expires_at),
            ))
            .on_conflict(edit_locks::emp_id)
            .do_update()
            .set((
                edit_locks::locked_by.eq(username),
                edit_locks::locked_at.eq(&now),
                edit_locks::expires_at.eq(&expires_at),
            ))
            .execute(conn)?;

        debug!("Edit lock on {} held by {} until {}", emp_id, username, expires_at);
        Ok(EditLockData {
            emp_id: emp_id.to_string(),
            locked_by: username.to_string(),
            locked_at: now,
            expires_at,
        })
    })
}

/// Releases a lock held by `username`.
///
/// # Returns
///
/// `true` if a lock was released.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn release_edit_lock(
    conn: &mut SqliteConnection,
    emp_id: &str,
    username: &str,
) -> Result<bool, PersistenceError> {
    let removed: usize = diesel::delete(
        edit_locks::table
            .filter(edit_locks::emp_id.eq(emp_id))
            .filter(edit_locks::locked_by.eq(username)),
    )
    .execute(conn)?;
    Ok(removed > 0)
}

/// Extends a lock held by `username`.
///
/// # Returns
///
/// `true` if a lock was extended.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn refresh_edit_lock(
    conn: &mut SqliteConnection,
    emp_id: &str,
    username: &str,
) -> Result<bool, PersistenceError> {
    let expires_at: String = clock::from_now(LOCK_DURATION)?;
    let updated: usize = diesel::update(
        edit_locks::table
            .filter(edit_locks::emp_id.eq(emp_id))
            .filter(edit_locks::locked_by.eq(username)),
    )
    .set(edit_locks::expires_at.eq(&expires_at))
    .execute(conn)?;
    Ok(updated > 0)
}

/// Removes every expired lock.
///
/// # Returns
///
/// The number of locks removed.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn cleanup_expired_locks(conn: &mut SqliteConnection) -> Result<usize, PersistenceError> {
    let now: String = clock::now()?;
    let removed: usize =
        diesel::delete(edit_locks::table.filter(edit_locks::expires_at.le(&now))).execute(conn)?;
    if removed > 0 {
        info!("Removed {} expired edit locks", removed);
    }
    Ok(removed)
}
