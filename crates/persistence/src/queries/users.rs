// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! User and capability queries.

use diesel::prelude::*;
use diesel::SqliteConnection;
use emp_vault_domain::{Capability, Role};
use tracing::{debug, warn};

use crate::data_models::UserData;
use crate::diesel_schema::{role_capabilities, user_capabilities, users};
use crate::error::PersistenceError;

/// Diesel Queryable struct for user rows.
#[derive(Queryable, Selectable)]
#[diesel(table_name = users)]
struct UserRow {
    username: String,
    display_name: String,
    role: String,
    pin_hash: String,
    created_at: String,
}

impl UserRow {
    fn into_user(self) -> Result<UserData, PersistenceError> {
        let role: Role = self
            .role
            .parse()
            .map_err(|e| PersistenceError::SerializationError(format!("{e}")))?;
        Ok(UserData {
            username: self.username,
            display_name: self.display_name,
            role,
            created_at: self.created_at,
        })
    }
}

fn find_user_row(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<UserRow>, PersistenceError> {
    let result: Result<UserRow, diesel::result::Error> = users::table
        .filter(users::username.eq(username))
        .select(UserRow::as_select())
        .first(conn);

    match result {
        Ok(row) => Ok(Some(row)),
        Err(diesel::result::Error::NotFound) => Ok(None),
        Err(e) => Err(PersistenceError::from(e)),
    }
}

/// Retrieves a user by username.
///
/// # Errors
///
/// Returns an error if the database query fails.
/// Returns `Ok(None)` if the user is not found.
pub fn get_user(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<UserData>, PersistenceError> {
    debug!("Looking up user: {}", username);
    find_user_row(conn, username)?
        .map(UserRow::into_user)
        .transpose()
}

/// Lists all users ordered by username.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn list_users(conn: &mut SqliteConnection) -> Result<Vec<UserData>, PersistenceError> {
    users::table
        .select(UserRow::as_select())
        .order(users::username.asc())
        .load::<UserRow>(conn)?
        .into_iter()
        .map(UserRow::into_user)
        .collect()
}

/// Counts all users.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_users(conn: &mut SqliteConnection) -> Result<i64, PersistenceError> {
    Ok(users::table.count().get_result(conn)?)
}

/// Counts users holding the admin role.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn count_admins(conn: &mut SqliteConnection) -> Result<i64, PersistenceError> {
    Ok(users::table
        .filter(users::role.eq(Role::Admin.as_str()))
        .count()
        .get_result(conn)?)
}

/// Checks a PIN against the stored bcrypt hash.
///
/// Unknown users never verify.
///
/// # Errors
///
/// Returns an error if the database query fails or the stored hash is
/// unreadable.
pub fn verify_pin(
    conn: &mut SqliteConnection,
    username: &str,
    pin: &str,
) -> Result<bool, PersistenceError> {
    let Some(row) = find_user_row(conn, username)? else {
        warn!("PIN verification for unknown user: {}", username);
        return Ok(false);
    };
    bcrypt::verify(pin, &row.pin_hash)
        .map_err(|e| PersistenceError::Other(format!("Failed to verify PIN: {e}")))
}

/// Returns the role-level setting for a capability, if one is stored.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn role_capability(
    conn: &mut SqliteConnection,
    role: Role,
    capability: Capability,
) -> Result<Option<bool>, PersistenceError> {
    let allowed: Option<i32> = role_capabilities::table
        .filter(role_capabilities::role.eq(role.as_str()))
        .filter(role_capabilities::capability.eq(capability.as_str()))
        .select(role_capabilities::allowed)
        .first(conn)
        .optional()?;
    Ok(allowed.map(|v| v != 0))
}

/// Returns the per-user override for a capability, if one is stored.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn user_capability(
    conn: &mut SqliteConnection,
    username: &str,
    capability: Capability,
) -> Result<Option<bool>, PersistenceError> {
    let allowed: Option<i32> = user_capabilities::table
        .filter(user_capabilities::username.eq(username))
        .filter(user_capabilities::capability.eq(capability.as_str()))
        .select(user_capabilities::allowed)
        .first(conn)
        .optional()?;
    Ok(allowed.map(|v| v != 0))
}
