// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! User and capability mutations.
//!
//! The store never ends up without an admin: demoting or deleting the last
//! admin is rejected inside the same transaction that would perform it.

use diesel::prelude::*;
use diesel::SqliteConnection;
use emp_vault_audit::{Actor, AuditAction, AuditEntry};
use emp_vault_domain::{Capability, Role};
use tracing::{info, warn};

use crate::data_models::UserData;
use crate::diesel_schema::{role_capabilities, user_capabilities, users};
use crate::error::PersistenceError;
use crate::mutations::audit::insert_audit_entry;
use crate::queries::users::{count_admins, count_users, get_user};

/// Username seeded by [`bootstrap_admin`].
pub const BOOTSTRAP_ADMIN: &str = "admin";

/// Hashes a PIN for storage.
///
/// bcrypt is deliberately slow, so callers hash before opening the write
/// transaction that stores the result.
///
/// # Errors
///
/// Returns an error if hashing fails.
pub fn hash_pin(pin: &str) -> Result<String, PersistenceError> {
    bcrypt::hash(pin, bcrypt::DEFAULT_COST)
        .map_err(|e| PersistenceError::Other(format!("Failed to hash PIN: {e}")))
}

fn insert_user_row(
    conn: &mut SqliteConnection,
    username: &str,
    display_name: &str,
    pin_hash: &str,
    role: Role,
) -> Result<(), PersistenceError> {
    diesel::insert_into(users::table)
        .values((
            users::username.eq(username),
            users::display_name.eq(display_name),
            users::role.eq(role.as_str()),
            users::pin_hash.eq(pin_hash),
        ))
        .execute(conn)?;
    Ok(())
}

fn require_user(conn: &mut SqliteConnection, username: &str) -> Result<UserData, PersistenceError> {
    get_user(conn, username)?.ok_or_else(|| PersistenceError::UserNotFound(username.to_string()))
}

/// Seeds the default admin when the store has no users at all.
///
/// # Returns
///
/// `true` if the admin was created.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn bootstrap_admin(
    conn: &mut SqliteConnection,
    pin_hash: &str,
) -> Result<bool, PersistenceError> {
    conn.immediate_transaction(|conn| {
        if count_users(conn)? > 0 {
            return Ok(false);
        }

        warn!("No users found; creating default admin account");
        insert_user_row(conn, BOOTSTRAP_ADMIN, "Administrator", pin_hash, Role::Admin)?;

        insert_audit_entry(
            conn,
            &AuditEntry::new(Actor::system(), AuditAction::UserCreated)
                .with_table("users")
                .with_record(BOOTSTRAP_ADMIN.to_string())
                .with_details(String::from("Created default admin account")),
        )?;
        Ok(true)
    })
}

/// Creates a user.
///
/// # Arguments
///
/// * `conn` - The database connection
/// * `username` - The unique username
/// * `display_name` - The display name
/// * `pin_hash` - The PIN hashed with [`hash_pin`]
/// * `role` - The role
/// * `actor` - The acting user
///
/// # Errors
///
/// Returns an error if the username already exists or the insert fails.
pub fn create_user(
    conn: &mut SqliteConnection,
    username: &str,
    display_name: &str,
    pin_hash: &str,
    role: Role,
    actor: &Actor,
) -> Result<(), PersistenceError> {
    conn.immediate_transaction(|conn| {
        if get_user(conn, username)?.is_some() {
            return Err(PersistenceError::DuplicateUser(username.to_string()));
        }

        info!(
            "Creating user with username: {}, display_name: {}, role: {}",
            username, display_name, role
        );
        insert_user_row(conn, username, display_name, pin_hash, role)?;

        insert_audit_entry(
            conn,
            &AuditEntry::new(actor.clone(), AuditAction::UserCreated)
                .with_table("users")
                .with_record(username.to_string())
                .with_values(None, Some(role.to_string()))
                .with_details(format!("Created user {username} with role {role}")),
        )?;
        Ok(())
    })
}

/// Changes the role of a user.
///
/// # Errors
///
/// Returns an error if the user does not exist, the change would demote
/// the last admin, or the update fails.
pub fn change_role(
    conn: &mut SqliteConnection,
    username: &str,
    role: Role,
    actor: &Actor,
) -> Result<(), PersistenceError> {
    conn.immediate_transaction(|conn| {
        let user: UserData = require_user(conn, username)?;
        if user.role.is_admin() && !role.is_admin() && count_admins(conn)? <= 1 {
            return Err(PersistenceError::LastAdmin(username.to_string()));
        }

        info!("Changing role of {} from {} to {}", username, user.role, role);

        diesel::update(users::table)
            .filter(users::username.eq(username))
            .set(users::role.eq(role.as_str()))
            .execute(conn)?;

        insert_audit_entry(
            conn,
            &AuditEntry::new(actor.clone(), AuditAction::UserRoleChanged)
                .with_table("users")
                .with_record(username.to_string())
                .with_values(Some(user.role.to_string()), Some(role.to_string())),
        )?;
        Ok(())
    })
}

/// Deletes a user.
///
/// # Errors
///
/// Returns an error if the user does not exist, is the last admin, or the
/// delete fails.
pub fn delete_user(
    conn: &mut SqliteConnection,
    username: &str,
    actor: &Actor,
) -> Result<(), PersistenceError> {
    conn.immediate_transaction(|conn| {
        let user: UserData = require_user(conn, username)?;
        if user.role.is_admin() && count_admins(conn)? <= 1 {
            return Err(PersistenceError::LastAdmin(username.to_string()));
        }

        info!("Deleting user: {}", username);

        diesel::delete(users::table.filter(users::username.eq(username))).execute(conn)?;

        insert_audit_entry(
            conn,
            &AuditEntry::new(actor.clone(), AuditAction::UserDeleted)
                .with_table("users")
                .with_record(username.to_string())
                .with_values(Some(user.role.to_string()), None),
        )?;
        Ok(())
    })
}

/// Sets a capability for every user holding `role`.
///
/// # Errors
///
/// Returns an error if the upsert fails.
pub fn set_role_capability(
    conn: &mut SqliteConnection,
    role: Role,
    capability: Capability,
    allowed: bool,
    actor: &Actor,
) -> Result<(), PersistenceError> {
    conn.immediate_transaction(|conn| {
        info!("Setting {} for role {} to {}", capability, role, allowed);

        diesel::insert_into(role_capabilities::table)
            .values((
                role_capabilities::role.eq(role.as_str()),
                role_capabilities::capability.eq(capability.as_str()),
                role_capabilities::allowed.eq(i32::from(allowed)),
            ))
            .on_conflict((role_capabilities::role, role_capabilities::capability))
            .do_update()
            .set(role_capabilities::allowed.eq(i32::from(allowed)))
            .execute(conn)?;

        insert_audit_entry(
            conn,
            &AuditEntry::new(actor.clone(), AuditAction::CapabilityChanged)
                .with_table("role_capabilities")
                .with_record(role.to_string())
                .with_details(format!("role {role}: {capability} = {allowed}")),
        )?;
        Ok(())
    })
}

/// Sets a per-user capability override.
///
/// # Errors
///
/// Returns an error if the user does not exist or the upsert fails.
pub fn set_user_capability(
    conn: &mut SqliteConnection,
    username: &str,
    capability: Capability,
    allowed: bool,
    actor: &Actor,
) -> Result<(), PersistenceError> {
    conn.immediate_transaction(|conn| {
        require_user(conn, username)?;

        info!("Setting {} for user {} to {}", capability, username, allowed);

        diesel::insert_into(user_capabilities::table)
            .values((
                user_capabilities::username.eq(username),
                user_capabilities::capability.eq(capability.as_str()),
                user_capabilities::allowed.eq(i32::from(allowed)),
            ))
            .on_conflict((user_capabilities::username, user_capabilities::capability))
            .do_update()
            .set(user_capabilities::allowed.eq(i32::from(allowed)))
            .execute(conn)?;

        insert_audit_entry(
            conn,
            &AuditEntry::new(actor.clone(), AuditAction::CapabilityChanged)
                .with_table("user_capabilities")
                .with_record(username.to_string())
                .with_details(format!("user {username}: {capability} = {allowed}")),
        )?;
        Ok(())
    })
}
