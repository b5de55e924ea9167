// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Capability checks for acting users.

use emp_vault_audit::{Actor, AuditEntry};
use emp_vault_domain::{Capability, Role};
use emp_vault_persistence::{Persistence, PersistenceError};
use tracing::{debug, error, warn};

use crate::error::StoreError;

/// Where the gate reads roles and capability grants from.
pub trait CapabilitySource {
    /// Returns the role of `username`, or `None` for an unknown user.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn role_of(&mut self, username: &str) -> Result<Option<Role>, PersistenceError>;

    /// Returns the per-user override for `capability`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn user_override(
        &mut self,
        username: &str,
        capability: Capability,
    ) -> Result<Option<bool>, PersistenceError>;

    /// Returns the role grant for `capability`, if a row exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    fn role_default(
        &mut self,
        role: Role,
        capability: Capability,
    ) -> Result<Option<bool>, PersistenceError>;

    /// Appends the audit row for a denial.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    fn record_denial(&mut self, entry: &AuditEntry) -> Result<(), PersistenceError>;
}

impl CapabilitySource for Persistence {
    fn role_of(&mut self, username: &str) -> Result<Option<Role>, PersistenceError> {
        Ok(self.get_user(username)?.map(|user| user.role))
    }

    fn user_override(
        &mut self,
        username: &str,
        capability: Capability,
    ) -> Result<Option<bool>, PersistenceError> {
        self.user_capability(username, capability)
    }

    fn role_default(
        &mut self,
        role: Role,
        capability: Capability,
    ) -> Result<Option<bool>, PersistenceError> {
        self.role_capability(role, capability)
    }

    fn record_denial(&mut self, entry: &AuditEntry) -> Result<(), PersistenceError> {
        self.append_audit_entry(entry).map(|_| ())
    }
}

/// A user who passed a capability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedActor {
    /// The audit identity of the user.
    pub actor: Actor,
    /// The role the user held when authorized.
    pub role: Role,
}

impl AuthorizedActor {
    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.actor.username
    }
}

/// Authorization service for capability-based access control.
///
/// Resolution order:
///
/// 1. Unknown users are denied.
/// 2. Admins are authorized for everything.
/// 3. A per-user override decides if one exists.
/// 4. Otherwise the role grant decides; a missing grant is a denial.
pub struct PermissionGate;

impl PermissionGate {
    /// Checks whether `username` holds `capability`.
    ///
    /// A denial is logged and recorded as a `PERMISSION_DENIED` audit row.
    /// If that row cannot be written, the failure is logged and the denial
    /// is returned unchanged.
    ///
    /// # Arguments
    ///
    /// * `source` - Where roles and grants are read from
    /// * `username` - The acting user
    /// * `capability` - The capability required
    ///
    /// # Errors
    ///
    /// Returns `Denied` if the user lacks the capability, or a storage error
    /// if the lookup itself fails.
    pub fn authorize<S: CapabilitySource + ?Sized>(
        source: &mut S,
        username: &str,
        capability: Capability,
    ) -> Result<AuthorizedActor, StoreError> {
        let Some(role) = source.role_of(username)? else {
            return Err(Self::deny(
                source,
                username,
                capability,
                None,
                format!("unknown user '{username}'"),
            ));
        };

        if role.is_admin() {
            debug!(actor = %username, capability = %capability, "Admin authorized");
            return Ok(Self::authorized(username, role));
        }

        let allowed: bool = match source.user_override(username, capability)? {
            Some(allowed) => allowed,
            None => source.role_default(role, capability)?.unwrap_or(false),
        };

        if allowed {
            Ok(Self::authorized(username, role))
        } else {
            Err(Self::deny(
                source,
                username,
                capability,
                Some(role),
                format!("'{username}' ({role}) lacks '{capability}'"),
            ))
        }
    }

    /// Checks every capability in `capabilities`, stopping at the first
    /// denial.
    ///
    /// # Errors
    ///
    /// Returns the first denial or lookup failure.
    pub fn authorize_all<S: CapabilitySource + ?Sized>(
        source: &mut S,
        username: &str,
        capabilities: &[Capability],
    ) -> Result<AuthorizedActor, StoreError> {
        let mut authorized: Option<AuthorizedActor> = None;
        for capability in capabilities {
            authorized = Some(Self::authorize(source, username, *capability)?);
        }
        authorized.ok_or_else(|| StoreError::Denied(String::from("no capability requested")))
    }

    fn authorized(username: &str, role: Role) -> AuthorizedActor {
        AuthorizedActor {
            actor: Actor::new(username.to_string()),
            role,
        }
    }

    fn deny<S: CapabilitySource + ?Sized>(
        source: &mut S,
        username: &str,
        capability: Capability,
        role: Option<Role>,
        reason: String,
    ) -> StoreError {
        warn!(actor = %username, capability = %capability, "Permission denied");

        let entry: AuditEntry =
            AuditEntry::for_denial(Actor::new(username.to_string()), capability.as_str(), role);
        if let Err(err) = source.record_denial(&entry) {
            error!(
                actor = %username,
                capability = %capability,
                "Failed to record permission denial: {}", err
            );
        }

        StoreError::Denied(reason)
    }
}
