// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::{Actor, AuditAction, AuditEntry};
use emp_vault_domain::{EmployeeId, Role};

fn id(value: &str) -> EmployeeId {
    value.parse().unwrap()
}

#[test]
fn test_actor_creation() {
    let actor: Actor = Actor::new(String::from("alice"));
    assert_eq!(actor.username, "alice");
    assert_eq!(Actor::system().username, "system");
}

#[test]
fn test_action_strings_are_stable() {
    assert_eq!(AuditAction::SwapEmpId.as_str(), "SWAP_EMP_ID");
    assert_eq!(AuditAction::PermissionDenied.as_str(), "PERMISSION_DENIED");
    assert_eq!(AuditAction::Archived.to_string(), "ARCHIVED");
}

#[test]
fn test_employee_entry_records_table_and_id() {
    let entry: AuditEntry = AuditEntry::for_employee(
        Actor::new(String::from("alice")),
        AuditAction::Added,
        &id("O-002-05"),
    );

    assert_eq!(entry.table_name.as_deref(), Some("employees"));
    assert_eq!(entry.record_id.as_deref(), Some("O-002-05"));
    assert_eq!(entry.old_value, None);
}

#[test]
fn test_swap_entry_lists_both_identifiers() {
    let entry: AuditEntry = AuditEntry::for_swap(
        Actor::new(String::from("admin")),
        (&id("O-002-05"), &id("O-003-04")),
        (&id("O-003-05"), &id("O-002-04")),
    );

    assert_eq!(entry.action, AuditAction::SwapEmpId);
    assert_eq!(entry.record_id.as_deref(), Some("O-002-05,O-003-04"));
    assert_eq!(entry.old_value.as_deref(), Some("O-002-05,O-003-04"));
    assert_eq!(entry.new_value.as_deref(), Some("O-003-05,O-002-04"));
    assert_eq!(
        entry.details.as_deref(),
        Some("Swapped IDs: O-002-05\u{2194}O-003-04 \u{2192} O-003-05\u{2194}O-002-04")
    );
}

#[test]
fn test_denial_entry_names_capability_and_role() {
    let entry: AuditEntry = AuditEntry::for_denial(
        Actor::new(String::from("bob")),
        "delete_employee",
        Some(Role::User),
    );
    assert_eq!(entry.action, AuditAction::PermissionDenied);
    assert_eq!(
        entry.details.as_deref(),
        Some("Attempted 'delete_employee' with role user")
    );

    let unknown: AuditEntry =
        AuditEntry::for_denial(Actor::new(String::from("ghost")), "add_employee", None);
    assert!(unknown.details.unwrap().contains("unknown"));
}

#[test]
fn test_action_lookup_by_name() {
    for action in AuditAction::ALL {
        assert_eq!(AuditAction::from_name(action.as_str()), Some(action));
    }
    assert_eq!(AuditAction::from_name("LOGIN"), None);
}
