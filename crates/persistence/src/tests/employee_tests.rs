// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Employee and attachment mutation tests.

use emp_vault_audit::AuditAction;
use emp_vault_domain::EmployeeDetails;
use time::macros::date;

use super::{create_test_actor, id, seeded};
use crate::{AuditFilter, Persistence, PersistenceError};

#[test]
fn test_insert_and_get_round_trips_attributes() {
    let mut persistence = Persistence::new_in_memory().unwrap();
    let details = EmployeeDetails {
        email: Some(String::from("alice@example.com")),
        department: Some(String::from("Operations")),
        hire_date: Some(date!(2024 - 03 - 01)),
        contract_months: Some(6),
        sss_number: Some(String::from("34-1234567-8")),
        ..EmployeeDetails::named("Alice")
    };

    persistence
        .insert_employee(&id("O-002-05"), &details, &create_test_actor())
        .unwrap();

    let stored = persistence.get_employee(&id("O-002-05")).unwrap().unwrap();
    assert_eq!(stored.details, details);
    assert_eq!(stored.modified_by, "test-actor");
    assert!(!stored.is_archived());
}

#[test]
fn test_get_missing_employee_returns_none() {
    let mut persistence = Persistence::new_in_memory().unwrap();
    assert!(persistence.get_employee(&id("A-001-24")).unwrap().is_none());
}

#[test]
fn test_insert_writes_added_audit_row() {
    let mut persistence = seeded(&["A-001-24"]);

    let history = persistence.record_history("A-001-24").unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].entry.action, AuditAction::Added);
    assert_eq!(history[0].entry.actor.username, "test-actor");
    assert_eq!(
        history[0].entry.details.as_deref(),
        Some("Added employee: Employee A-001-24")
    );
}

#[test]
fn test_duplicate_identifier_rejected_even_when_archived() {
    let mut persistence = seeded(&["A-001-24"]);
    let actor = create_test_actor();
    persistence
        .archive_employee(&id("A-001-24"), &actor, None)
        .unwrap();

    let result = persistence.insert_employee(&id("A-001-24"), &EmployeeDetails::named("Other"), &actor);
    assert_eq!(
        result,
        Err(PersistenceError::DuplicateEmployee(String::from("A-001-24")))
    );
}

#[test]
fn test_update_records_old_and_new_values() {
    let mut persistence = seeded(&["A-001-24"]);
    let updated = EmployeeDetails {
        position: Some(String::from("Lead")),
        ..EmployeeDetails::named("Renamed")
    };

    persistence
        .update_employee(&id("A-001-24"), &updated, &create_test_actor())
        .unwrap();

    let stored = persistence.get_employee(&id("A-001-24")).unwrap().unwrap();
    assert_eq!(stored.details.name, "Renamed");

    let edits = persistence
        .get_audit_log(&AuditFilter {
            action: Some(String::from("EDITED")),
            ..AuditFilter::latest(10)
        })
        .unwrap();
    assert_eq!(edits.len(), 1);
    assert!(edits[0].entry.old_value.as_deref().unwrap().contains("Employee A-001-24"));
    assert!(edits[0].entry.new_value.as_deref().unwrap().contains("Renamed"));
}

#[test]
fn test_update_missing_employee_fails() {
    let mut persistence = Persistence::new_in_memory().unwrap();
    let result = persistence.update_employee(
        &id("A-001-24"),
        &EmployeeDetails::named("Ghost"),
        &create_test_actor(),
    );
    assert!(matches!(result, Err(PersistenceError::EmployeeNotFound(_))));
}

#[test]
fn test_archive_hides_from_default_listing_and_keeps_row() {
    let mut persistence = seeded(&["A-001-24", "A-002-24"]);

    let archived = persistence
        .archive_employee(&id("A-001-24"), &create_test_actor(), Some("Resigned"))
        .unwrap();
    assert!(archived);

    let active = persistence.list_employees(false).unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, id("A-002-24"));

    let all = persistence.list_employees(true).unwrap();
    assert_eq!(all.len(), 2);

    let marker = persistence
        .get_employee(&id("A-001-24"))
        .unwrap()
        .unwrap()
        .archived
        .unwrap();
    assert_eq!(marker.archived_by, "test-actor");
    assert_eq!(marker.reason.as_deref(), Some("Resigned"));
}

#[test]
fn test_archive_twice_is_a_no_op() {
    let mut persistence = seeded(&["A-001-24"]);
    let actor = create_test_actor();

    assert!(persistence.archive_employee(&id("A-001-24"), &actor, None).unwrap());
    assert!(!persistence.archive_employee(&id("A-001-24"), &actor, None).unwrap());

    let archives = persistence
        .get_audit_log(&AuditFilter {
            action: Some(String::from("ARCHIVED")),
            ..AuditFilter::latest(10)
        })
        .unwrap();
    assert_eq!(archives.len(), 1);
    assert_eq!(
        archives[0].entry.details.as_deref(),
        Some("Archived employee: Employee A-001-24 - Reason: None specified")
    );
}

#[test]
fn test_restore_requires_archived_record() {
    let mut persistence = seeded(&["A-001-24"]);
    let actor = create_test_actor();

    let result = persistence.restore_employee(&id("A-001-24"), &actor);
    assert!(matches!(result, Err(PersistenceError::NotArchived(_))));

    persistence.archive_employee(&id("A-001-24"), &actor, None).unwrap();
    persistence.restore_employee(&id("A-001-24"), &actor).unwrap();

    let stored = persistence.get_employee(&id("A-001-24")).unwrap().unwrap();
    assert!(!stored.is_archived());
}

#[test]
fn test_purge_requires_archived_record_and_cascades_attachments() {
    let mut persistence = seeded(&["A-001-24"]);
    let actor = create_test_actor();
    persistence
        .insert_attachment(&id("A-001-24"), "contract.pdf", &actor)
        .unwrap();

    let result = persistence.purge_employee(&id("A-001-24"), &actor);
    assert!(matches!(result, Err(PersistenceError::NotArchived(_))));

    persistence.archive_employee(&id("A-001-24"), &actor, None).unwrap();
    let removed = persistence.purge_employee(&id("A-001-24"), &actor).unwrap();
    assert_eq!(removed.id, id("A-001-24"));

    assert!(persistence.get_employee(&id("A-001-24")).unwrap().is_none());
    assert!(persistence.list_attachments(&id("A-001-24")).unwrap().is_empty());

    let history = persistence.record_history("A-001-24").unwrap();
    assert_eq!(
        history.last().unwrap().entry.action,
        AuditAction::PermanentlyDeleted
    );
}

#[test]
fn test_attachment_names_unique_per_employee() {
    let mut persistence = seeded(&["A-001-24", "A-002-24"]);
    let actor = create_test_actor();

    persistence.insert_attachment(&id("A-001-24"), "cv.pdf", &actor).unwrap();
    persistence.insert_attachment(&id("A-002-24"), "cv.pdf", &actor).unwrap();

    let result = persistence.insert_attachment(&id("A-001-24"), "cv.pdf", &actor);
    assert!(matches!(
        result,
        Err(PersistenceError::DuplicateAttachment { .. })
    ));
}

#[test]
fn test_attachment_for_missing_employee_rejected() {
    let mut persistence = Persistence::new_in_memory().unwrap();
    let result = persistence.insert_attachment(&id("A-001-24"), "cv.pdf", &create_test_actor());
    assert!(matches!(result, Err(PersistenceError::EmployeeNotFound(_))));
}

#[test]
fn test_delete_attachment_returns_row() {
    let mut persistence = seeded(&["A-001-24"]);
    let actor = create_test_actor();
    let attachment_id = persistence
        .insert_attachment(&id("A-001-24"), "cv.pdf", &actor)
        .unwrap();

    let removed = persistence.delete_attachment(attachment_id, &actor).unwrap();
    assert_eq!(removed.file_name, "cv.pdf");
    assert!(persistence.list_attachments(&id("A-001-24")).unwrap().is_empty());

    let again = persistence.delete_attachment(attachment_id, &actor);
    assert_eq!(again, Err(PersistenceError::AttachmentNotFound(attachment_id)));
}

#[test]
fn test_audit_log_filters_by_user() {
    let mut persistence = seeded(&["A-001-24"]);
    persistence
        .archive_employee(&id("A-001-24"), &emp_vault_audit::Actor::new(String::from("bob")), None)
        .unwrap();

    let bobs = persistence
        .get_audit_log(&AuditFilter {
            username: Some(String::from("bob")),
            ..AuditFilter::latest(10)
        })
        .unwrap();
    assert_eq!(bobs.len(), 1);
    assert_eq!(bobs[0].entry.action, AuditAction::Archived);

    let limited = persistence.get_audit_log(&AuditFilter::latest(1)).unwrap();
    assert_eq!(limited.len(), 1);
}

#[test]
fn test_audit_log_rejects_deletes() {
    use diesel::RunQueryDsl;

    let mut persistence = seeded(&["A-001-24"]);
    let result = diesel::sql_query("DELETE FROM audit_log").execute(&mut persistence.conn);
    assert!(result.is_err());
    assert_eq!(persistence.count_audit_entries().unwrap(), 1);
}
