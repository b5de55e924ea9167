// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Identifier swap tests.

use emp_vault_audit::AuditAction;
use emp_vault_domain::{EmployeeDetails, Role};
use emp_vault_persistence::{PendingFileMove, Persistence, PersistenceError};
use proptest::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::{ADMIN, ADMIN_PIN, add_employee, create_user, open_store, snapshot, test_config};
use crate::swap::run_file_stage;
use crate::{IdentifierSwapTransaction, RecordStore, StoreError, SwapState};

/// Every path under `root`, relative and sorted.
fn tree(root: &Path) -> Vec<PathBuf> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) {
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        for entry in entries {
            let path = entry.unwrap().path();
            out.push(path.strip_prefix(root).unwrap().to_path_buf());
            if path.is_dir() {
                walk(root, &path, out);
            }
        }
    }
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}

/// Alice at `O-002-05` and Bob at `O-003-04`, each with a photo and an
/// attachment.
fn alice_and_bob(dir: &Path) -> RecordStore {
    let mut store = open_store(dir);
    add_employee(&mut store, "O-002-05", "Alice");
    add_employee(&mut store, "O-003-04", "Bob");

    let photos_dir = store.config().photos_dir.clone();
    fs::create_dir_all(&photos_dir).unwrap();
    fs::write(photos_dir.join("O-002-05.jpg"), b"alice photo").unwrap();
    fs::write(photos_dir.join("O-003-04.png"), b"bob photo").unwrap();

    let upload = dir.join("upload");
    fs::create_dir_all(&upload).unwrap();
    fs::write(upload.join("alice.pdf"), b"alice file").unwrap();
    fs::write(upload.join("bob.pdf"), b"bob file").unwrap();
    store
        .add_attachment("O-002-05", &upload.join("alice.pdf"), ADMIN)
        .unwrap();
    store
        .add_attachment("O-003-04", &upload.join("bob.pdf"), ADMIN)
        .unwrap();
    store
}

#[test]
fn test_alice_and_bob_swap() {
    let dir = TempDir::new().unwrap();
    let mut store = alice_and_bob(dir.path());
    let photos_dir = store.config().photos_dir.clone();
    let files_dir = store.config().files_dir.clone();

    let report = store.swap_identifiers("002", "O-003-04", ADMIN).unwrap();

    assert_eq!(report.state, SwapState::Committed);
    assert_eq!(report.warning, None);
    assert!(report.audit_recorded);
    assert_eq!(report.files_moved, 6);
    assert_eq!(report.old_ids.0.to_string(), "O-002-05");
    assert_eq!(report.new_ids.0.to_string(), "O-003-05");
    assert_eq!(report.new_ids.1.to_string(), "O-002-04");

    assert_eq!(
        snapshot(&mut store),
        vec![
            (String::from("O-002-04"), String::from("Bob")),
            (String::from("O-003-05"), String::from("Alice")),
        ]
    );

    assert_eq!(
        fs::read(photos_dir.join("O-003-05.jpg")).unwrap(),
        b"alice photo"
    );
    assert_eq!(fs::read(photos_dir.join("O-002-04.png")).unwrap(), b"bob photo");
    assert!(!photos_dir.join("O-002-05.jpg").exists());
    assert!(!photos_dir.join("O-003-04.png").exists());
    assert_eq!(
        fs::read(files_dir.join("O-003-05/files/alice.pdf")).unwrap(),
        b"alice file"
    );
    assert_eq!(
        fs::read(files_dir.join("O-002-04/files/bob.pdf")).unwrap(),
        b"bob file"
    );
    assert!(!files_dir.join("O-002-05").exists());
    assert!(!files_dir.join("TEMP_O-002-05").exists());

    let attachments = store.list_attachments("O-003-05").unwrap();
    assert_eq!(attachments[0].file_name, "alice.pdf");

    let history = store.employee_history("O-003-05").unwrap();
    assert_eq!(history[0].entry.action, AuditAction::Added);
    assert_eq!(
        history[0].entry.details.as_deref(),
        Some("Added employee: Alice")
    );

    let latest = store.audit_trail(1, ADMIN).unwrap();
    let entry = &latest[0].entry;
    assert_eq!(entry.action, AuditAction::SwapEmpId);
    assert_eq!(entry.record_id.as_deref(), Some("O-002-05,O-003-04"));
    assert_eq!(entry.new_value.as_deref(), Some("O-003-05,O-002-04"));

    assert!(store.persistence_mut().list_pending_moves().unwrap().is_empty());
    assert!(store.health_check().unwrap().healthy);
}

#[test]
fn test_unknown_sequence_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let mut store = alice_and_bob(dir.path());
    let before = snapshot(&mut store);
    let files_before = tree(dir.path());
    let audit_before = store.persistence_mut().count_audit_entries().unwrap();

    let result = store.swap_identifiers("999", "O-003-04", ADMIN);

    assert!(matches!(result, Err(StoreError::ValidationError(_))));
    assert_eq!(snapshot(&mut store), before);
    assert_eq!(tree(dir.path()), files_before);
    assert_eq!(
        store.persistence_mut().count_audit_entries().unwrap(),
        audit_before
    );
}

#[test]
fn test_malformed_token_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let mut store = alice_and_bob(dir.path());
    let before = snapshot(&mut store);
    let files_before = tree(dir.path());

    for token in ["O-2-5", "", "0002", "OO-002-05", "002-05"] {
        let result = store.swap_identifiers(token, "O-003-04", ADMIN);
        assert!(
            matches!(result, Err(StoreError::ValidationError(_))),
            "{token:?} gave {result:?}"
        );
    }

    assert_eq!(snapshot(&mut store), before);
    assert_eq!(tree(dir.path()), files_before);
}

#[test]
fn test_rejects_ambiguous_same_and_colliding() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(dir.path());
    add_employee(&mut store, "A-001-24", "Alice");
    add_employee(&mut store, "B-001-23", "Bob");
    add_employee(&mut store, "C-002-24", "Carol");
    add_employee(&mut store, "A-002-24", "Dave");
    let before = snapshot(&mut store);

    let cases = [
        ("001", "C-002-24"),
        ("C-002-24", "c-002-24"),
        ("A-001-24", "B-001-23"),
        // A-001-24 would become A-002-24, which belongs to Dave
        ("A-001-24", "C-002-24"),
    ];
    for (first, second) in cases {
        let result = store.swap_identifiers(first, second, ADMIN);
        assert!(
            matches!(result, Err(StoreError::ValidationError(_))),
            "{first} / {second} gave {result:?}"
        );
    }
    assert_eq!(snapshot(&mut store), before);
}

#[test]
fn test_swap_requires_edit_and_delete() {
    let dir = TempDir::new().unwrap();
    let mut store = alice_and_bob(dir.path());
    create_user(&mut store, "bob", Role::User);
    let before = snapshot(&mut store);

    let result = store.swap_identifiers("002", "003", "bob");

    assert!(matches!(result, Err(StoreError::Denied(_))));
    assert_eq!(snapshot(&mut store), before);
}

#[test]
fn test_swap_refuses_to_overwrite_files() {
    let dir = TempDir::new().unwrap();
    let mut store = alice_and_bob(dir.path());
    let photos_dir = store.config().photos_dir.clone();
    fs::write(photos_dir.join("TEMP_O-002-05.jpg"), b"stray").unwrap();
    let before = snapshot(&mut store);

    let result = store.swap_identifiers("002", "003", ADMIN);

    assert!(matches!(result, Err(StoreError::ValidationError(_))));
    assert_eq!(snapshot(&mut store), before);
    assert!(photos_dir.join("O-002-05.jpg").exists());
}

#[test]
fn test_transaction_states() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    let mut persistence = Persistence::open(&config).unwrap();
    persistence.bootstrap_admin(ADMIN_PIN).unwrap();
    let actor = emp_vault_audit::Actor::new(String::from(ADMIN));
    for (id, name) in [("A-001-24", "Alice"), ("A-002-24", "Bob")] {
        persistence
            .insert_employee(&id.parse().unwrap(), &EmployeeDetails::named(name), &actor)
            .unwrap();
    }

    let mut rejected = IdentifierSwapTransaction::new(&mut persistence, &config);
    assert_eq!(rejected.state(), SwapState::Idle);
    assert!(rejected.execute(ADMIN, "001", "001").is_err());
    assert_eq!(rejected.state(), SwapState::Rejected);

    let mut swap = IdentifierSwapTransaction::new(&mut persistence, &config);
    let report = swap.execute(ADMIN, "001", "002").unwrap();
    assert_eq!(swap.state(), SwapState::Committed);
    assert_eq!(report.new_ids.0.to_string(), "A-002-24");
    assert_eq!(report.new_ids.1.to_string(), "A-001-24");

    let alice = persistence
        .get_employee(&"A-002-24".parse().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(alice.details.name, "Alice");
}

#[cfg(unix)]
#[test]
fn test_file_stage_failure_reports_partial_swap() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(dir.path());
    add_employee(&mut store, "O-002-05", "Alice");
    add_employee(&mut store, "O-003-04", "Bob");

    // The placeholder name of this photo exceeds the 255-byte file name
    // limit, so the first rename fails after the commit.
    let photos_dir = store.config().photos_dir.clone();
    fs::create_dir_all(&photos_dir).unwrap();
    let photo = photos_dir.join(format!("O-002-05.{}", "x".repeat(245)));
    fs::write(&photo, b"alice photo").unwrap();

    let report = store.swap_identifiers("002", "003", ADMIN).unwrap();

    assert_eq!(report.state, SwapState::PartiallyRecovered);
    assert_eq!(report.files_moved, 0);
    assert!(report.audit_recorded);
    match report.warning {
        Some(StoreError::PartialSwap(detail)) => {
            assert!(detail.contains("outstanding"));
            assert!(detail.contains("TEMP_O-002-05"));
        }
        other => panic!("expected PartialSwap, got {other:?}"),
    }

    assert_eq!(store.get_employee("O-003-05").unwrap().details.name, "Alice");
    assert_eq!(store.persistence_mut().list_pending_moves().unwrap().len(), 2);
    assert!(photo.exists());
    let health = store.health_check().unwrap();
    assert!(!health.check("pending_file_moves").unwrap().passed);
}

fn ledger_step(id: i64, from: &Path, to: &Path) -> PendingFileMove {
    PendingFileMove {
        id,
        swap_id: String::from("stage"),
        step_no: i32::try_from(id).unwrap(),
        step_count: 2,
        from_path: from.to_path_buf(),
        to_path: to.to_path_buf(),
    }
}

#[test]
fn test_file_stage_stops_when_ledger_row_not_cleared() {
    let dir = TempDir::new().unwrap();
    let first_from = dir.path().join("a.jpg");
    let first_to = dir.path().join("b.jpg");
    let second_from = dir.path().join("c.jpg");
    let second_to = dir.path().join("d.jpg");
    fs::write(&first_from, b"a").unwrap();
    fs::write(&second_from, b"c").unwrap();
    let ledger = vec![
        ledger_step(1, &first_from, &first_to),
        ledger_step(2, &second_from, &second_to),
    ];

    let mut cleared: Vec<i64> = Vec::new();
    let (files_moved, warning) = run_file_stage("stage", &ledger, |id| {
        cleared.push(id);
        Err(PersistenceError::StoreBusy {
            attempts: 3,
            detail: String::from("database is locked"),
        })
    });

    assert_eq!(files_moved, 1);
    assert_eq!(cleared, vec![1]);
    assert!(first_to.exists());
    assert!(second_from.exists());
    assert!(!second_to.exists());
    match warning {
        Some(StoreError::PartialSwap(detail)) => {
            assert!(detail.contains("not cleared"), "{detail}");
            assert!(detail.contains("a.jpg"), "{detail}");
            assert!(detail.contains("c.jpg"), "{detail}");
        }
        other => panic!("expected PartialSwap, got {other:?}"),
    }
}

#[test]
fn test_swap_rejected_while_another_user_edits() {
    let dir = TempDir::new().unwrap();
    let mut store = alice_and_bob(dir.path());
    create_user(&mut store, "clerk", Role::User);
    store.acquire_edit_lock("O-002-05", "clerk").unwrap();
    let before = snapshot(&mut store);
    let files_before = tree(dir.path());

    let result = store.swap_identifiers("002", "003", ADMIN);

    match result {
        Err(StoreError::ValidationError(detail)) => assert!(detail.contains("clerk"), "{detail}"),
        other => panic!("expected ValidationError, got {other:?}"),
    }
    assert_eq!(snapshot(&mut store), before);
    assert_eq!(tree(dir.path()), files_before);
    let lock = store
        .persistence_mut()
        .get_edit_lock("O-002-05")
        .unwrap()
        .unwrap();
    assert_eq!(lock.locked_by, "clerk");
    assert_eq!(store.get_employee("O-002-05").unwrap().details.name, "Alice");
}

#[test]
fn test_swap_releases_own_lock() {
    let dir = TempDir::new().unwrap();
    let mut store = alice_and_bob(dir.path());
    store.acquire_edit_lock("O-002-05", ADMIN).unwrap();

    let report = store.swap_identifiers("002", "003", ADMIN).unwrap();

    assert_eq!(report.state, SwapState::Committed);
    for id in ["O-002-05", "O-003-04", "O-003-05", "O-002-04"] {
        assert_eq!(store.persistence_mut().get_edit_lock(id).unwrap(), None, "{id}");
    }
}

/// Alice at `O-002-05` and Bob at `O-003-05`, each with a folder holding a
/// profile photo named after their identifier.
fn same_year_with_profiles(dir: &Path) -> RecordStore {
    let mut store = open_store(dir);
    add_employee(&mut store, "O-002-05", "Alice");
    add_employee(&mut store, "O-003-05", "Bob");
    let files_dir = store.config().files_dir.clone();
    for (id, ext, content) in [("O-002-05", "jpg", "alice"), ("O-003-05", "png", "bob")] {
        let photos = files_dir.join(id).join("photos");
        fs::create_dir_all(&photos).unwrap();
        fs::write(photos.join(format!("profile_{id}.{ext}")), content).unwrap();
    }
    store
}

#[test]
fn test_swap_renames_profile_photos_inside_folders() {
    let dir = TempDir::new().unwrap();
    let mut store = same_year_with_profiles(dir.path());
    let files_dir = store.config().files_dir.clone();

    let report = store.swap_identifiers("002", "003", ADMIN).unwrap();

    assert_eq!(report.state, SwapState::Committed);
    assert_eq!(report.files_moved, 5);
    assert_eq!(
        fs::read(files_dir.join("O-003-05/photos/profile_O-003-05.jpg")).unwrap(),
        b"alice"
    );
    assert_eq!(
        fs::read(files_dir.join("O-002-05/photos/profile_O-002-05.png")).unwrap(),
        b"bob"
    );
    assert!(!files_dir.join("O-003-05/photos/profile_O-002-05.jpg").exists());
    assert!(!files_dir.join("O-002-05/photos/profile_O-003-05.png").exists());
    assert!(store.persistence_mut().list_pending_moves().unwrap().is_empty());
}

#[test]
fn test_swap_rejects_folder_holding_both_profile_names() {
    let dir = TempDir::new().unwrap();
    let mut store = same_year_with_profiles(dir.path());
    let files_dir = store.config().files_dir.clone();
    fs::write(files_dir.join("O-002-05/photos/profile_O-003-05.jpg"), b"stray").unwrap();
    let before = snapshot(&mut store);
    let files_before = tree(dir.path());

    let result = store.swap_identifiers("002", "003", ADMIN);

    assert!(matches!(result, Err(StoreError::ValidationError(_))), "{result:?}");
    assert_eq!(snapshot(&mut store), before);
    assert_eq!(tree(dir.path()), files_before);
}

/// Gives `id` a photo, an attachment and a profile photo, all holding
/// `owner`.
fn give_files(store: &RecordStore, id: &str, ext: &str, owner: &str) {
    let photos_dir = &store.config().photos_dir;
    let folder = store.config().files_dir.join(id);
    fs::create_dir_all(photos_dir).unwrap();
    fs::create_dir_all(folder.join("files")).unwrap();
    fs::create_dir_all(folder.join("photos")).unwrap();
    fs::write(photos_dir.join(format!("{id}.{ext}")), owner).unwrap();
    fs::write(folder.join("files/notes.txt"), owner).unwrap();
    fs::write(folder.join(format!("photos/profile_{id}.{ext}")), owner).unwrap();
}

/// Reads the photo, attachment and profile photo stored under `id`.
fn read_files(store: &RecordStore, id: &str, ext: &str) -> [Vec<u8>; 3] {
    let folder = store.config().files_dir.join(id);
    [
        fs::read(store.config().photos_dir.join(format!("{id}.{ext}"))).unwrap(),
        fs::read(folder.join("files/notes.txt")).unwrap(),
        fs::read(folder.join(format!("photos/profile_{id}.{ext}"))).unwrap(),
    ]
}

fn employee_id() -> impl Strategy<Value = (char, u16, u8)> {
    (
        proptest::char::range('A', 'Z'),
        1_u16..=999,
        0_u8..=99,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_double_swap_restores_identifiers(
        (p1, s1, y1) in employee_id(),
        (p2, s2, y2) in employee_id(),
    ) {
        prop_assume!(s1 != s2);
        let dir = TempDir::new().unwrap();
        let mut store = RecordStore::with_persistence(
            Persistence::new_in_memory().unwrap(),
            test_config(dir.path()),
        );
        store.bootstrap_admin(ADMIN_PIN).unwrap();

        let first = format!("{p1}-{s1:03}-{y1:02}");
        let second = format!("{p2}-{s2:03}-{y2:02}");
        add_employee(&mut store, &first, "First");
        add_employee(&mut store, &second, "Second");
        give_files(&store, &first, "jpg", "first");
        give_files(&store, &second, "png", "second");
        let before = snapshot(&mut store);
        let files_before = tree(dir.path());

        let report = store.swap_identifiers(&first, &second, ADMIN).unwrap();
        prop_assert_eq!(report.state, SwapState::Committed);
        let new_first = report.new_ids.0.to_string();
        let new_second = report.new_ids.1.to_string();
        prop_assert_eq!(store.get_employee(&new_first).unwrap().details.name, "First");
        prop_assert_eq!(store.get_employee(&new_second).unwrap().details.name, "Second");
        for content in read_files(&store, &new_first, "jpg") {
            prop_assert_eq!(content, b"first");
        }
        for content in read_files(&store, &new_second, "png") {
            prop_assert_eq!(content, b"second");
        }

        store.swap_identifiers(&new_first, &new_second, ADMIN).unwrap();
        prop_assert_eq!(snapshot(&mut store), before);
        prop_assert_eq!(tree(dir.path()), files_before);
        for content in read_files(&store, &first, "jpg") {
            prop_assert_eq!(content, b"first");
        }
        for content in read_files(&store, &second, "png") {
            prop_assert_eq!(content, b"second");
        }
    }
}
