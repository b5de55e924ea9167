// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Startup recovery and shutdown backup tests.

use emp_vault_audit::AuditAction;
use emp_vault_domain::Role;
use emp_vault_persistence::{
    DeploymentMode, PendingFileMove, Persistence, PlannedMove, StoreConfig, SwapPlan,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

use super::{ADMIN, add_employee, create_user, open_store, snapshot, test_config};
use crate::recovery::split_stale;
use crate::{BackupStatus, IntegrityAndRecoveryManager, RecordStore, StoreError, run_with_timeout};

/// Commits the database stage of an `O-002-05` / `O-003-04` swap with a
/// photo rename plan, without touching the files.
fn interrupted_swap(store: &mut RecordStore) -> (PathBuf, PathBuf) {
    add_employee(store, "O-002-05", "Alice");
    add_employee(store, "O-003-04", "Bob");
    let photos_dir = store.config().photos_dir.clone();
    fs::create_dir_all(&photos_dir).unwrap();
    let alice = photos_dir.join("O-002-05.jpg");
    let bob = photos_dir.join("O-003-04.jpg");
    fs::write(&alice, b"alice").unwrap();
    fs::write(&bob, b"bob").unwrap();

    let step = |from: &str, to: &str| PlannedMove {
        from_path: photos_dir.join(from),
        to_path: photos_dir.join(to),
    };
    let plan = SwapPlan {
        swap_id: String::from("interrupted"),
        actor: String::from(ADMIN),
        first: "O-002-05".parse().unwrap(),
        second: "O-003-04".parse().unwrap(),
        new_first: "O-003-05".parse().unwrap(),
        new_second: "O-002-04".parse().unwrap(),
        moves: vec![
            step("O-002-05.jpg", "TEMP_O-002-05.jpg"),
            step("O-003-04.jpg", "O-002-04.jpg"),
            step("TEMP_O-002-05.jpg", "O-003-05.jpg"),
        ],
    };
    store.persistence_mut().apply_identifier_swap(&plan).unwrap();
    (alice, bob)
}

fn network_config(dir: &Path, timeout_ms: u64) -> StoreConfig {
    StoreConfig {
        deployment_mode: DeploymentMode::NetworkShare,
        shutdown_backup_timeout_ms: timeout_ms,
        ..test_config(dir)
    }
}

#[test]
fn test_resume_completes_interrupted_moves() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(dir.path());
    let (alice, _) = interrupted_swap(&mut store);
    let photos_dir = store.config().photos_dir.clone();
    // The first rename happened before the interruption.
    fs::rename(&alice, photos_dir.join("TEMP_O-002-05.jpg")).unwrap();

    let report = IntegrityAndRecoveryManager::resume_pending_moves(&mut store).unwrap();

    assert!(report.is_clean());
    assert_eq!(report.completed, 3);
    assert_eq!(fs::read(photos_dir.join("O-003-05.jpg")).unwrap(), b"alice");
    assert_eq!(fs::read(photos_dir.join("O-002-04.jpg")).unwrap(), b"bob");
    assert!(!photos_dir.join("TEMP_O-002-05.jpg").exists());
    assert!(store.persistence_mut().list_pending_moves().unwrap().is_empty());

    let again = IntegrityAndRecoveryManager::resume_pending_moves(&mut store).unwrap();
    assert_eq!(again.completed, 0);
}

#[test]
fn test_resume_stops_swap_at_conflict() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(dir.path());
    let (alice, bob) = interrupted_swap(&mut store);
    let photos_dir = store.config().photos_dir.clone();
    let squatter = photos_dir.join("O-002-04.jpg");
    fs::write(&squatter, b"someone else").unwrap();

    let report = IntegrityAndRecoveryManager::resume_pending_moves(&mut store).unwrap();

    assert_eq!(report.completed, 1);
    assert_eq!(report.conflicts.len(), 1);
    assert_eq!(report.conflicts[0].step_no, 2);
    assert_eq!(report.deferred, 1);
    assert!(!report.is_clean());

    assert!(!alice.exists());
    assert!(photos_dir.join("TEMP_O-002-05.jpg").exists());
    assert_eq!(fs::read(&bob).unwrap(), b"bob");
    assert_eq!(fs::read(&squatter).unwrap(), b"someone else");
    assert_eq!(store.persistence_mut().list_pending_moves().unwrap().len(), 2);
}

#[test]
fn test_resume_clears_stale_row_without_moving_files() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(dir.path());
    add_employee(&mut store, "O-002-05", "Alice");
    add_employee(&mut store, "O-003-05", "Bob");
    let files_dir = store.config().files_dir.clone();
    let alice_folder = files_dir.join("O-002-05");
    let bob_folder = files_dir.join("O-003-05");
    let temp_folder = files_dir.join("TEMP_O-002-05");
    fs::create_dir_all(alice_folder.join("files")).unwrap();
    fs::create_dir_all(bob_folder.join("files")).unwrap();
    fs::write(alice_folder.join("files/alice.txt"), b"alice").unwrap();
    fs::write(bob_folder.join("files/bob.txt"), b"bob").unwrap();

    let step = |from: &PathBuf, to: &PathBuf| PlannedMove {
        from_path: from.clone(),
        to_path: to.clone(),
    };
    let plan = SwapPlan {
        swap_id: String::from("row-left-behind"),
        actor: String::from(ADMIN),
        first: "O-002-05".parse().unwrap(),
        second: "O-003-05".parse().unwrap(),
        new_first: "O-003-05".parse().unwrap(),
        new_second: "O-002-05".parse().unwrap(),
        moves: vec![
            step(&alice_folder, &temp_folder),
            step(&bob_folder, &alice_folder),
            step(&temp_folder, &bob_folder),
        ],
    };
    let ledger = store.persistence_mut().apply_identifier_swap(&plan).unwrap();

    // Every rename ran, but the first row was never cleared.
    fs::rename(&alice_folder, &temp_folder).unwrap();
    fs::rename(&bob_folder, &alice_folder).unwrap();
    fs::rename(&temp_folder, &bob_folder).unwrap();
    store.persistence_mut().complete_file_move(ledger[1].id).unwrap();
    store.persistence_mut().complete_file_move(ledger[2].id).unwrap();

    let report = IntegrityAndRecoveryManager::resume_pending_moves(&mut store).unwrap();

    assert_eq!(report.stale, 1);
    assert_eq!(report.completed, 0);
    assert!(report.is_clean());
    assert_eq!(fs::read(files_dir.join("O-002-05/files/bob.txt")).unwrap(), b"bob");
    assert_eq!(fs::read(files_dir.join("O-003-05/files/alice.txt")).unwrap(), b"alice");
    assert!(!temp_folder.exists());
    assert!(store.persistence_mut().list_pending_moves().unwrap().is_empty());
    assert_eq!(store.get_employee("O-002-05").unwrap().details.name, "Bob");
    assert_eq!(store.get_employee("O-003-05").unwrap().details.name, "Alice");
}

fn ledger_row(step_no: i32, step_count: i32) -> PendingFileMove {
    PendingFileMove {
        id: i64::from(step_no),
        swap_id: String::from("swap"),
        step_no,
        step_count,
        from_path: PathBuf::from(format!("from-{step_no}")),
        to_path: PathBuf::from(format!("to-{step_no}")),
    }
}

fn step_numbers(rows: &[PendingFileMove]) -> Vec<i32> {
    rows.iter().map(|row| row.step_no).collect()
}

#[test]
fn test_only_the_run_ending_at_the_last_step_is_outstanding() {
    let (stale, outstanding) = split_stale(vec![ledger_row(2, 3), ledger_row(3, 3)]);
    assert!(stale.is_empty());
    assert_eq!(step_numbers(&outstanding), vec![2, 3]);

    let rows = vec![ledger_row(1, 4), ledger_row(3, 4), ledger_row(4, 4)];
    let (stale, outstanding) = split_stale(rows);
    assert_eq!(step_numbers(&stale), vec![1]);
    assert_eq!(step_numbers(&outstanding), vec![3, 4]);

    let (stale, outstanding) = split_stale(vec![ledger_row(1, 3), ledger_row(2, 3)]);
    assert_eq!(step_numbers(&stale), vec![1, 2]);
    assert!(outstanding.is_empty());

    let (stale, outstanding) = split_stale(Vec::new());
    assert!(stale.is_empty() && outstanding.is_empty());
}

#[test]
fn test_startup_recovers_and_reports() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    {
        let mut store = open_store(dir.path());
        interrupted_swap(&mut store);
        store.close();
    }
    let legacy = config.files_dir.join("O-003-05");
    fs::create_dir_all(&legacy).unwrap();
    fs::write(legacy.join("resume.docx"), b"cv").unwrap();

    let (mut store, report) = IntegrityAndRecoveryManager::startup(config.clone()).unwrap();

    assert_eq!(report.resumed.completed, 3);
    assert_eq!(report.restored_from, None);
    assert!(report.health.healthy, "{:?}", report.health);
    let layout = report.layout.unwrap();
    assert_eq!(layout.folders_prepared, 1);
    assert_eq!(layout.files_moved, 1);
    assert_eq!(layout.photos_copied, 2);
    assert!(config.files_dir.join("O-003-05/files/resume.docx").exists());
    assert!(
        config
            .files_dir
            .join("O-003-05/photos/profile_O-003-05.jpg")
            .exists()
    );
    assert_eq!(store.get_employee("O-003-05").unwrap().details.name, "Alice");
}

#[test]
fn test_local_shutdown_skips_backup() {
    let dir = TempDir::new().unwrap();
    let store = open_store(dir.path());
    let fallback_dir = store.config().fallback_dir.clone();

    let report = IntegrityAndRecoveryManager::shutdown(store);

    assert_eq!(report.backup, BackupStatus::Skipped);
    assert!(!fallback_dir.exists());
}

#[test]
fn test_network_shutdown_writes_fallback_copy() {
    let dir = TempDir::new().unwrap();
    let config = network_config(dir.path(), 3000);
    let mut store = RecordStore::open(config.clone()).unwrap();
    store.bootstrap_admin("1234").unwrap();
    add_employee(&mut store, "A-001-24", "Alice");

    let report = IntegrityAndRecoveryManager::shutdown(store);

    let BackupStatus::Completed(path) = report.backup else {
        panic!("expected a completed backup, got {:?}", report.backup);
    };
    assert!(path.starts_with(&config.fallback_dir));
    let mut copy = Persistence::new_with_file(&path).unwrap();
    let employee = copy
        .get_employee(&"A-001-24".parse().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(employee.details.name, "Alice");
}

#[test]
fn test_slow_backup_is_abandoned_at_timeout() {
    let dir = TempDir::new().unwrap();
    let config = network_config(dir.path(), 3000);
    let mut store = RecordStore::open(config.clone()).unwrap();
    store.bootstrap_admin("1234").unwrap();

    let started = Instant::now();
    let report = IntegrityAndRecoveryManager::shutdown_with(store, |_, fallback_dir| {
        thread::sleep(Duration::from_secs(10));
        Ok(fallback_dir.join("never.db"))
    });
    let elapsed = started.elapsed();

    assert_eq!(report.backup, BackupStatus::TimedOut);
    assert!(elapsed >= Duration::from_secs(3));
    assert!(elapsed < Duration::from_secs(6), "took {elapsed:?}");

    // The store was closed; the file opens cleanly again.
    let mut reopened = RecordStore::open(config).unwrap();
    assert!(reopened.verify_pin(ADMIN, "1234").unwrap());
}

#[test]
fn test_run_with_timeout_returns_fast_result() {
    let result = run_with_timeout("quick", || 7_u32, Duration::from_secs(1));
    assert_eq!(result, Some(7));

    let panicked: Option<u32> = run_with_timeout(
        "panics",
        || panic!("backup thread failed"),
        Duration::from_secs(1),
    );
    assert_eq!(panicked, None);
}

fn set_aside_files(dir: &Path, prefix: &str) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            let name = path.file_name().unwrap().to_string_lossy();
            name.starts_with(prefix) && !name.ends_with("-wal")
        })
        .collect()
}

#[test]
fn test_restore_from_backup_replaces_database() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(dir.path());
    add_employee(&mut store, "A-001-24", "Alice");
    let backup = store.backup_now(ADMIN).unwrap().path;
    add_employee(&mut store, "B-002-24", "Bob");

    let outcome = store.restore_from_backup(&backup, ADMIN).unwrap();

    assert_eq!(outcome.source, backup);
    assert_eq!(outcome.summary.employees, 1);
    assert_eq!(outcome.summary.users, 1);
    assert_eq!(
        snapshot(&mut store),
        vec![(String::from("A-001-24"), String::from("Alice"))]
    );
    let trail = store.audit_trail(5, ADMIN).unwrap();
    assert!(
        trail
            .iter()
            .any(|record| record.entry.action == AuditAction::RestoreBackup)
    );

    // The replaced database is kept and still holds the later record.
    let set_aside = outcome.set_aside.unwrap();
    assert_eq!(
        set_aside_files(dir.path(), "employee_vault.db.pre_restore_"),
        vec![set_aside.clone()]
    );
    let mut previous = Persistence::new_with_file(&set_aside).unwrap();
    let bob = previous.get_employee(&"B-002-24".parse().unwrap()).unwrap();
    assert_eq!(bob.unwrap().details.name, "Bob");
}

#[test]
fn test_restore_rejects_damaged_backup() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(dir.path());
    add_employee(&mut store, "A-001-24", "Alice");
    let backup = dir.path().join("damaged.db");
    fs::write(&backup, vec![0xAB_u8; 8192]).unwrap();

    let result = store.restore_from_backup(&backup, ADMIN);

    assert!(matches!(result, Err(StoreError::Storage(_))), "{result:?}");
    assert_eq!(
        snapshot(&mut store),
        vec![(String::from("A-001-24"), String::from("Alice"))]
    );
    assert!(!dir.path().join("employee_vault.db.restoring").exists());
    assert!(set_aside_files(dir.path(), "employee_vault.db.pre_restore_").is_empty());
    assert!(!store.config().backup_dir.exists());
}

#[test]
fn test_restore_requires_backup_capability() {
    let dir = TempDir::new().unwrap();
    let mut store = open_store(dir.path());
    create_user(&mut store, "clerk", Role::User);
    let backup = store.backup_now(ADMIN).unwrap().path;

    let result = store.restore_from_backup(&backup, "clerk");

    assert!(matches!(result, Err(StoreError::Denied(_))), "{result:?}");
}

#[test]
fn test_startup_restores_damaged_database_from_fallback() {
    let dir = TempDir::new().unwrap();
    let config = network_config(dir.path(), 3000);
    let mut store = RecordStore::open(config.clone()).unwrap();
    store.bootstrap_admin("1234").unwrap();
    add_employee(&mut store, "A-001-24", "Alice");
    let shutdown = IntegrityAndRecoveryManager::shutdown(store);
    assert!(matches!(shutdown.backup, BackupStatus::Completed(_)));

    fs::write(&config.database_path, vec![0xAB_u8; 8192]).unwrap();

    let (mut store, report) = IntegrityAndRecoveryManager::startup(config.clone()).unwrap();

    assert_eq!(
        report.restored_from,
        Some(config.fallback_dir.join("employee_vault.db"))
    );
    assert!(report.health.healthy, "{:?}", report.health);
    assert_eq!(store.get_employee("A-001-24").unwrap().details.name, "Alice");
    let data_dir = config.database_path.parent().unwrap();
    assert_eq!(set_aside_files(data_dir, "employee_vault.db.corrupted_").len(), 1);
}

#[test]
fn test_startup_without_fallback_reports_damaged_database() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    fs::write(&config.database_path, vec![0xAB_u8; 8192]).unwrap();

    let result = IntegrityAndRecoveryManager::startup(config.clone());

    assert!(matches!(result, Err(StoreError::Storage(_))));
    assert_eq!(fs::read(&config.database_path).unwrap(), vec![0xAB_u8; 8192]);
}
