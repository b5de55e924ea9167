// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Test module for the API crate.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod recovery_tests;
mod swap_tests;

use emp_vault_domain::{EmployeeDetails, Role};
use std::path::Path;

use crate::{RecordStore, RetryPolicy, StoreConfig};

pub const ADMIN: &str = "admin";
pub const ADMIN_PIN: &str = "1234";

pub fn test_config(dir: &Path) -> StoreConfig {
    StoreConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 10,
        },
        ..StoreConfig::for_data_dir(dir)
    }
}

/// Opens a store in `dir` with the bootstrap admin created.
pub fn open_store(dir: &Path) -> RecordStore {
    let mut store: RecordStore = RecordStore::open(test_config(dir)).unwrap();
    assert!(store.bootstrap_admin(ADMIN_PIN).unwrap());
    store
}

pub fn add_employee(store: &mut RecordStore, id: &str, name: &str) {
    store
        .add_employee(id, &EmployeeDetails::named(name), ADMIN)
        .unwrap();
}

pub fn create_user(store: &mut RecordStore, username: &str, role: Role) {
    store
        .create_user(username, username, "5678", role, ADMIN)
        .unwrap();
}

/// Identifier and name of every stored employee, archived included.
pub fn snapshot(store: &mut RecordStore) -> Vec<(String, String)> {
    store
        .list_employees(true)
        .unwrap()
        .into_iter()
        .map(|e| (e.id.to_string(), e.details.name))
        .collect()
}
