// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

mod employee_tests;

use emp_vault_audit::Actor;
use emp_vault_domain::{EmployeeDetails, EmployeeId};

use crate::Persistence;

pub fn create_test_actor() -> Actor {
    Actor::new(String::from("test-actor"))
}

pub fn id(raw: &str) -> EmployeeId {
    raw.parse().unwrap()
}

/// Creates an in-memory store holding one active employee per identifier,
/// named after the identifier.
pub fn seeded(ids: &[&str]) -> Persistence {
    let mut persistence = Persistence::new_in_memory().unwrap();
    for raw in ids {
        persistence
            .insert_employee(
                &id(raw),
                &EmployeeDetails::named(&format!("Employee {raw}")),
                &create_test_actor(),
            )
            .unwrap();
    }
    persistence
}
