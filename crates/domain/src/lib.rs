// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

#![deny(
    clippy::pedantic,
    clippy::cargo,
    clippy::nursery,
    clippy::style,
    clippy::correctness,
    clippy::all,
    clippy::suspicious,
    clippy::complexity,
    clippy::perf,
    clippy::unwrap_used,
    clippy::expect_used
)]

mod access;
mod employee;
mod error;
mod types;
mod validation;

#[cfg(test)]
mod tests;

pub use access::{Capability, Role};
pub use employee::{ArchiveMarker, Employee, EmployeeDetails};
pub use error::DomainError;
pub use types::{EmployeeId, IdToken, PLACEHOLDER_PREFIX, resolve_token, swapped_identifiers};
pub use validation::{
    MAX_SEQUENCE, next_sequence, validate_employee_details, validate_government_id,
    validate_new_identifier,
};
