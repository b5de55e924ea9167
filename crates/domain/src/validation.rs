// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use crate::employee::EmployeeDetails;
use crate::error::DomainError;
use crate::types::EmployeeId;

/// Highest sequence number an identifier may carry.
pub const MAX_SEQUENCE: u16 = 999;

/// Validates an identifier for a newly added record.
///
/// Sequence `000` is well-formed but never assigned.
///
/// # Errors
///
/// Returns an error if the sequence is zero.
pub const fn validate_new_identifier(id: &EmployeeId) -> Result<(), DomainError> {
    if id.sequence() == 0 {
        return Err(DomainError::InvalidSequence(0));
    }
    Ok(())
}

/// Validates a government ID number.
///
/// Dashes are ignored; the remainder must be all digits with the exact
/// length required for `kind`. Empty values are accepted.
///
/// # Arguments
///
/// * `kind` - One of `SSS`, `TIN`, `Pag-IBIG`, `PhilHealth`
/// * `value` - The number as entered
///
/// # Errors
///
/// Returns an error if the number does not match its format.
pub fn validate_government_id(kind: &'static str, value: &str) -> Result<(), DomainError> {
    let (digits, expected): (usize, &'static str) = match kind {
        "SSS" => (10, "10 digits (XX-XXXXXXX-X)"),
        "TIN" => (12, "12 digits (XXX-XXX-XXX-XXX)"),
        "Pag-IBIG" => (12, "12 digits (XXXX-XXXX-XXXX)"),
        _ => (12, "12 digits (XX-XXXXXXXXX-X)"),
    };

    let trimmed: &str = value.trim();
    if trimmed.is_empty() {
        return Ok(());
    }

    let cleaned: String = trimmed.chars().filter(|c| *c != '-').collect();
    if cleaned.len() != digits || !cleaned.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DomainError::InvalidGovernmentId {
            kind,
            value: value.to_string(),
            expected,
        });
    }
    Ok(())
}

/// Validates the editable attributes of an employee.
///
/// # Errors
///
/// Returns the first violated rule.
pub fn validate_employee_details(details: &EmployeeDetails) -> Result<(), DomainError> {
    if details.name.trim().is_empty() {
        return Err(DomainError::InvalidName(String::from(
            "Name cannot be empty",
        )));
    }

    if let Some(email) = details.email.as_deref().map(str::trim)
        && !email.is_empty()
    {
        let valid: bool = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !valid {
            return Err(DomainError::InvalidEmail(email.to_string()));
        }
    }

    let government_ids: [(&'static str, &Option<String>); 4] = [
        ("SSS", &details.sss_number),
        ("TIN", &details.tin_number),
        ("Pag-IBIG", &details.pagibig_number),
        ("PhilHealth", &details.philhealth_number),
    ];
    for (kind, value) in government_ids {
        if let Some(value) = value {
            validate_government_id(kind, value)?;
        }
    }

    if details.contract_months == Some(0) {
        return Err(DomainError::InvalidContractMonths(0));
    }

    if let (Some(hire), Some(resign)) = (details.hire_date, details.resign_date)
        && resign < hire
    {
        return Err(DomainError::ResignBeforeHire {
            hire_date: hire.to_string(),
            resign_date: resign.to_string(),
        });
    }

    Ok(())
}

/// Returns the smallest sequence number not used by any identifier.
///
/// # Errors
///
/// Returns an error if every sequence from 001 to 999 is taken.
pub fn next_sequence(existing: &[EmployeeId]) -> Result<u16, DomainError> {
    let mut used: Vec<u16> = existing.iter().map(EmployeeId::sequence).collect();
    used.sort_unstable();
    used.dedup();

    (1..=MAX_SEQUENCE)
        .find(|candidate| used.binary_search(candidate).is_err())
        .ok_or(DomainError::SequenceExhausted)
}
