// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::DomainError;

/// Prefix used for the transient identifier a record carries mid-swap.
pub const PLACEHOLDER_PREFIX: &str = "TEMP_";

/// A structured employee identifier of the form `PREFIX-SEQ-YEAR`.
///
/// The prefix is a single uppercase ASCII letter, the sequence a
/// zero-padded three digit number and the year a two digit number.
/// Input is case-normalised to uppercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmployeeId {
    prefix: char,
    sequence: u16,
    year: u8,
}

impl EmployeeId {
    /// Creates an identifier from its components.
    ///
    /// # Arguments
    ///
    /// * `prefix` - The department letter
    /// * `sequence` - The sequence number (0-999)
    /// * `year` - The two digit year (0-99)
    ///
    /// # Errors
    ///
    /// Returns an error if any component is out of range.
    pub fn new(prefix: char, sequence: u16, year: u8) -> Result<Self, DomainError> {
        if !prefix.is_ascii_alphabetic() || sequence > 999 || year > 99 {
            return Err(DomainError::InvalidIdentifier(format!(
                "{prefix}-{sequence:03}-{year:02}"
            )));
        }
        Ok(Self {
            prefix: prefix.to_ascii_uppercase(),
            sequence,
            year,
        })
    }

    /// Returns the department prefix letter.
    #[must_use]
    pub const fn prefix(&self) -> char {
        self.prefix
    }

    /// Returns the sequence component.
    #[must_use]
    pub const fn sequence(&self) -> u16 {
        self.sequence
    }

    /// Returns the two digit year component.
    #[must_use]
    pub const fn year(&self) -> u8 {
        self.year
    }

    /// Returns a copy of this identifier carrying a different sequence.
    #[must_use]
    pub const fn with_sequence(&self, sequence: u16) -> Self {
        Self {
            prefix: self.prefix,
            sequence,
            year: self.year,
        }
    }

    /// Returns the placeholder value this identifier is parked under
    /// during the first step of a swap.
    #[must_use]
    pub fn placeholder(&self) -> String {
        format!("{PLACEHOLDER_PREFIX}{self}")
    }
}

impl std::fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:03}-{:02}", self.prefix, self.sequence, self.year)
    }
}

impl FromStr for EmployeeId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s.trim().to_uppercase();
        let invalid = || DomainError::InvalidIdentifier(s.to_string());

        let mut parts = normalized.split('-');
        let (Some(prefix), Some(sequence), Some(year), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let mut prefix_chars = prefix.chars();
        let (Some(letter), None) = (prefix_chars.next(), prefix_chars.next()) else {
            return Err(invalid());
        };
        if !letter.is_ascii_alphabetic() {
            return Err(invalid());
        }
        if sequence.len() != 3 || !sequence.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if year.len() != 2 || !year.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let sequence: u16 = sequence.parse().map_err(|_| invalid())?;
        let year: u8 = year.parse().map_err(|_| invalid())?;
        Self::new(letter, sequence, year)
    }
}

impl TryFrom<String> for EmployeeId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EmployeeId> for String {
    fn from(value: EmployeeId) -> Self {
        value.to_string()
    }
}

/// A caller-supplied reference to an employee.
///
/// Operators may type either the full identifier or just its sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdToken {
    /// A bare sequence such as `"2"` or `"002"`.
    Sequence(u16),
    /// A complete identifier such as `"O-002-05"`.
    Full(EmployeeId),
}

impl FromStr for IdToken {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s.trim().to_uppercase();
        if normalized.is_empty() {
            return Err(DomainError::InvalidToken(s.to_string()));
        }
        if normalized.bytes().all(|b| b.is_ascii_digit()) {
            if normalized.len() > 3 {
                return Err(DomainError::InvalidToken(s.to_string()));
            }
            let sequence: u16 = normalized
                .parse()
                .map_err(|_| DomainError::InvalidToken(s.to_string()))?;
            return Ok(Self::Sequence(sequence));
        }
        normalized
            .parse::<EmployeeId>()
            .map(Self::Full)
            .map_err(|_| DomainError::InvalidToken(s.to_string()))
    }
}

/// Resolves a token against the set of known identifiers.
///
/// A full identifier must be present in `known`. A bare sequence must match
/// exactly one entry; more than one match is rejected as ambiguous.
///
/// # Arguments
///
/// * `raw` - The token as typed by the operator
/// * `known` - Every identifier currently stored
///
/// # Errors
///
/// Returns an error if the token is malformed, matches nothing, or matches
/// more than one employee.
pub fn resolve_token(raw: &str, known: &[EmployeeId]) -> Result<EmployeeId, DomainError> {
    match raw.parse::<IdToken>()? {
        IdToken::Full(id) => {
            if known.contains(&id) {
                Ok(id)
            } else {
                Err(DomainError::UnknownIdentifier(id.to_string()))
            }
        }
        IdToken::Sequence(sequence) => {
            let matches: Vec<&EmployeeId> =
                known.iter().filter(|id| id.sequence() == sequence).collect();
            match matches.as_slice() {
                [] => Err(DomainError::UnknownIdentifier(format!("{sequence:03}"))),
                [only] => Ok(**only),
                many => Err(DomainError::AmbiguousSequence {
                    token: raw.trim().to_string(),
                    matches: many.iter().map(ToString::to_string).collect(),
                }),
            }
        }
    }
}

/// Computes the identifiers two records carry after their sequences are
/// exchanged.
///
/// `P1-S1-Y1` and `P2-S2-Y2` become `P1-S2-Y1` and `P2-S1-Y2`.
///
/// # Errors
///
/// Returns an error if both identifiers are equal or share a sequence.
pub fn swapped_identifiers(
    first: &EmployeeId,
    second: &EmployeeId,
) -> Result<(EmployeeId, EmployeeId), DomainError> {
    if first == second {
        return Err(DomainError::SameEmployee(first.to_string()));
    }
    if first.sequence() == second.sequence() {
        return Err(DomainError::SameSequence {
            sequence: first.sequence(),
        });
    }
    Ok((
        first.with_sequence(second.sequence()),
        second.with_sequence(first.sequence()),
    ))
}
