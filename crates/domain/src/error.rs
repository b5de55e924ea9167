// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

/// Errors that can occur during domain validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The value is not a well-formed `PREFIX-SEQ-YEAR` identifier.
    InvalidIdentifier(String),
    /// The token is neither a full identifier nor a bare sequence number.
    InvalidToken(String),
    /// The identifier or sequence does not match any employee.
    UnknownIdentifier(String),
    /// A bare sequence matched more than one employee.
    AmbiguousSequence {
        /// The token as supplied by the caller.
        token: String,
        /// Every identifier the token matched.
        matches: Vec<String>,
    },
    /// Both swap inputs resolved to the same employee.
    SameEmployee(String),
    /// Both identifiers already carry the same sequence.
    SameSequence {
        /// The shared sequence number.
        sequence: u16,
    },
    /// The sequence is outside `001..=999`.
    InvalidSequence(u16),
    /// Every sequence number is in use.
    SequenceExhausted,
    /// Employee name is empty or invalid.
    InvalidName(String),
    /// Email address is malformed.
    InvalidEmail(String),
    /// A government ID number does not match its format.
    InvalidGovernmentId {
        /// The kind of ID (e.g. "SSS").
        kind: &'static str,
        /// The rejected value.
        value: String,
        /// A description of the expected format.
        expected: &'static str,
    },
    /// Contract length must be at least one month.
    InvalidContractMonths(u16),
    /// Resignation date precedes the hire date.
    ResignBeforeHire {
        /// The hire date.
        hire_date: String,
        /// The resignation date.
        resign_date: String,
    },
    /// Role tag is not recognised.
    InvalidRole(String),
    /// Capability key is not recognised.
    InvalidCapability(String),
}

impl DomainError {
    /// Returns the name of the input field this error refers to.
    #[must_use]
    pub fn field(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier(_)
            | Self::InvalidToken(_)
            | Self::UnknownIdentifier(_)
            | Self::AmbiguousSequence { .. }
            | Self::SameEmployee(_)
            | Self::SameSequence { .. }
            | Self::InvalidSequence(_)
            | Self::SequenceExhausted => "emp_id",
            Self::InvalidName(_) => "name",
            Self::InvalidEmail(_) => "email",
            Self::InvalidGovernmentId { kind, .. } => match *kind {
                "SSS" => "sss_number",
                "TIN" => "tin_number",
                "Pag-IBIG" => "pagibig_number",
                _ => "philhealth_number",
            },
            Self::InvalidContractMonths(_) => "contract_months",
            Self::ResignBeforeHire { .. } => "resign_date",
            Self::InvalidRole(_) => "role",
            Self::InvalidCapability(_) => "capability",
        }
    }
}

impl std::fmt::Display for DomainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier(value) => write!(
                f,
                "Invalid employee ID '{value}': expected PREFIX-SEQ-YEAR such as O-002-05"
            ),
            Self::InvalidToken(value) => write!(
                f,
                "Invalid employee reference '{value}': enter a full ID or a 3-digit sequence"
            ),
            Self::UnknownIdentifier(value) => write!(f, "No employee matches '{value}'"),
            Self::AmbiguousSequence { token, matches } => write!(
                f,
                "Sequence '{token}' matches more than one employee: {}",
                matches.join(", ")
            ),
            Self::SameEmployee(id) => write!(f, "Cannot swap employee {id} with itself"),
            Self::SameSequence { sequence } => {
                write!(f, "Both employees already use sequence {sequence:03}")
            }
            Self::InvalidSequence(seq) => {
                write!(f, "Sequence {seq} is outside the range 001-999")
            }
            Self::SequenceExhausted => write!(f, "All sequence numbers 001-999 are in use"),
            Self::InvalidName(msg) => write!(f, "Invalid name: {msg}"),
            Self::InvalidEmail(value) => write!(f, "Invalid email address: {value}"),
            Self::InvalidGovernmentId {
                kind,
                value,
                expected,
            } => write!(f, "Invalid {kind} number '{value}': expected {expected}"),
            Self::InvalidContractMonths(months) => {
                write!(f, "Contract length must be at least 1 month, got {months}")
            }
            Self::ResignBeforeHire {
                hire_date,
                resign_date,
            } => write!(
                f,
                "Resignation date {resign_date} is before hire date {hire_date}"
            ),
            Self::InvalidRole(role) => write!(f, "Invalid role: {role}"),
            Self::InvalidCapability(cap) => write!(f, "Invalid capability: {cap}"),
        }
    }
}

impl std::error::Error for DomainError {}
