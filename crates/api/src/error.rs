// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Error types for the record store.

use emp_vault_domain::DomainError;
use emp_vault_persistence::PersistenceError;
use thiserror::Error;

use crate::pin_policy::PinPolicyError;

/// What a caller should do about a failed store operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guidance {
    /// Wait a moment and repeat the operation.
    TryAgain,
    /// The acting user lacks the capability; do not repeat.
    NoPermission,
    /// Correct the input and repeat.
    FixInput,
    /// Stored state needs an operator to look at it.
    NeedsAttention,
}

/// Errors returned by the record store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The acting user may not perform the operation.
    #[error("Permission denied: {0}")]
    Denied(String),

    /// Lock contention outlasted the retry budget.
    #[error("{0}")]
    StoreBusy(String),

    /// The input was rejected before any state changed.
    #[error("Validation failed: {0}")]
    ValidationError(String),

    /// A swap committed but some file renames are still outstanding.
    #[error("Swap committed with outstanding file moves: {0}")]
    PartialSwap(String),

    /// A storage failure unrelated to contention.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl StoreError {
    /// Classifies this error for the caller.
    #[must_use]
    pub const fn guidance(&self) -> Guidance {
        match self {
            Self::Denied(_) => Guidance::NoPermission,
            Self::StoreBusy(_) => Guidance::TryAgain,
            Self::ValidationError(_) | Self::NotFound(_) => Guidance::FixInput,
            Self::PartialSwap(_) | Self::Storage(_) => Guidance::NeedsAttention,
        }
    }

    /// Returns true if repeating the same call later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreBusy(_))
    }
}

impl From<PersistenceError> for StoreError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::StoreBusy { .. } | PersistenceError::Busy(_) => {
                Self::StoreBusy(err.to_string())
            }
            PersistenceError::EmployeeNotFound(_)
            | PersistenceError::UserNotFound(_)
            | PersistenceError::AttachmentNotFound(_)
            | PersistenceError::NotFound(_) => Self::NotFound(err.to_string()),
            PersistenceError::DuplicateEmployee(_)
            | PersistenceError::DuplicateAttachment { .. }
            | PersistenceError::DuplicateUser(_)
            | PersistenceError::NotArchived(_)
            | PersistenceError::LastAdmin(_)
            | PersistenceError::EditLockHeld { .. } => Self::ValidationError(err.to_string()),
            _ => Self::Storage(err.to_string()),
        }
    }
}

impl From<DomainError> for StoreError {
    fn from(err: DomainError) -> Self {
        Self::ValidationError(format!("{}: {err}", err.field()))
    }
}

impl From<PinPolicyError> for StoreError {
    fn from(err: PinPolicyError) -> Self {
        Self::ValidationError(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(format!("File system error: {err}"))
    }
}
