// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! PIN policy validation.
//!
//! Users sign in with a short numeric PIN rather than a password.

use thiserror::Error;

/// PIN policy errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PinPolicyError {
    /// PIN is too short.
    #[error("PIN must be at least {min_length} digits long")]
    TooShort { min_length: usize },

    /// PIN is too long.
    #[error("PIN must be at most {max_length} digits long")]
    TooLong { max_length: usize },

    /// PIN contains something other than digits.
    #[error("PIN must contain digits only")]
    NotNumeric,
}

/// PIN policy configuration.
pub struct PinPolicy {
    /// Minimum number of digits.
    pub min_length: usize,
    /// Maximum number of digits.
    pub max_length: usize,
}

impl Default for PinPolicy {
    fn default() -> Self {
        Self {
            min_length: 4,
            max_length: 6,
        }
    }
}

impl PinPolicy {
    /// Validates a PIN against the policy.
    ///
    /// # Arguments
    ///
    /// * `pin` - The PIN as entered
    ///
    /// # Errors
    ///
    /// Returns a `PinPolicyError` if the PIN does not meet policy requirements.
    pub fn validate(&self, pin: &str) -> Result<(), PinPolicyError> {
        if !pin.chars().all(|c| c.is_ascii_digit()) {
            return Err(PinPolicyError::NotNumeric);
        }

        if pin.len() < self.min_length {
            return Err(PinPolicyError::TooShort {
                min_length: self.min_length,
            });
        }

        if pin.len() > self.max_length {
            return Err(PinPolicyError::TooLong {
                max_length: self.max_length,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_pins() {
        let policy: PinPolicy = PinPolicy::default();

        assert_eq!(policy.validate("1234"), Ok(()));
        assert_eq!(policy.validate("123456"), Ok(()));
    }

    #[test]
    fn test_too_short() {
        let policy: PinPolicy = PinPolicy::default();

        assert_eq!(
            policy.validate("123"),
            Err(PinPolicyError::TooShort { min_length: 4 })
        );
        assert_eq!(
            policy.validate(""),
            Err(PinPolicyError::TooShort { min_length: 4 })
        );
    }

    #[test]
    fn test_too_long() {
        let policy: PinPolicy = PinPolicy::default();

        assert_eq!(
            policy.validate("1234567"),
            Err(PinPolicyError::TooLong { max_length: 6 })
        );
    }

    #[test]
    fn test_not_numeric() {
        let policy: PinPolicy = PinPolicy::default();

        assert_eq!(policy.validate("12a4"), Err(PinPolicyError::NotNumeric));
        // Non-ASCII digits are rejected too
        assert_eq!(policy.validate("١٢٣٤"), Err(PinPolicyError::NotNumeric));
    }
}
