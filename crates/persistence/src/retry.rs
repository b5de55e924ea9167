// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Bounded retry of statements that fail on lock contention.
//!
//! Only [`PersistenceError::Busy`] is retried. Every other error, including
//! an exhausted [`PersistenceError::StoreBusy`], propagates untouched.
//!
//! Nested calls on the same thread run their operation exactly once and let
//! the failure reach the outermost call, which owns the retry loop. This
//! keeps the total number of attempts bounded by the policy no matter how
//! deeply wrapped operations call each other.

use std::cell::Cell;
use tracing::{error, info, warn};

use crate::config::RetryPolicy;
use crate::error::PersistenceError;

thread_local! {
    static DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Restores the nesting depth when an execution scope ends, including on
/// unwind.
struct DepthGuard;

impl DepthGuard {
    /// Enters a scope, returning the guard and whether it is the outermost.
    fn enter() -> (Self, bool) {
        let outermost: bool = DEPTH.with(|depth| {
            let current: u32 = depth.get();
            depth.set(current.saturating_add(1));
            current == 0
        });
        (Self, outermost)
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

/// Runs database operations under a [`RetryPolicy`].
#[derive(Debug, Clone, Copy)]
pub struct RetryingExecutor {
    policy: RetryPolicy,
}

impl RetryingExecutor {
    /// Creates an executor with the given policy.
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Returns the policy this executor applies.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `operation`, retrying on lock contention.
    ///
    /// # Arguments
    ///
    /// * `label` - A short name for the operation, used in logs
    /// * `operation` - The unit of work; it must be safe to re-run after a
    ///   `Busy` failure, which holds for anything inside a single transaction
    ///
    /// # Errors
    ///
    /// Returns `StoreBusy` when every attempt failed on contention, or the
    /// first non-contention error unchanged.
    pub fn execute<T, F>(&self, label: &str, mut operation: F) -> Result<T, PersistenceError>
    where
        F: FnMut() -> Result<T, PersistenceError>,
    {
        let (_guard, outermost) = DepthGuard::enter();
        if !outermost {
            return operation();
        }

        let max_attempts: u32 = self.policy.max_attempts.max(1);
        let mut attempt: u32 = 0;
        loop {
            match operation() {
                Ok(value) => {
                    if attempt > 0 {
                        info!(
                            operation = label,
                            attempts = attempt + 1,
                            "Operation succeeded after lock contention"
                        );
                    }
                    return Ok(value);
                }
                Err(err) if err.is_busy() => {
                    attempt += 1;
                    if attempt >= max_attempts {
                        error!(
                            operation = label,
                            attempts = attempt,
                            "Database still locked after final attempt: {}",
                            err
                        );
                        return Err(PersistenceError::StoreBusy {
                            attempts: attempt,
                            detail: err.to_string(),
                        });
                    }
                    let delay = self.policy.delay_for(attempt - 1);
                    warn!(
                        operation = label,
                        attempt,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Database locked, retrying"
                    );
                    std::thread::sleep(delay);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryingExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
