// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Authorized access to the employee vault.
//!
//! [`RecordStore`] is the entry point for every read and write. Mutating
//! operations name the acting user explicitly and pass through the
//! [`PermissionGate`] before any storage is touched. Identifier swaps run
//! as an [`IdentifierSwapTransaction`], and [`IntegrityAndRecoveryManager`]
//! wraps the store's lifetime with startup recovery and the shutdown
//! backup.

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
#![allow(clippy::multiple_crate_versions)]

mod error;
mod files;
mod layout;
mod permission;
mod pin_policy;
mod recovery;
mod store;
mod swap;

#[cfg(test)]
mod tests;

pub use error::{Guidance, StoreError};
pub use files::{MoveOutcome, replay_move};
pub use layout::{LayoutReport, migrate_attachment_layout};
pub use permission::{AuthorizedActor, CapabilitySource, PermissionGate};
pub use pin_policy::{PinPolicy, PinPolicyError};
pub use recovery::{
    BackupStatus, IntegrityAndRecoveryManager, ResumeReport, ShutdownReport, StartupReport,
    run_with_timeout,
};
pub use store::RecordStore;
pub use swap::{IdentifierSwapTransaction, SwapReport, SwapState};

pub use emp_vault_persistence::{DeploymentMode, JournalMode, RetryPolicy, StoreConfig};
