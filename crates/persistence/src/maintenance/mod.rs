// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Integrity checks and backups.
//!
//! - `health` - Read-only checks over schema and data
//! - `backup` - `VACUUM INTO` snapshots, the page-copy fallback backup and
//!   verified restores

pub mod backup;
pub mod health;

pub use backup::{
    BackupOutcome, BackupSummary, RestoreOutcome, StagedRestore, backup_to_fallback,
    create_timestamped_backup, prune_backups, restore_database, stage_restore, vacuum_into,
    verify_database,
};
pub use health::{HealthCheck, HealthReport, run_health_checks};
