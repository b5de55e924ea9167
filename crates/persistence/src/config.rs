// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Store configuration.
//!
//! Configuration is read from a JSON file. Every field has a default, so an
//! empty object is a valid configuration for a local store.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::PersistenceError;

/// Where the database file lives relative to the processes using it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentMode {
    /// A file on a local disk used by one machine.
    #[default]
    Local,
    /// A file on a network share opened by several machines.
    ///
    /// Enables checkpoint-on-commit for swaps and the shutdown backup.
    NetworkShare,
}

/// `SQLite` journal mode applied when the store is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalMode {
    #[default]
    Wal,
    Delete,
}

impl JournalMode {
    /// Returns the PRAGMA value for this mode.
    #[must_use]
    pub const fn as_pragma(&self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
        }
    }
}

/// Bounds for retrying statements that fail on lock contention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after each failure.
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Returns the delay to wait after the failed attempt `attempt`
    /// (zero-based): `base_delay * 2^attempt`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor: u64 = 1_u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// Configuration for opening a record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the shared database file.
    pub database_path: PathBuf,
    /// Local or network share deployment.
    pub deployment_mode: DeploymentMode,
    /// Journal mode applied on open.
    pub journal_mode: JournalMode,
    /// `SQLite` busy timeout. Zero makes contention fail immediately so the
    /// retry policy governs waiting.
    pub busy_timeout_ms: u64,
    /// Retry bounds for lock contention.
    pub retry: RetryPolicy,
    /// Directory holding `<identifier>.<ext>` photos.
    pub photos_dir: PathBuf,
    /// Directory holding `<identifier>/` attachment folders.
    pub files_dir: PathBuf,
    /// Directory receiving on-demand timestamped backups.
    pub backup_dir: PathBuf,
    /// Local directory receiving the shutdown backup in network share mode.
    pub fallback_dir: PathBuf,
    /// Hard limit on the shutdown backup.
    pub shutdown_backup_timeout_ms: u64,
    /// Number of timestamped backups to keep.
    pub backup_keep: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::for_data_dir(Path::new("."))
    }
}

impl StoreConfig {
    /// Builds a configuration with every path inside `data_dir`.
    ///
    /// # Arguments
    ///
    /// * `data_dir` - The directory holding the database and its folders
    #[must_use]
    pub fn for_data_dir(data_dir: &Path) -> Self {
        Self {
            database_path: data_dir.join("employee_vault.db"),
            deployment_mode: DeploymentMode::Local,
            journal_mode: JournalMode::Wal,
            busy_timeout_ms: 0,
            retry: RetryPolicy::default(),
            photos_dir: data_dir.join("employee_photos"),
            files_dir: data_dir.join("employee_files"),
            backup_dir: data_dir.join("backups"),
            fallback_dir: data_dir.join("local_backup"),
            shutdown_backup_timeout_ms: 3000,
            backup_keep: 10,
        }
    }

    /// Loads a configuration from a JSON file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        info!("Loading store configuration from: {}", path.display());
        let contents: String = std::fs::read_to_string(path).map_err(|e| {
            PersistenceError::ConfigError(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&contents)
    }

    /// Parses a configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(contents: &str) -> Result<Self, PersistenceError> {
        serde_json::from_str(contents).map_err(|e| PersistenceError::ConfigError(e.to_string()))
    }

    /// Returns true if the store lives on a network share.
    #[must_use]
    pub const fn is_network_share(&self) -> bool {
        matches!(self.deployment_mode, DeploymentMode::NetworkShare)
    }

    /// Returns the shutdown backup timeout.
    #[must_use]
    pub const fn shutdown_backup_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_backup_timeout_ms)
    }
}
