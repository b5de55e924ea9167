// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Database backups.
//!
//! On-demand backups use `VACUUM INTO` on the open connection. The shutdown
//! fallback backup opens its own connections and copies pages with the
//! `SQLite` online backup API, so it can run on a worker thread while the
//! main connection is being closed.
//!
//! Restores never open the backup itself. It is copied next to the
//! database, the copy is checked with `PRAGMA integrity_check`, and only a
//! copy that passes replaces the database file.

use diesel::prelude::*;
use diesel::sql_types::Text;
use diesel::SqliteConnection;
use rusqlite::backup::Backup;
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clock;
use crate::error::PersistenceError;

/// Prefix of timestamped backup files.
pub const BACKUP_PREFIX: &str = "employee_vault_";

/// File name of the fallback copy of the database.
pub const FALLBACK_FILE: &str = "employee_vault.db";

/// Prefix of earlier fallback copies kept next to the current one.
pub const PRESERVED_FALLBACK_PREFIX: &str = "employee_vault_backup_";

/// Pages copied per backup step.
const PAGES_PER_STEP: i32 = 100;

/// The result of a completed backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupOutcome {
    /// The file written.
    pub path: PathBuf,
    /// Older backups removed by retention.
    pub pruned: Vec<PathBuf>,
}

/// Row counts read from a verified database copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSummary {
    pub employees: i64,
    pub users: i64,
}

/// The result of a completed restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreOutcome {
    /// The backup that was restored.
    pub source: PathBuf,
    /// Where the replaced database file was moved, if there was one.
    pub set_aside: Option<PathBuf>,
    pub summary: BackupSummary,
}

/// A verified copy of a backup waiting next to the database it replaces.
#[derive(Debug)]
pub struct StagedRestore {
    source: PathBuf,
    staging: PathBuf,
    target: PathBuf,
    summary: BackupSummary,
}

/// Appends `suffix` to the file name of `path`.
fn with_name_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

fn restore_error(err: rusqlite::Error) -> PersistenceError {
    PersistenceError::RestoreFailed(err.to_string())
}

/// Runs `PRAGMA integrity_check` on the database at `path` and reads its
/// row counts.
///
/// # Errors
///
/// Returns `RestoreFailed` if the file is not a database, fails the check,
/// or lacks the employee tables.
pub fn verify_database(path: &Path) -> Result<BackupSummary, PersistenceError> {
    let conn: Connection = Connection::open(path).map_err(restore_error)?;
    let result: String = conn
        .query_row("PRAGMA integrity_check", [], |row| row.get(0))
        .map_err(restore_error)?;
    if result != "ok" {
        return Err(PersistenceError::RestoreFailed(format!(
            "Integrity check failed: {result}"
        )));
    }
    let employees: i64 = conn
        .query_row("SELECT COUNT(*) FROM employees", [], |row| row.get(0))
        .map_err(restore_error)?;
    let users: i64 = conn
        .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
        .map_err(restore_error)?;
    Ok(BackupSummary { employees, users })
}

fn remove_if_present(path: &Path) -> Result<(), PersistenceError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Copies `backup` next to `target` and verifies the copy.
///
/// `target` is not touched. Install the result with
/// [`StagedRestore::install`] once nothing holds `target` open.
///
/// # Errors
///
/// Returns `RestoreFailed` if the backup is missing or fails verification,
/// or an I/O error if the copy cannot be written.
pub fn stage_restore(backup: &Path, target: &Path) -> Result<StagedRestore, PersistenceError> {
    if !backup.is_file() {
        return Err(PersistenceError::RestoreFailed(format!(
            "{} not found",
            backup.display()
        )));
    }
    let staging: PathBuf = with_name_suffix(target, ".restoring");
    remove_if_present(&staging)?;
    remove_if_present(&with_name_suffix(&staging, "-wal"))?;
    fs::copy(backup, &staging)?;
    let backup_wal: PathBuf = with_name_suffix(backup, "-wal");
    if backup_wal.is_file() {
        fs::copy(&backup_wal, with_name_suffix(&staging, "-wal"))?;
    }

    match verify_database(&staging) {
        Ok(summary) => {
            debug!(
                backup = %backup.display(),
                employees = summary.employees,
                users = summary.users,
                "Backup verified"
            );
            Ok(StagedRestore {
                source: backup.to_path_buf(),
                staging,
                target: target.to_path_buf(),
                summary,
            })
        }
        Err(err) => {
            for leftover in [
                with_name_suffix(&staging, "-wal"),
                with_name_suffix(&staging, "-shm"),
                staging,
            ] {
                if let Err(cleanup) = remove_if_present(&leftover) {
                    warn!(path = %leftover.display(), "Failed to remove staged copy: {}", cleanup);
                }
            }
            Err(err)
        }
    }
}

impl StagedRestore {
    /// Row counts of the verified copy.
    #[must_use]
    pub const fn summary(&self) -> BackupSummary {
        self.summary
    }

    /// Moves the current database aside as `<file>.<label>_<timestamp>` and
    /// puts the verified copy in its place.
    ///
    /// The WAL of the replaced file travels with it; its shared-memory file
    /// is removed.
    ///
    /// # Errors
    ///
    /// Returns an error if a rename fails.
    pub fn install(self, label: &str) -> Result<RestoreOutcome, PersistenceError> {
        let set_aside: Option<PathBuf> = if self.target.exists() {
            let aside: PathBuf =
                with_name_suffix(&self.target, &format!(".{label}_{}", clock::file_stamp()?));
            fs::rename(&self.target, &aside)?;
            let wal: PathBuf = with_name_suffix(&self.target, "-wal");
            if wal.exists() {
                fs::rename(&wal, with_name_suffix(&aside, "-wal"))?;
            }
            remove_if_present(&with_name_suffix(&self.target, "-shm"))?;
            Some(aside)
        } else {
            None
        };
        fs::rename(&self.staging, &self.target)?;

        info!(
            source = %self.source.display(),
            target = %self.target.display(),
            employees = self.summary.employees,
            users = self.summary.users,
            "Database restored from backup"
        );
        Ok(RestoreOutcome {
            source: self.source,
            set_aside,
            summary: self.summary,
        })
    }

    /// Removes the staged copy without installing it.
    pub fn discard(self) {
        if let Err(err) = remove_if_present(&self.staging) {
            warn!(path = %self.staging.display(), "Failed to remove staged copy: {}", err);
        }
    }
}

/// Replaces `target` with a verified copy of `backup`.
///
/// Nothing may hold `target` open. The current file is set aside under
/// `label`.
///
/// # Errors
///
/// Returns `RestoreFailed` if the backup fails verification, leaving
/// `target` unchanged, or an I/O error if the files cannot be moved.
pub fn restore_database(
    backup: &Path,
    target: &Path,
    label: &str,
) -> Result<RestoreOutcome, PersistenceError> {
    stage_restore(backup, target)?.install(label)
}

/// Writes a compacted copy of the open database to `target`.
///
/// # Errors
///
/// Returns an error if `target` already exists or `SQLite` cannot write it.
pub fn vacuum_into(conn: &mut SqliteConnection, target: &Path) -> Result<(), PersistenceError> {
    if target.exists() {
        return Err(PersistenceError::BackupFailed(format!(
            "{} already exists",
            target.display()
        )));
    }
    diesel::sql_query("VACUUM INTO ?")
        .bind::<Text, _>(target.to_string_lossy().into_owned())
        .execute(conn)
        .map_err(|e| PersistenceError::BackupFailed(e.to_string()))?;
    debug!("Wrote database copy to {}", target.display());
    Ok(())
}

fn has_prefix(path: &Path, prefix: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(prefix) && n.ends_with(".db"))
}

/// Removes the oldest timestamped backups beyond `keep`.
///
/// Names embed a sortable timestamp, so name order is age order.
///
/// # Returns
///
/// The removed files.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn prune_backups(dir: &Path, keep: usize) -> Result<Vec<PathBuf>, PersistenceError> {
    prune_with_prefix(dir, BACKUP_PREFIX, keep)
}

fn prune_with_prefix(
    dir: &Path,
    prefix: &str,
    keep: usize,
) -> Result<Vec<PathBuf>, PersistenceError> {
    let mut backups: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| has_prefix(path, prefix))
        .collect();
    backups.sort();

    let excess: usize = backups.len().saturating_sub(keep);
    let mut pruned: Vec<PathBuf> = Vec::with_capacity(excess);
    for old in backups.into_iter().take(excess) {
        match fs::remove_file(&old) {
            Ok(()) => pruned.push(old),
            Err(err) => warn!(
                error = %err,
                path = %old.display(),
                "Failed to remove old backup"
            ),
        }
    }
    Ok(pruned)
}

/// Writes `<dir>/employee_vault_<timestamp>.db` and applies retention.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the copy fails.
pub fn create_timestamped_backup(
    conn: &mut SqliteConnection,
    dir: &Path,
    keep: usize,
) -> Result<BackupOutcome, PersistenceError> {
    fs::create_dir_all(dir)?;
    let path: PathBuf = dir.join(format!("{BACKUP_PREFIX}{}.db", clock::file_stamp()?));
    vacuum_into(conn, &path)?;
    let pruned: Vec<PathBuf> = prune_backups(dir, keep.max(1))?;
    info!(
        path = %path.display(),
        pruned = pruned.len(),
        "Database backup created"
    );
    Ok(BackupOutcome { path, pruned })
}

/// Copies `source` to `<fallback_dir>/employee_vault.db` with the online
/// backup API.
///
/// An existing fallback copy is first renamed to
/// `employee_vault_backup_<timestamp>.db` so a failed copy never destroys
/// the last good one. Only the newest `keep` of those earlier copies are
/// kept.
///
/// # Errors
///
/// Returns an error if the directory cannot be prepared or the copy fails.
pub fn backup_to_fallback(
    source: &Path,
    fallback_dir: &Path,
    keep: usize,
) -> Result<PathBuf, PersistenceError> {
    fs::create_dir_all(fallback_dir)?;
    let target: PathBuf = fallback_dir.join(FALLBACK_FILE);

    if target.exists() {
        let preserved: PathBuf = fallback_dir.join(format!(
            "{PRESERVED_FALLBACK_PREFIX}{}.db",
            clock::file_stamp()?
        ));
        fs::rename(&target, &preserved)?;
        debug!("Preserved previous fallback copy as {}", preserved.display());
        let pruned: Vec<PathBuf> =
            prune_with_prefix(fallback_dir, PRESERVED_FALLBACK_PREFIX, keep.max(1))?;
        if !pruned.is_empty() {
            debug!(pruned = pruned.len(), "Pruned old fallback copies");
        }
    }

    let src: Connection = Connection::open_with_flags(
        source,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
    )?;
    let mut dst: Connection = Connection::open(&target)?;
    {
        let backup: Backup<'_, '_> = Backup::new(&src, &mut dst)?;
        backup.run_to_completion(PAGES_PER_STEP, Duration::from_millis(10), None)?;
    }

    info!(
        source = %source.display(),
        target = %target.display(),
        "Fallback backup written"
    );
    Ok(target)
}
