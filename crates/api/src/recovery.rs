// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Startup checks, recovery of interrupted swaps, and the shutdown backup.

use emp_vault_persistence::{
    HealthReport, PendingFileMove, Persistence, PersistenceError, StagedRestore, StoreConfig,
    maintenance,
};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::error::StoreError;
use crate::files::{MoveOutcome, replay_move};
use crate::layout::{LayoutReport, migrate_attachment_layout};
use crate::store::RecordStore;

/// What happened when the store was opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupReport {
    /// Health of the database after recovery ran.
    pub health: HealthReport,
    /// Replay of file moves left behind by interrupted swaps.
    pub resumed: ResumeReport,
    /// Layout migration result; `None` if it failed (the failure is logged).
    pub layout: Option<LayoutReport>,
    /// Expired edit locks removed.
    pub expired_locks: usize,
    /// The fallback copy the database was restored from, if it was found
    /// damaged.
    pub restored_from: Option<PathBuf>,
}

/// The result of replaying the pending file move ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeReport {
    /// Steps applied or found already applied.
    pub completed: usize,
    /// Steps whose source and destination both exist.
    pub conflicts: Vec<PendingFileMove>,
    /// Steps whose rename failed.
    pub failed: Vec<PendingFileMove>,
    /// Later steps of a swap skipped because an earlier step did not apply.
    pub deferred: usize,
    /// Rows left behind by steps that already ran; cleared without touching
    /// the disk.
    pub stale: usize,
}

impl ResumeReport {
    /// Returns true if every outstanding step was applied.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty() && self.failed.is_empty() && self.deferred == 0
    }
}

/// Outcome of the shutdown backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupStatus {
    /// Local deployments take no shutdown backup.
    Skipped,
    /// The backup was written to the given path.
    Completed(PathBuf),
    /// The backup failed.
    Failed(String),
    /// The backup did not finish in time and was abandoned.
    TimedOut,
}

/// What happened when the store was closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    pub backup: BackupStatus,
    pub elapsed: Duration,
}

/// Runs `job` on its own thread and waits at most `timeout` for it.
///
/// Returns `None` if the job did not finish in time or panicked. A job
/// that times out keeps running detached; its result is discarded.
pub fn run_with_timeout<T, F>(name: &str, job: F, timeout: Duration) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (sender, receiver) = mpsc::channel::<T>();
    let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
        // The receiver is gone once the caller stopped waiting.
        let _ = sender.send(job());
    });
    if let Err(err) = spawned {
        error!(job = name, "Failed to start worker thread: {}", err);
        return None;
    }

    match receiver.recv_timeout(timeout) {
        Ok(value) => Some(value),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            warn!(
                job = name,
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "Job timed out and was abandoned"
            );
            None
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            error!(job = name, "Job ended without a result");
            None
        }
    }
}

/// Integrity checks and recovery around the lifetime of a store.
pub struct IntegrityAndRecoveryManager;

impl IntegrityAndRecoveryManager {
    /// Opens the store and brings it to a consistent state.
    ///
    /// A database that cannot be opened as one, or that fails
    /// `quick_check`, is replaced by the local fallback copy when one
    /// exists and passes verification. The damaged file is kept beside it
    /// as `<file>.corrupted_<timestamp>`.
    ///
    /// Then, in order: replays interrupted swap renames, migrates the
    /// attachment layout, drops expired edit locks, and runs the health
    /// checks. Every step after opening is advisory; problems are logged
    /// and reported but never stop startup.
    ///
    /// # Errors
    ///
    /// Returns an error only if the database cannot be opened.
    pub fn startup(config: StoreConfig) -> Result<(RecordStore, StartupReport), StoreError> {
        info!("Starting record store: {}", config.database_path.display());
        let (mut store, restored_from) = Self::open_or_restore(config)?;

        let resumed: ResumeReport = Self::resume_pending_moves(&mut store).unwrap_or_else(|err| {
            error!("Failed to resume pending file moves: {}", err);
            ResumeReport::default()
        });

        let layout: Option<LayoutReport> = match migrate_attachment_layout(store.config()) {
            Ok(report) => Some(report),
            Err(err) => {
                error!("Attachment layout migration failed: {}", err);
                None
            }
        };

        let expired_locks: usize = store.cleanup_expired_locks().unwrap_or_else(|err| {
            warn!("Failed to remove expired edit locks: {}", err);
            0
        });

        let health: HealthReport = store.health_check()?;
        if health.healthy {
            info!("Startup health check passed");
        } else {
            for check in health.failures() {
                warn!(
                    check = %check.name,
                    "Startup health check failed: {}",
                    check.details.as_deref().unwrap_or("no details")
                );
            }
        }

        Ok((
            store,
            StartupReport {
                health,
                resumed,
                layout,
                expired_locks,
                restored_from,
            },
        ))
    }

    /// Opens the store, falling back to the local copy if the database is
    /// damaged.
    fn open_or_restore(
        config: StoreConfig,
    ) -> Result<(RecordStore, Option<PathBuf>), StoreError> {
        let fallback: PathBuf = config.fallback_dir.join(maintenance::backup::FALLBACK_FILE);
        let has_fallback: bool = fallback.is_file() && fallback != config.database_path;

        let mut persistence: Persistence = match Persistence::open(&config) {
            Ok(persistence) => persistence,
            Err(err) if err.is_corruption() && has_fallback => {
                error!("Database cannot be opened: {}", err);
                warn!("Restoring the local fallback copy {}", fallback.display());
                maintenance::restore_database(&fallback, &config.database_path, "corrupted")?;
                return Ok((RecordStore::open(config)?, Some(fallback)));
            }
            Err(err) => return Err(err.into()),
        };

        let damaged: bool = match persistence.health_check() {
            Ok(report) => report.check("quick_check").is_some_and(|check| !check.passed),
            Err(err) => err.is_corruption(),
        };
        if !damaged || !has_fallback {
            return Ok((RecordStore::with_persistence(persistence, config), None));
        }

        error!("Database failed its integrity check");
        let staged: StagedRestore =
            match maintenance::stage_restore(&fallback, &config.database_path) {
                Ok(staged) => staged,
                Err(err) => {
                    error!("Fallback copy is unusable, keeping the damaged database: {}", err);
                    return Ok((RecordStore::with_persistence(persistence, config), None));
                }
            };
        warn!("Restoring the local fallback copy {}", fallback.display());
        persistence.install_restore(&config, staged, "corrupted")?;
        Ok((RecordStore::with_persistence(persistence, config), Some(fallback)))
    }

    /// Replays outstanding steps of the pending file move ledger in order.
    ///
    /// Steps are cleared in order, so only the run of rows ending at a
    /// swap's last step is still outstanding. Rows before a gap in that run
    /// belong to steps that already ran; replaying them could move a path
    /// that a later step has since refilled, so they are only cleared.
    ///
    /// A step whose source is gone counts as done. A step whose source and
    /// destination both exist is left in the ledger and reported; the
    /// remaining steps of that swap are deferred.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read or updated.
    pub fn resume_pending_moves(store: &mut RecordStore) -> Result<ResumeReport, StoreError> {
        let pending: Vec<PendingFileMove> = store.persistence_mut().list_pending_moves()?;
        let mut report: ResumeReport = ResumeReport::default();
        if pending.is_empty() {
            return Ok(report);
        }

        info!(steps = pending.len(), "Resuming interrupted file moves");
        for steps in group_by_swap(pending) {
            let (stale, outstanding) = split_stale(steps);
            for step in stale {
                warn!(
                    swap_id = %step.swap_id,
                    step = step.step_no,
                    "Clearing ledger row of a step that already ran: {} -> {}",
                    step.from_path.display(),
                    step.to_path.display()
                );
                store.persistence_mut().complete_file_move(step.id)?;
                report.stale += 1;
            }
            Self::replay_swap(store, outstanding, &mut report)?;
        }

        if report.is_clean() {
            info!(completed = report.completed, "Interrupted file moves completed");
        }
        Ok(report)
    }

    fn replay_swap(
        store: &mut RecordStore,
        steps: Vec<PendingFileMove>,
        report: &mut ResumeReport,
    ) -> Result<(), StoreError> {
        let mut steps = steps.into_iter();
        for step in steps.by_ref() {
            match replay_move(&step.from_path, &step.to_path) {
                Ok(MoveOutcome::Renamed | MoveOutcome::AlreadyApplied) => {
                    store.persistence_mut().complete_file_move(step.id)?;
                    report.completed += 1;
                }
                Ok(MoveOutcome::Conflict) => {
                    warn!(
                        swap_id = %step.swap_id,
                        step = step.step_no,
                        "Cannot move {}: {} already exists",
                        step.from_path.display(),
                        step.to_path.display()
                    );
                    report.conflicts.push(step);
                    break;
                }
                Err(err) => {
                    error!(
                        swap_id = %step.swap_id,
                        step = step.step_no,
                        "Failed to move {}: {}",
                        step.from_path.display(),
                        err
                    );
                    report.failed.push(step);
                    break;
                }
            }
        }
        report.deferred += steps.count();
        Ok(())
    }

    /// Closes the store, taking the fallback backup first on a network
    /// share.
    pub fn shutdown(store: RecordStore) -> ShutdownReport {
        let keep: usize = store.config().backup_keep;
        Self::shutdown_with(store, move |source, fallback_dir| {
            maintenance::backup_to_fallback(source, fallback_dir, keep)
        })
    }

    /// Closes the store using `backup` for the shutdown backup.
    ///
    /// The backup runs on its own thread under the configured timeout. The
    /// store is checkpointed and closed whatever the backup does.
    pub fn shutdown_with<B>(store: RecordStore, backup: B) -> ShutdownReport
    where
        B: FnOnce(&Path, &Path) -> Result<PathBuf, PersistenceError> + Send + 'static,
    {
        let started: Instant = Instant::now();
        let config: &StoreConfig = store.config();

        let status: BackupStatus = if config.is_network_share() {
            let source: PathBuf = config.database_path.clone();
            let fallback_dir: PathBuf = config.fallback_dir.clone();
            let timeout: Duration = config.shutdown_backup_timeout();
            info!("Writing shutdown backup to {}", fallback_dir.display());

            match run_with_timeout(
                "shutdown-backup",
                move || backup(&source, &fallback_dir),
                timeout,
            ) {
                Some(Ok(path)) => {
                    info!("Shutdown backup written: {}", path.display());
                    BackupStatus::Completed(path)
                }
                Some(Err(err)) => {
                    error!("Shutdown backup failed: {}", err);
                    BackupStatus::Failed(err.to_string())
                }
                None => BackupStatus::TimedOut,
            }
        } else {
            BackupStatus::Skipped
        };

        store.close();
        ShutdownReport {
            backup: status,
            elapsed: started.elapsed(),
        }
    }
}

/// Groups ledger rows by swap, keeping the order swaps and steps were
/// recorded in.
fn group_by_swap(pending: Vec<PendingFileMove>) -> Vec<Vec<PendingFileMove>> {
    let mut groups: Vec<Vec<PendingFileMove>> = Vec::new();
    for step in pending {
        match groups
            .iter_mut()
            .find(|group| group.first().is_some_and(|first| first.swap_id == step.swap_id))
        {
            Some(group) => group.push(step),
            None => groups.push(vec![step]),
        }
    }
    for group in &mut groups {
        group.sort_by_key(|step| step.step_no);
    }
    groups
}

/// Splits the rows of one swap into stale rows and the outstanding run
/// that ends at the plan's last step.
pub(crate) fn split_stale(
    mut steps: Vec<PendingFileMove>,
) -> (Vec<PendingFileMove>, Vec<PendingFileMove>) {
    let mut expected: Option<i32> = steps.last().map(|step| step.step_count);
    let mut start: usize = steps.len();
    while start > 0 && Some(steps[start - 1].step_no) == expected {
        start -= 1;
        expected = expected.map(|step_no| step_no - 1);
    }
    let outstanding: Vec<PendingFileMove> = steps.split_off(start);
    (steps, outstanding)
}
