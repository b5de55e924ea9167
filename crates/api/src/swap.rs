// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Exchanging the sequence numbers of two employees.
//!
//! A swap runs through four stages:
//!
//! 1. **Validating** - read-only: authorize, resolve tokens, compute the new
//!    identifiers and plan every rename.
//! 2. **`InTransaction`** - one immediate transaction rewrites `employees`,
//!    `employee_files` and `audit_log.record_id`, and records the planned
//!    renames in the pending move ledger.
//! 3. **`FilesMoving`** - photos and folders are renamed through placeholder
//!    paths, then profile photos inside the moved folders take the new
//!    identifier; each completed rename clears its ledger row. The stage
//!    stops at the first rename or ledger update that fails.
//! 4. **Committed** - the `SWAP_EMP_ID` audit entry is written.
//!
//! Another user's live edit lock on either record rejects the swap.
//! Failures before the commit leave nothing behind. Failures after it are
//! reported as a [`StoreError::PartialSwap`] warning; the outstanding steps
//! stay in the ledger and are replayed at the next startup.

use emp_vault_audit::{Actor, AuditEntry};
use emp_vault_domain::{Capability, EmployeeId, resolve_token, swapped_identifiers};
use emp_vault_persistence::{
    EditLockData, PendingFileMove, Persistence, PersistenceError, PlannedMove, StoreConfig,
    SwapPlan, clock,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::error::StoreError;
use crate::files::{MoveOutcome, PHOTOS_SUBDIR, photo_paths, replay_move, with_stem};
use crate::permission::{AuthorizedActor, PermissionGate};

/// Where a swap is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapState {
    Idle,
    Validating,
    InTransaction,
    FilesMoving,
    Committed,
    /// Validation failed; nothing was touched.
    Rejected,
    /// The transaction failed and was rolled back.
    RolledBack,
    /// The transaction committed but some renames are outstanding.
    PartiallyRecovered,
}

/// The outcome of a swap that reached its commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapReport {
    /// The identifiers before the swap, in the order the tokens were given.
    pub old_ids: (EmployeeId, EmployeeId),
    /// The identifiers after the swap, matching `old_ids` record by record.
    pub new_ids: (EmployeeId, EmployeeId),
    /// The final state: `Committed` or `PartiallyRecovered`.
    pub state: SwapState,
    /// Renames performed on disk.
    pub files_moved: usize,
    /// Set when the file stage stopped early.
    pub warning: Option<StoreError>,
    /// False if the `SWAP_EMP_ID` audit entry could not be written.
    pub audit_recorded: bool,
}

/// A fully validated swap, ready to apply.
struct ValidatedSwap {
    actor: Actor,
    plan: SwapPlan,
}

/// Drives one identifier swap through its states.
pub struct IdentifierSwapTransaction<'a> {
    persistence: &'a mut Persistence,
    config: &'a StoreConfig,
    state: SwapState,
}

impl<'a> IdentifierSwapTransaction<'a> {
    /// Creates an idle swap over the given store.
    #[must_use]
    pub const fn new(persistence: &'a mut Persistence, config: &'a StoreConfig) -> Self {
        Self {
            persistence,
            config,
            state: SwapState::Idle,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> SwapState {
        self.state
    }

    /// Runs the swap.
    ///
    /// # Arguments
    ///
    /// * `username` - The acting user; needs `edit_employee` and
    ///   `delete_employee`
    /// * `first_token` - A full identifier or a bare sequence
    /// * `second_token` - A full identifier or a bare sequence
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or the transaction rolls back.
    /// A committed swap always returns `Ok`, with any file stage problem in
    /// [`SwapReport::warning`].
    pub fn execute(
        &mut self,
        username: &str,
        first_token: &str,
        second_token: &str,
    ) -> Result<SwapReport, StoreError> {
        self.transition(SwapState::Validating);
        let validated: ValidatedSwap = match self.validate(username, first_token, second_token) {
            Ok(validated) => validated,
            Err(err) => {
                warn!(first = first_token, second = second_token, "Swap rejected: {}", err);
                self.transition(SwapState::Rejected);
                return Err(err);
            }
        };
        let plan: &SwapPlan = &validated.plan;

        self.transition(SwapState::InTransaction);
        let ledger: Vec<PendingFileMove> = match self.persistence.apply_identifier_swap(plan) {
            Ok(ledger) => ledger,
            Err(err) => {
                error!(swap_id = %plan.swap_id, "Swap transaction rolled back: {}", err);
                self.transition(SwapState::RolledBack);
                return Err(err.into());
            }
        };
        info!(
            swap_id = %plan.swap_id,
            first = %plan.first,
            second = %plan.second,
            new_first = %plan.new_first,
            new_second = %plan.new_second,
            "Swap committed to database"
        );

        if self.config.is_network_share()
            && let Err(err) = self.persistence.checkpoint()
        {
            warn!(swap_id = %plan.swap_id, "Checkpoint after swap failed: {}", err);
        }

        self.transition(SwapState::FilesMoving);
        let persistence: &mut Persistence = &mut *self.persistence;
        let (files_moved, warning) = run_file_stage(&plan.swap_id, &ledger, |id| {
            persistence.complete_file_move(id)
        });
        if warning.is_some() {
            self.transition(SwapState::PartiallyRecovered);
        } else {
            self.transition(SwapState::Committed);
        }

        let entry: AuditEntry = AuditEntry::for_swap(
            validated.actor.clone(),
            (&plan.first, &plan.second),
            (&plan.new_first, &plan.new_second),
        );
        let audit_recorded: bool = match self.persistence.append_audit_entry(&entry) {
            Ok(_) => true,
            Err(err) => {
                error!(swap_id = %plan.swap_id, "Failed to record swap audit entry: {}", err);
                false
            }
        };

        Ok(SwapReport {
            old_ids: (plan.first, plan.second),
            new_ids: (plan.new_first, plan.new_second),
            state: self.state,
            files_moved,
            warning,
            audit_recorded,
        })
    }

    fn transition(&mut self, next: SwapState) {
        info!(from = ?self.state, to = ?next, "Swap state change");
        self.state = next;
    }

    fn validate(
        &mut self,
        username: &str,
        first_token: &str,
        second_token: &str,
    ) -> Result<ValidatedSwap, StoreError> {
        let authorized: AuthorizedActor = PermissionGate::authorize_all(
            &mut *self.persistence,
            username,
            &[Capability::EditEmployee, Capability::DeleteEmployee],
        )?;

        let known: Vec<EmployeeId> = self.persistence.list_identifiers()?;
        let first: EmployeeId = resolve_token(first_token, &known)?;
        let second: EmployeeId = resolve_token(second_token, &known)?;
        let (new_first, new_second) = swapped_identifiers(&first, &second)?;

        let now: String = clock::now()?;
        for id in [&first, &second] {
            let lock: Option<EditLockData> = self.persistence.get_edit_lock(&id.to_string())?;
            if let Some(lock) = lock
                && lock.locked_by != authorized.actor.username
                && lock.expires_at > now
            {
                return Err(StoreError::ValidationError(format!(
                    "{id} is being edited by {}",
                    lock.locked_by
                )));
            }
        }

        for new_id in [new_first, new_second] {
            if new_id != first && new_id != second && known.contains(&new_id) {
                return Err(StoreError::ValidationError(format!(
                    "{new_id} already belongs to another employee"
                )));
            }
        }

        let moves: Vec<PlannedMove> =
            plan_moves(self.config, (&first, &second), (&new_first, &new_second))?;
        check_destinations(&moves)?;

        let swap_id: String = format!("{}-{first}-{second}", clock::file_stamp()?);
        Ok(ValidatedSwap {
            plan: SwapPlan {
                swap_id,
                actor: authorized.actor.username.clone(),
                first,
                second,
                new_first,
                new_second,
                moves,
            },
            actor: authorized.actor,
        })
    }
}

/// Applies the ledger in order, clearing each row through `clear`.
///
/// Stops at the first rename or ledger update that fails and reports every
/// step from there on as outstanding. A step whose rename landed but whose
/// row could not be cleared is listed too; replaying it finds the source
/// gone and only clears the row.
pub(crate) fn run_file_stage<F>(
    swap_id: &str,
    ledger: &[PendingFileMove],
    mut clear: F,
) -> (usize, Option<StoreError>)
where
    F: FnMut(i64) -> Result<(), PersistenceError>,
{
    let mut files_moved: usize = 0;
    for (index, step) in ledger.iter().enumerate() {
        let failure: String = match replay_move(&step.from_path, &step.to_path) {
            Ok(MoveOutcome::Renamed | MoveOutcome::AlreadyApplied) => {
                files_moved += 1;
                match clear(step.id) {
                    Ok(()) => continue,
                    Err(err) => format!("ledger row for step {} not cleared: {err}", step.step_no),
                }
            }
            Ok(MoveOutcome::Conflict) => {
                format!("{} already exists", step.to_path.display())
            }
            Err(err) => format!("{}: {err}", step.from_path.display()),
        };

        error!(swap_id, step = step.step_no, "File stage stopped: {}", failure);
        let outstanding: Vec<String> = ledger[index..]
            .iter()
            .map(|m| format!("{} -> {}", m.from_path.display(), m.to_path.display()))
            .collect();
        return (
            files_moved,
            Some(StoreError::PartialSwap(format!(
                "{failure}; outstanding: {}",
                outstanding.join("; ")
            ))),
        );
    }
    (files_moved, None)
}

/// Plans the renames of a swap using the same three steps as the database:
/// `id1 -> TEMP_id1`, `id2 -> new2`, `TEMP_id1 -> new1`.
///
/// Each moved folder is followed by renames of its
/// `photos/profile_<old>.<ext>` files to the new identifier, applied at the
/// folder's new location.
fn plan_moves(
    config: &StoreConfig,
    originals: (&EmployeeId, &EmployeeId),
    swapped: (&EmployeeId, &EmployeeId),
) -> Result<Vec<PlannedMove>, StoreError> {
    let (first, second) = originals;
    let (new_first, new_second) = swapped;
    let placeholder: String = first.placeholder();

    let mut sources_first: Vec<PathBuf> = photo_paths(&config.photos_dir, &first.to_string())?;
    let mut sources_second: Vec<PathBuf> = photo_paths(&config.photos_dir, &second.to_string())?;
    let mut inner_renames: Vec<PlannedMove> = Vec::new();
    for (id, new_id, sources) in [
        (first, new_first, &mut sources_first),
        (second, new_second, &mut sources_second),
    ] {
        let folder: PathBuf = config.files_dir.join(id.to_string());
        if folder.exists() {
            let new_folder: PathBuf = config.files_dir.join(new_id.to_string());
            inner_renames.extend(profile_renames(&folder, id, &new_folder, new_id)?);
            sources.push(folder);
        }
    }

    let mut moves: Vec<PlannedMove> = Vec::new();
    for source in &sources_first {
        moves.push(PlannedMove {
            from_path: source.clone(),
            to_path: with_stem(source, &placeholder),
        });
    }
    for source in &sources_second {
        moves.push(PlannedMove {
            from_path: source.clone(),
            to_path: with_stem(source, &new_second.to_string()),
        });
    }
    for source in &sources_first {
        moves.push(PlannedMove {
            from_path: with_stem(source, &placeholder),
            to_path: with_stem(source, &new_first.to_string()),
        });
    }
    moves.extend(inner_renames);
    Ok(moves)
}

/// Plans `photos/profile_<old>.<ext> -> photos/profile_<new>.<ext>` for a
/// folder moving from `folder` to `new_folder`.
fn profile_renames(
    folder: &Path,
    id: &EmployeeId,
    new_folder: &Path,
    new_id: &EmployeeId,
) -> Result<Vec<PlannedMove>, StoreError> {
    let old_stem: String = format!("profile_{id}");
    let new_stem: String = format!("profile_{new_id}");
    let photos: PathBuf = folder.join(PHOTOS_SUBDIR);

    let mut renames: Vec<PlannedMove> = Vec::new();
    for source in photo_paths(&photos, &old_stem)? {
        // The folder already holds a photo under the new name.
        let clash: PathBuf = with_stem(&source, &new_stem);
        if clash.exists() {
            return Err(StoreError::ValidationError(format!(
                "{} already exists",
                clash.display()
            )));
        }
        let Some(file_name) = source.file_name() else {
            continue;
        };
        let moved: PathBuf = new_folder.join(PHOTOS_SUBDIR).join(file_name);
        renames.push(PlannedMove {
            to_path: with_stem(&moved, &new_stem),
            from_path: moved,
        });
    }
    Ok(renames)
}

/// Rejects a plan whose renames would overwrite an existing path.
///
/// A destination may exist only if an earlier step moves it, or a folder
/// holding it, away.
fn check_destinations(moves: &[PlannedMove]) -> Result<(), StoreError> {
    let mut vacated: HashSet<&Path> = HashSet::new();
    let mut filled: HashSet<&Path> = HashSet::new();
    for step in moves {
        let target: &Path = &step.to_path;
        let occupied_on_disk: bool =
            target.exists() && !target.ancestors().any(|path| vacated.contains(path));
        if occupied_on_disk || filled.contains(target) {
            return Err(StoreError::ValidationError(format!(
                "{} already exists",
                target.display()
            )));
        }
        vacated.insert(&step.from_path);
        filled.remove(step.from_path.as_path());
        filled.insert(target);
    }
    Ok(())
}
