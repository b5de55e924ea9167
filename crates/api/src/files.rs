// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! On-disk layout of photos and attachment folders.
//!
//! - `<photos-dir>/<identifier>.<ext>` holds the profile photo.
//! - `<files-dir>/<identifier>/files/` holds attachments.
//! - `<files-dir>/<identifier>/photos/` holds additional photos.

use emp_vault_domain::EmployeeId;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Subfolder of an employee folder holding attachments.
pub const FILES_SUBDIR: &str = "files";

/// Subfolder of an employee folder holding photos.
pub const PHOTOS_SUBDIR: &str = "photos";

/// The result of applying one rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The source was renamed to the destination.
    Renamed,
    /// The source is gone; the rename already happened or has nothing to do.
    AlreadyApplied,
    /// Both paths exist; the rename would overwrite something.
    Conflict,
}

/// Applies one rename, tolerating a previous partial run.
///
/// - Source missing: nothing to do, whether or not the destination exists.
/// - Both present: conflict, nothing is touched.
/// - Otherwise the source is renamed, creating the destination's parent.
///
/// # Errors
///
/// Returns an error if the rename itself fails.
pub fn replay_move(from: &Path, to: &Path) -> io::Result<MoveOutcome> {
    if !from.exists() {
        return Ok(MoveOutcome::AlreadyApplied);
    }
    if to.exists() {
        return Ok(MoveOutcome::Conflict);
    }
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(from, to)?;
    debug!("Renamed {} -> {}", from.display(), to.display());
    Ok(MoveOutcome::Renamed)
}

/// Returns the folder of an employee.
#[must_use]
pub fn employee_folder(files_dir: &Path, id: &EmployeeId) -> PathBuf {
    files_dir.join(id.to_string())
}

/// Returns where an attachment of `id` named `file_name` is stored.
#[must_use]
pub fn attachment_path(files_dir: &Path, id: &str, file_name: &str) -> PathBuf {
    files_dir.join(id).join(FILES_SUBDIR).join(file_name)
}

/// Lists every `<photos-dir>/<id>.<ext>` file, sorted.
///
/// A missing photos directory yields an empty list.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be read.
pub fn photo_paths(photos_dir: &Path, id: &str) -> io::Result<Vec<PathBuf>> {
    if !photos_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut found: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(photos_dir)? {
        let path: PathBuf = entry?.path();
        if path.is_file() && path.file_stem().is_some_and(|stem| stem == id) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Returns `path` with its file stem replaced by `stem`, keeping the
/// extension.
#[must_use]
pub fn with_stem(path: &Path, stem: &str) -> PathBuf {
    let file_name: String = match path.extension() {
        Some(ext) => format!("{stem}.{}", ext.to_string_lossy()),
        None => stem.to_string(),
    };
    path.with_file_name(file_name)
}
