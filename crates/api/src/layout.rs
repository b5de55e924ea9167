// Copyright (C) 2026 Fred Clausen
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Migration of employee folders to the `photos/` + `files/` layout.
//!
//! Older stores kept every attachment loose in `<files-dir>/<identifier>/`
//! and profile photos only in `<photos-dir>`. The migration:
//!
//! - creates `photos/` and `files/` in every employee folder,
//! - moves loose images into `photos/` and everything else into `files/`,
//! - copies each legacy `<photos-dir>/<identifier>.<ext>` into the folder as
//!   `photos/profile_<identifier>.<ext>`.
//!
//! Nothing is ever overwritten, so running it again is a no-op.

use emp_vault_domain::EmployeeId;
use emp_vault_persistence::StoreConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::files::{FILES_SUBDIR, PHOTOS_SUBDIR};

/// File extensions sorted into `photos/`.
const IMAGE_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "gif", "bmp", "webp", "tiff", "ico"];

/// What one migration run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutReport {
    /// Folders that gained the subfolders.
    pub folders_prepared: usize,
    /// Loose files moved into a subfolder.
    pub files_moved: usize,
    /// Legacy photos copied into a folder.
    pub photos_copied: usize,
    /// Files left where they were: the destination exists or the move failed.
    pub skipped: Vec<PathBuf>,
}

impl LayoutReport {
    /// Returns true if the run changed nothing on disk.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.folders_prepared == 0 && self.files_moved == 0 && self.photos_copied == 0
    }
}

fn is_image(path: &Path) -> bool {
    path.extension().is_some_and(|ext| {
        let ext: String = ext.to_string_lossy().to_lowercase();
        IMAGE_EXTENSIONS.contains(&ext.as_str())
    })
}

/// Reshapes the attachment layout described by `config`.
///
/// # Errors
///
/// Returns a storage error if a directory cannot be read or created.
pub fn migrate_attachment_layout(config: &StoreConfig) -> Result<LayoutReport, StoreError> {
    let mut report: LayoutReport = LayoutReport::default();

    if config.files_dir.is_dir() {
        for entry in fs::read_dir(&config.files_dir)? {
            let folder: PathBuf = entry?.path();
            if folder.is_dir() {
                prepare_folder(&folder, &mut report)?;
            }
        }
    }

    if config.photos_dir.is_dir() {
        for entry in fs::read_dir(&config.photos_dir)? {
            let photo: PathBuf = entry?.path();
            if photo.is_file() {
                copy_legacy_photo(&photo, &config.files_dir, &mut report)?;
            }
        }
    }

    if report.is_noop() {
        debug!("Attachment layout already migrated");
    } else {
        info!(
            folders = report.folders_prepared,
            moved = report.files_moved,
            copied = report.photos_copied,
            "Attachment layout migrated"
        );
    }
    Ok(report)
}

fn prepare_folder(folder: &Path, report: &mut LayoutReport) -> Result<(), StoreError> {
    let photos: PathBuf = folder.join(PHOTOS_SUBDIR);
    let files: PathBuf = folder.join(FILES_SUBDIR);
    if photos.is_dir() && files.is_dir() {
        return Ok(());
    }

    fs::create_dir_all(&photos)?;
    fs::create_dir_all(&files)?;
    report.folders_prepared += 1;

    for entry in fs::read_dir(folder)? {
        let loose: PathBuf = entry?.path();
        if !loose.is_file() {
            continue;
        }
        let Some(name) = loose.file_name() else {
            continue;
        };
        let target: PathBuf = if is_image(&loose) {
            photos.join(name)
        } else {
            files.join(name)
        };
        if target.exists() {
            report.skipped.push(loose);
            continue;
        }
        match fs::rename(&loose, &target) {
            Ok(()) => report.files_moved += 1,
            Err(err) => {
                warn!("Failed to move {}: {}", loose.display(), err);
                report.skipped.push(loose);
            }
        }
    }
    Ok(())
}

fn copy_legacy_photo(
    photo: &Path,
    files_dir: &Path,
    report: &mut LayoutReport,
) -> Result<(), StoreError> {
    let (Some(stem), Some(name)) = (photo.file_stem(), photo.file_name()) else {
        return Ok(());
    };
    let Ok(id) = stem.to_string_lossy().parse::<EmployeeId>() else {
        debug!("Ignoring {}: not named after an employee", photo.display());
        return Ok(());
    };

    let folder: PathBuf = files_dir.join(id.to_string());
    let target: PathBuf = folder
        .join(PHOTOS_SUBDIR)
        .join(format!("profile_{}", name.to_string_lossy()));
    if target.exists() {
        return Ok(());
    }
    fs::create_dir_all(folder.join(PHOTOS_SUBDIR))?;
    fs::create_dir_all(folder.join(FILES_SUBDIR))?;
    fs::copy(photo, &target)?;
    report.photos_copied += 1;
    Ok(())
}
