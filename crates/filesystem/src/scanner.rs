//! Recursive folder scanning and upload plan construction.

use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use swiftdesk_common::{folder_name, object_name_for, to_posix_name};

/// Errors from scanning a local folder.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("Failed to read {path}: {message}")]
    Io { path: PathBuf, message: String },
}

/// A regular file found under a scanned folder.
#[derive(Debug, Clone)]
pub struct LocalFile {
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Path relative to the scanned folder.
    pub relative_path: PathBuf,
    /// Size in bytes.
    pub size: u64,
}

/// One file mapped to its destination object name.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub local_path: PathBuf,
    pub object_name: String,
    pub size: u64,
}

/// A set of files ready to submit as an upload batch.
#[derive(Debug, Clone, Default)]
pub struct UploadPlan {
    pub items: Vec<UploadItem>,
    /// Sum of item sizes, used for the quota pre-flight.
    pub total_bytes: u64,
}

impl UploadPlan {
    fn from_files(files: Vec<LocalFile>, base: &str) -> Self {
        let mut plan: UploadPlan = UploadPlan::default();
        for file in files {
            plan.total_bytes += file.size;
            plan.items.push(UploadItem {
                object_name: object_name_for(base, &file.relative_path),
                local_path: file.path,
                size: file.size,
            });
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Recursively list the regular files under `root`.
///
/// Unreadable entries (permission errors, races with concurrent deletes)
/// are logged and skipped rather than failing the whole scan. Symlinks are
/// not followed.
pub fn scan_folder(root: &Path) -> Result<Vec<LocalFile>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let mut files: Vec<LocalFile> = Vec::new();
    for entry in WalkDir::new(root) {
        let entry: walkdir::DirEntry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("skipping unreadable entry under {}: {}", root.display(), err);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                log::warn!("skipping {}: {}", entry.path().display(), err);
                continue;
            }
        };
        let relative_path: PathBuf = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| ScanError::Io {
                path: entry.path().to_path_buf(),
                message: e.to_string(),
            })?
            .to_path_buf();
        files.push(LocalFile {
            path: entry.path().to_path_buf(),
            relative_path,
            size: metadata.len(),
        });
    }
    // Stable order regardless of directory iteration order.
    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(files)
}

/// Plan a folder upload: object names keep the folder's own name as their
/// leading segment, so uploading `/tmp/photos` produces `photos/2024/a.jpg`.
pub fn plan_folder_upload(folder: &Path) -> Result<UploadPlan, ScanError> {
    let base: String = folder_name(&to_posix_name(folder)).to_string();
    let files: Vec<LocalFile> = scan_folder(folder)?;
    Ok(UploadPlan::from_files(files, &base))
}

/// Plan a bulk-drop upload: the dropped folder becomes a container, so
/// object names are relative to the folder itself (`2024/a.jpg`).
pub fn plan_drop_upload(folder: &Path) -> Result<UploadPlan, ScanError> {
    let files: Vec<LocalFile> = scan_folder(folder)?;
    Ok(UploadPlan::from_files(files, ""))
}

/// Plan a backup upload: names are `{stamp}/{folder_name}/{relative}` so
/// each run lands under its own timestamp prefix and runs never collide.
pub fn plan_backup_upload(folder: &Path, stamp: &str) -> Result<UploadPlan, ScanError> {
    let base: String = format!("{}/{}", stamp, folder_name(&to_posix_name(folder)));
    let files: Vec<LocalFile> = scan_folder(folder)?;
    Ok(UploadPlan::from_files(files, &base))
}
