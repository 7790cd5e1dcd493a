//! Moving existing destinations aside before extraction.
//!
//! A backup is a rename of the destination to a sibling named
//! `<dest>_backup_<YYYYmmdd-HHMMSS>`. Renames never copy data, so a backup is
//! either complete or did not happen. When several roots are backed up
//! together, a failure reverts the renames that already succeeded.

use codesync_core::{Result, SyncError};
use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Separator between the original name and the timestamp
pub const BACKUP_MARKER: &str = "_backup_";

/// chrono format of the timestamp suffix
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Signature of the rename used to move a destination aside
pub type RenameFn = fn(&Path, &Path) -> io::Result<()>;

fn std_rename(from: &Path, to: &Path) -> io::Result<()> {
    fs::rename(from, to)
}

/// A destination that was moved aside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSnapshot {
    original: PathBuf,
    backup: PathBuf,
}

impl BackupSnapshot {
    /// Where the directory lived before the backup.
    pub fn original(&self) -> &Path {
        &self.original
    }

    /// Where the directory lives now.
    pub fn backup(&self) -> &Path {
        &self.backup
    }

    /// Moves the backup back to its original location.
    pub fn revert(&self) -> Result<()> {
        fs::rename(&self.backup, &self.original)
            .map_err(|e| SyncError::backup_failed(&self.backup, e))
    }
}

/// Creates timestamped backups of destination directories.
#[derive(Clone)]
pub struct BackupManager {
    rename: RenameFn,
}

impl fmt::Debug for BackupManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupManager").finish_non_exhaustive()
    }
}

impl BackupManager {
    /// Creates a manager that renames with [`std::fs::rename`].
    pub fn new() -> Self {
        Self { rename: std_rename }
    }

    /// Creates a manager with a custom rename operation.
    pub fn with_rename(rename: RenameFn) -> Self {
        Self { rename }
    }

    /// Moves `path` aside. Returns `None` when there is nothing to back up.
    pub fn snapshot(&self, path: &Path) -> Result<Option<BackupSnapshot>> {
        match fs::symlink_metadata(path) {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(SyncError::backup_failed(path, err)),
        }

        let backup = available_backup_path(path);
        (self.rename)(path, &backup).map_err(|e| SyncError::backup_failed(path, e))?;

        info!("Backed up {} to {}", path.display(), backup.display());
        Ok(Some(BackupSnapshot {
            original: path.to_path_buf(),
            backup,
        }))
    }

    /// Moves every path aside, or none of them.
    pub fn snapshot_all<'a, I>(&self, paths: I) -> Result<Vec<BackupSnapshot>>
    where
        I: IntoIterator<Item = &'a Path>,
    {
        let mut taken: Vec<BackupSnapshot> = Vec::new();

        for path in paths {
            match self.snapshot(path) {
                Ok(Some(snapshot)) => taken.push(snapshot),
                Ok(None) => {}
                Err(err) => {
                    for snapshot in taken.iter().rev() {
                        if let Err(revert_err) = snapshot.revert() {
                            warn!(
                                "Failed to restore {} from {}: {}",
                                snapshot.original.display(),
                                snapshot.backup.display(),
                                revert_err
                            );
                        }
                    }
                    return Err(err);
                }
            }
        }

        Ok(taken)
    }
}

impl Default for BackupManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Backup location for `path` at the current local time.
pub fn backup_path_for(path: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format(BACKUP_TIMESTAMP_FORMAT);
    let mut name = OsString::from(path.as_os_str());
    name.push(format!("{}{}", BACKUP_MARKER, stamp));
    PathBuf::from(name)
}

/// Like [`backup_path_for`], with a numeric suffix when two backups land in
/// the same second.
fn available_backup_path(path: &Path) -> PathBuf {
    let base = backup_path_for(path);
    if fs::symlink_metadata(&base).is_err() {
        return base;
    }

    let mut counter = 2u32;
    loop {
        let mut name = base.clone().into_os_string();
        name.push(format!("-{}", counter));
        let candidate = PathBuf::from(name);
        if fs::symlink_metadata(&candidate).is_err() {
            return candidate;
        }
        counter += 1;
    }
}
