//! Lazy depth-first traversal of a configuration root.

use crate::filters::{EntryFilter, FilterDecision};
use codesync_core::{ConfigRoot, Result, SyncError};
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// A regular file selected for transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path on disk
    pub path: PathBuf,

    /// Path relative to the root, forward-slash separated
    pub relative: String,
}

/// Walks `root` depth-first, yielding every file the filter includes.
///
/// Excluded directories are pruned without being read. The walk is lazy:
/// nothing is touched until the iterator is advanced, and an I/O error is
/// yielded in place so the consumer can stop at the first one. Symlinks are
/// neither followed nor yielded.
pub fn walk_root<'a>(
    root: &'a ConfigRoot,
    filter: &'a EntryFilter,
) -> impl Iterator<Item = Result<SourceFile>> + 'a {
    let base = root.path();

    WalkDir::new(base)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| {
            let relative = entry.path().strip_prefix(base).unwrap_or(entry.path());
            filter.decide(relative, entry.file_type().is_dir()) == FilterDecision::Include
        })
        .filter_map(move |entry| match entry {
            Ok(entry) if entry.file_type().is_file() => {
                let relative = entry.path().strip_prefix(base).unwrap_or(entry.path());
                let file = match to_archive_path(relative) {
                    Some(relative) => Ok(SourceFile {
                        relative,
                        path: entry.path().to_path_buf(),
                    }),
                    None => Err(SyncError::encode(
                        entry.path(),
                        io::Error::new(io::ErrorKind::InvalidData, "file name is not valid UTF-8"),
                    )),
                };
                Some(file)
            }
            Ok(entry) => {
                if entry.path_is_symlink() {
                    tracing::debug!("Skipping symlink: {}", entry.path().display());
                }
                None
            }
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| base.to_path_buf());
                Some(Err(SyncError::encode(path, io::Error::from(err))))
            }
        })
}

/// Joins the normal components of `relative` with forward slashes.
///
/// Returns `None` when a component is not valid UTF-8.
pub fn to_archive_path(relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        if let Component::Normal(name) = component {
            parts.push(name.to_str()?);
        }
    }
    Some(parts.join("/"))
}
