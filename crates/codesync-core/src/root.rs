//! Configuration roots: the directory trees a sync transfers.

use std::fmt;
use std::path::{Path, PathBuf};

/// Label of the main settings root ("User" directory).
pub const USER_LABEL: &str = "User";

/// Label of the installed-extensions root.
pub const EXTENSIONS_LABEL: &str = "extensions";

/// A directory subtree subject to transfer.
///
/// A labeled root contributes entries named `label/relative/path` to the
/// archive; an unlabeled root contributes bare relative paths and is only
/// meaningful when it is the single root of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRoot {
    label: Option<String>,
    path: PathBuf,
}

impl ConfigRoot {
    /// Creates a root whose entries are prefixed with `label`.
    pub fn labeled(label: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            label: Some(label.into()),
            path: path.into(),
        }
    }

    /// Creates a root whose entries carry no prefix.
    pub fn unlabeled(path: impl Into<PathBuf>) -> Self {
        Self {
            label: None,
            path: path.into(),
        }
    }

    /// The archive prefix for this root, if any.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Absolute filesystem path of the root.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Archive entry name for a forward-slash path relative to this root.
    pub fn archive_name(&self, relative: &str) -> String {
        match &self.label {
            Some(label) => format!("{}/{}", label, relative),
            None => relative.to_string(),
        }
    }
}

impl fmt::Display for ConfigRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Some(label) => write!(f, "{} ({})", label, self.path.display()),
            None => write!(f, "{}", self.path.display()),
        }
    }
}
