//! Error types for codesync

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using codesync-core's error type
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors raised anywhere in the transfer pipeline.
///
/// Every variant is terminal to the operation that raised it; nothing in the
/// library retries. The orchestrators decide how failures are reported.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The settings root could not be located on this machine
    #[error("Editor settings directory not found: {reason}")]
    ConfigNotFound { reason: String },

    /// Host operating system has no known settings location
    #[error("Unsupported platform: {os}")]
    UnsupportedPlatform { os: String },

    /// Invalid configuration value or file
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A source file could not be read while building the archive
    #[error("Failed to archive '{}': {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An archive entry would land outside its destination root
    #[error("Archive entry '{entry}' escapes the destination directory")]
    PathTraversal { entry: String },

    /// The received stream is not a complete, well-formed archive
    #[error("Received archive is corrupt or truncated: {message}")]
    InvalidArchive { message: String },

    /// The safety copy of an existing destination could not be made
    #[error("Failed to back up '{}': {source}", path.display())]
    BackupFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing an extracted entry to disk failed
    #[error("Failed to write '{}': {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Connection, timeout or non-success HTTP status
    #[error("Transfer failed: {message}")]
    Transport { message: String },

    /// The sync server could not be started or crashed
    #[error("Server error: {message}")]
    Server { message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Create a config not found error
    pub fn config_not_found(reason: impl Into<String>) -> Self {
        Self::ConfigNotFound {
            reason: reason.into(),
        }
    }

    /// Create an unsupported platform error
    pub fn unsupported_platform(os: impl Into<String>) -> Self {
        Self::UnsupportedPlatform { os: os.into() }
    }

    /// Create an invalid config error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an encode error for a source path
    pub fn encode(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Encode {
            path: path.into(),
            source,
        }
    }

    /// Create a path traversal error for an archive entry name
    pub fn path_traversal(entry: impl Into<String>) -> Self {
        Self::PathTraversal {
            entry: entry.into(),
        }
    }

    /// Create an invalid archive error
    pub fn invalid_archive(message: impl Into<String>) -> Self {
        Self::InvalidArchive {
            message: message.into(),
        }
    }

    /// Create a backup failure for the directory that could not be moved aside
    pub fn backup_failed(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::BackupFailed {
            path: path.into(),
            source,
        }
    }

    /// Create a decode error for a destination path
    pub fn decode(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Decode {
            path: path.into(),
            source,
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a server error
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Whether this failure can have left a destination partially overwritten.
    ///
    /// Only extraction writes to the destination, and extraction only starts
    /// after every backup completed.
    pub fn touched_destination(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}
