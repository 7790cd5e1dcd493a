//! Platform path resolution
//!
//! Maps the host operating system to the directories the editor uses for
//! its "User" settings and its installed extensions. Resolution is a pure
//! function of a [`Platform`] and a [`PathContext`] snapshot of the
//! environment, so every platform can be exercised from any host.

use crate::error::{Result, SyncError};
use crate::root::{ConfigRoot, EXTENSIONS_LABEL, USER_LABEL};
use crate::utils::get_home_dir;
use std::fmt;
use std::path::PathBuf;

/// Editor application directory name
const APP_DIR: &str = "Code";

/// Settings directory name inside the application directory
const USER_DIR: &str = "User";

/// Host operating system
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Windows
    Windows,
    /// macOS (Darwin)
    MacOS,
    /// Linux
    Linux,
    /// Anything else, carrying the OS identifier
    Other(String),
}

impl Platform {
    /// Platform of the running process
    pub fn current() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Maps an OS identifier (as in `std::env::consts::OS`) to a platform
    pub fn from_os(os: &str) -> Self {
        match os {
            "windows" => Self::Windows,
            "macos" => Self::MacOS,
            "linux" => Self::Linux,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows => write!(f, "windows"),
            Self::MacOS => write!(f, "macos"),
            Self::Linux => write!(f, "linux"),
            Self::Other(os) => write!(f, "{}", os),
        }
    }
}

/// Environment lookups the resolver depends on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathContext {
    /// Per-user application data directory (`APPDATA` on Windows)
    pub app_data: Option<PathBuf>,

    /// The invoking user's home directory
    pub home: Option<PathBuf>,
}

impl PathContext {
    /// Snapshot of the current process environment
    pub fn from_env() -> Self {
        Self {
            app_data: std::env::var_os("APPDATA")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            home: get_home_dir(),
        }
    }

    fn require_home(&self) -> Result<PathBuf> {
        self.home
            .clone()
            .ok_or_else(|| SyncError::config_not_found("could not determine home directory"))
    }
}

/// Absolute path of the editor's "User" settings directory
pub fn user_settings_dir(platform: &Platform, ctx: &PathContext) -> Result<PathBuf> {
    match platform {
        Platform::Windows => {
            let app_data = ctx
                .app_data
                .clone()
                .ok_or_else(|| SyncError::config_not_found("APPDATA is not set"))?;
            Ok(app_data.join(APP_DIR).join(USER_DIR))
        }
        Platform::MacOS => Ok(ctx
            .require_home()?
            .join("Library")
            .join("Application Support")
            .join(APP_DIR)
            .join(USER_DIR)),
        Platform::Linux => Ok(ctx
            .require_home()?
            .join(".config")
            .join(APP_DIR)
            .join(USER_DIR)),
        Platform::Other(os) => Err(SyncError::unsupported_platform(os.clone())),
    }
}

/// Absolute path of the editor's installed-extensions directory
pub fn extensions_dir(platform: &Platform, ctx: &PathContext) -> Result<PathBuf> {
    match platform {
        Platform::Windows | Platform::MacOS | Platform::Linux => {
            Ok(ctx.require_home()?.join(".vscode").join("extensions"))
        }
        Platform::Other(os) => Err(SyncError::unsupported_platform(os.clone())),
    }
}

/// Resolves the labeled roots a sync transfers on this platform
pub fn resolve_roots(
    platform: &Platform,
    ctx: &PathContext,
    include_extensions: bool,
) -> Result<Vec<ConfigRoot>> {
    let mut roots = vec![ConfigRoot::labeled(
        USER_LABEL,
        user_settings_dir(platform, ctx)?,
    )];

    if include_extensions {
        roots.push(ConfigRoot::labeled(
            EXTENSIONS_LABEL,
            extensions_dir(platform, ctx)?,
        ));
    }

    tracing::debug!("Resolved {} config root(s) for {}", roots.len(), platform);
    Ok(roots)
}
