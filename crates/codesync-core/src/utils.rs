//! Shared utility functions for codesync crates

use std::path::PathBuf;

/// Directory (under the home directory) holding the codesync config file
pub const CONFIG_DIR_NAME: &str = ".codesync";

/// Get the user's home directory
///
/// Prefers the HOME environment variable over dirs::home_dir() so that an
/// overridden HOME (sandboxes, test harnesses, sudo -E) is honoured the same
/// way shell tooling honours it.
pub fn get_home_dir() -> Option<PathBuf> {
    if let Some(home) = std::env::var_os("HOME").filter(|h| !h.is_empty()) {
        return Some(PathBuf::from(home));
    }

    dirs::home_dir()
}

/// Default location of the codesync configuration directory (~/.codesync)
pub fn default_config_dir() -> Option<PathBuf> {
    get_home_dir().map(|home| home.join(CONFIG_DIR_NAME))
}
