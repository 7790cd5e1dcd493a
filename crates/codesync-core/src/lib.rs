//! # codesync-core
//!
//! Core library for codesync providing:
//! - Configuration roots and the labels used inside transfer archives
//! - Platform-specific resolution of the editor settings directories
//! - The shared error type for the transfer pipeline
//! - Configuration file loading (~/.codesync/config.yaml)

pub mod config;
pub mod error;
pub mod platform;
pub mod root;
pub mod utils;

pub use config::{SyncConfig, DEFAULT_PORT};
pub use error::{Result, SyncError};
pub use platform::{extensions_dir, resolve_roots, user_settings_dir, PathContext, Platform};
pub use root::{ConfigRoot, EXTENSIONS_LABEL, USER_LABEL};
pub use utils::get_home_dir;
