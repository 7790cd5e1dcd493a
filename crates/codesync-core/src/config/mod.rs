//! Configuration loading and management

mod loader;
mod types;

pub use loader::{ConfigLoader, CONFIG_FILE_NAME};
pub use types::{
    NetworkConfig, SyncConfig, TransferConfig, DEFAULT_COMPRESSION_LEVEL, DEFAULT_PORT,
};

impl SyncConfig {
    /// Load configuration from the default location or an explicit file
    pub fn load(path: Option<&camino::Utf8Path>) -> crate::Result<Self> {
        ConfigLoader::new().load(path)
    }
}
