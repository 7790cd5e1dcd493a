//! Utility functions shared across CLI commands

use anyhow::Result;
use camino::Utf8Path;
use codesync_core::SyncConfig;

/// Loads the configuration and applies CLI flag overrides on top.
pub fn load_config(path: Option<&Utf8Path>, port: Option<u16>) -> Result<SyncConfig> {
    let mut config = SyncConfig::load(path)?;

    if let Some(port) = port {
        config.network.port = port;
    }

    Ok(config)
}

/// Human-readable byte size
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
