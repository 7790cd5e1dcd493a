//! Settings types controlling network and transfer behaviour

use serde::{Deserialize, Serialize};

/// Default HTTP port for both server and client
pub const DEFAULT_PORT: u16 = 8080;

/// Default gzip compression level (6 = balanced speed/ratio)
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Complete codesync configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SyncConfig {
    /// Network and HTTP configuration
    #[serde(default)]
    pub network: NetworkConfig,

    /// What is transferred and how it is encoded
    #[serde(default)]
    pub transfer: TransferConfig,
}

/// Network and HTTP configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NetworkConfig {
    /// Port the server listens on and the client connects to
    #[serde(default = "default_port")]
    pub port: u16,

    /// Address the server binds
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Client request timeout in seconds (covers the whole download)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Seconds in-flight transfers may keep streaming after shutdown starts
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,

    /// User agent string for HTTP requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            request_timeout_secs: default_request_timeout(),
            shutdown_grace_secs: default_shutdown_grace(),
            user_agent: default_user_agent(),
        }
    }
}

/// Transfer content and encoding configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TransferConfig {
    /// Transfer the installed extensions directory alongside User settings
    #[serde(default = "default_include_extensions")]
    pub include_extensions: bool,

    /// Additional glob patterns excluded from the archive
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Gzip compression level (1-9)
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,

    /// Size of the chunks the server hands to the HTTP body
    #[serde(default = "default_stream_chunk_bytes")]
    pub stream_chunk_bytes: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            include_extensions: default_include_extensions(),
            exclude: Vec::new(),
            compression_level: default_compression_level(),
            stream_chunk_bytes: default_stream_chunk_bytes(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_request_timeout() -> u64 {
    300 // 5 minutes
}
fn default_shutdown_grace() -> u64 {
    5
}
fn default_user_agent() -> String {
    format!(
        "codesync/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}
fn default_include_extensions() -> bool {
    true
}
fn default_compression_level() -> u32 {
    DEFAULT_COMPRESSION_LEVEL
}
fn default_stream_chunk_bytes() -> usize {
    64 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.network.port, 8080);
        assert_eq!(config.network.bind_address, "0.0.0.0");
        assert_eq!(config.network.shutdown_grace_secs, 5);
        assert!(config.network.user_agent.starts_with("codesync/"));
        assert!(config.transfer.include_extensions);
        assert!(config.transfer.exclude.is_empty());
        assert_eq!(config.transfer.compression_level, 6);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
network:
  port: 9000
transfer:
  exclude:
    - "**/*.log"
"#;
        let config: SyncConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.network.port, 9000);
        assert_eq!(config.network.request_timeout_secs, 300);
        assert_eq!(config.transfer.exclude, vec!["**/*.log".to_string()]);
        assert!(config.transfer.include_extensions);
    }
}
