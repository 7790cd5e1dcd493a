//! Sync client: fetch, validate, back up, then write.
//!
//! The order of these steps is the safety guarantee of a sync. Nothing on
//! disk changes until the whole archive has arrived and validated, and no
//! destination is written until every destination that will receive
//! entries has been moved aside.

use bytes::Bytes;
use codesync_archive::{BackupManager, BackupSnapshot, DecodedArchive, ExtractStats};
use codesync_core::{ConfigRoot, Result, SyncConfig, SyncError};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::CONTENT_LENGTH;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::{debug, info};

use crate::server::SYNC_PATH;

/// Client settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Port used when the server address carries none
    pub port: u16,

    /// Timeout covering connect and the whole download
    pub timeout: Duration,

    /// User agent string sent with the request
    pub user_agent: String,

    /// Show a download progress bar
    pub show_progress: bool,
}

impl ClientOptions {
    /// Client settings from a loaded configuration
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            port: config.network.port,
            timeout: Duration::from_secs(config.network.request_timeout_secs),
            user_agent: config.network.user_agent.clone(),
            show_progress: true,
        }
    }

    /// Sets whether to show progress.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

/// Outcome of a completed sync.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// URL the archive was fetched from
    pub url: String,

    /// Compressed bytes received
    pub bytes_received: u64,

    /// Entries in the received archive
    pub entry_count: usize,

    /// Destinations moved aside before writing
    pub backups: Vec<BackupSnapshot>,

    /// What was written
    pub stats: ExtractStats,
}

/// Fetches an archive from a sync server and applies it locally.
pub struct SyncClient {
    client: reqwest::Client,
    options: ClientOptions,
    backups: BackupManager,
}

impl SyncClient {
    /// Creates a new client.
    pub fn new(options: ClientOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&options.user_agent)
            .timeout(options.timeout)
            .build()
            .map_err(|e| SyncError::transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            options,
            backups: BackupManager::new(),
        })
    }

    /// Replaces the backup manager.
    pub fn with_backup_manager(mut self, backups: BackupManager) -> Self {
        self.backups = backups;
        self
    }

    /// Syncs `roots` from the server at `address`.
    ///
    /// Fails without touching the filesystem on transport errors and invalid
    /// archives, and without writing any destination when a backup fails.
    pub async fn sync(&self, address: &str, roots: &[ConfigRoot]) -> Result<SyncReport> {
        let url = sync_url(address, self.options.port)?;
        info!("Connecting to {}", url);

        let body = self.fetch(&url).await?;
        let bytes_received = body.len() as u64;

        let roots = roots.to_vec();
        let backups = self.backups.clone();
        let (entry_count, snapshots, stats) = tokio::task::spawn_blocking(move || {
            apply_archive(&body, &roots, &backups)
        })
        .await
        .map_err(|e| SyncError::Io(io::Error::new(io::ErrorKind::Other, e)))??;

        Ok(SyncReport {
            url,
            bytes_received,
            entry_count,
            backups: snapshots,
            stats,
        })
    }

    /// Downloads the full response body of `url`.
    pub async fn fetch(&self, url: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::transport(format!("could not reach {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SyncError::transport(format!(
                "server responded with {}: {}",
                status,
                detail.trim()
            )));
        }

        let total_size = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|ct| ct.to_str().ok())
            .and_then(|ct| ct.parse::<u64>().ok());

        let progress = self.options.show_progress.then(|| download_progress(total_size));

        let mut body = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| SyncError::transport(format!("download interrupted: {}", e)))?;
            body.extend_from_slice(&chunk);

            if let Some(pb) = &progress {
                pb.set_position(body.len() as u64);
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        debug!("Received {} bytes", body.len());
        Ok(Bytes::from(body))
    }
}

fn apply_archive(
    body: &[u8],
    roots: &[ConfigRoot],
    backups: &BackupManager,
) -> Result<(usize, Vec<BackupSnapshot>, ExtractStats)> {
    let decoded = DecodedArchive::parse(body)?;

    let receiving = decoded.roots_receiving(roots);
    let snapshots = backups.snapshot_all(receiving.iter().map(|root| root.path()))?;

    info!("Extracting {} entries", decoded.entries().len());
    let stats = decoded.write_roots(roots)?;

    Ok((decoded.entries().len(), snapshots, stats))
}

fn download_progress(total_size: Option<u64>) -> ProgressBar {
    match total_size {
        Some(total) => {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {bytes} received ({bytes_per_sec})")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        }
    }
}

/// Builds the sync URL for a server address.
///
/// Accepts `host`, `host:port`, an IPv4 or IPv6 literal, or a bracketed IPv6
/// literal with or without a port. `port` applies when the address has none.
pub fn sync_url(address: &str, port: u16) -> Result<String> {
    let address = address.trim();
    if address.is_empty() {
        return Err(SyncError::invalid_config("server address is empty"));
    }

    if let Ok(addr) = address.parse::<SocketAddr>() {
        return Ok(format!("http://{}{}", addr, SYNC_PATH));
    }

    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(format!("http://{}{}", SocketAddr::new(ip, port), SYNC_PATH));
    }

    if address.starts_with('[') && address.ends_with(']') {
        let inner = &address[1..address.len() - 1];
        let ip = inner.parse::<IpAddr>().map_err(|_| {
            SyncError::invalid_config(format!("invalid IPv6 address: {}", address))
        })?;
        return Ok(format!("http://{}{}", SocketAddr::new(ip, port), SYNC_PATH));
    }

    let (host, port) = match address.rsplit_once(':') {
        Some((host, port_str)) => {
            let port = port_str.parse::<u16>().map_err(|_| {
                SyncError::invalid_config(format!("invalid port in address: {}", address))
            })?;
            (host, port)
        }
        None => (address, port),
    };

    if host.is_empty() || host.contains(|c: char| c.is_whitespace() || c == '/' || c == ':') {
        return Err(SyncError::invalid_config(format!(
            "invalid server address: {}",
            address
        )));
    }

    Ok(format!("http://{}:{}{}", host, port, SYNC_PATH))
}
