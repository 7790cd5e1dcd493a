//! Common test infrastructure for codesync-transfer tests
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use codesync_core::{ConfigRoot, Result};
use codesync_transfer::{ClientOptions, ServerOptions, SyncClient, SyncServer};
use std::collections::BTreeMap;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use walkdir::WalkDir;

/// A sync server running on an ephemeral loopback port
pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<()>>,
}

impl TestServer {
    /// Starts a server for `roots` on 127.0.0.1 with a free port
    pub async fn start(roots: Vec<ConfigRoot>) -> Self {
        let options = ServerOptions {
            bind_address: "127.0.0.1".to_string(),
            port: 0,
            shutdown_grace: Duration::from_secs(1),
            ..ServerOptions::default()
        };
        let server = SyncServer::new(roots, options).unwrap();
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(server.serve(listener, async {
            let _ = rx.await;
        }));

        Self {
            addr,
            shutdown: Some(tx),
            handle,
        }
    }

    /// Address in `host:port` form, as passed to the client
    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    pub fn url(&self) -> String {
        format!("http://{}/sync", self.addr)
    }

    /// Requests shutdown and waits for the server to return
    pub async fn stop(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.unwrap()
    }
}

/// Client without progress output
pub fn test_client() -> SyncClient {
    let options = ClientOptions {
        timeout: Duration::from_secs(30),
        ..ClientOptions::default()
    }
    .with_progress(false);
    SyncClient::new(options).unwrap()
}

/// Writes a typical settings tree below `dir`
pub fn write_user_settings(dir: &Path) {
    fs::create_dir_all(dir.join("snippets")).unwrap();
    fs::create_dir_all(dir.join("Cache")).unwrap();
    fs::create_dir_all(dir.join("workspaceStorage/ws1")).unwrap();
    fs::write(dir.join("settings.json"), r#"{"editor.fontSize": 14}"#).unwrap();
    fs::write(dir.join("keybindings.json"), "[]").unwrap();
    fs::write(dir.join("snippets/rust.json"), r#"{"main": {}}"#).unwrap();
    fs::write(dir.join("Cache/tmp.bin"), vec![0u8; 1000]).unwrap();
    fs::write(dir.join("workspaceStorage/ws1/state.json"), "{}").unwrap();
}

/// Relative path to content of every file below `dir`
pub fn snapshot_tree(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(dir)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e
                .path()
                .strip_prefix(dir)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}

/// Sibling directories of `dir` created as backups of it
pub fn backups_of(dir: &Path) -> Vec<std::path::PathBuf> {
    let name = dir.file_name().unwrap().to_string_lossy().to_string();
    let prefix = format!("{}_backup_", name);
    let mut found: Vec<_> = fs::read_dir(dir.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.file_name().unwrap().to_string_lossy().starts_with(&prefix))
        .collect();
    found.sort();
    found
}
