//! Sync server: one route that streams an archive of the configured roots.
//!
//! Each `GET /sync` runs the archive encoder on a blocking thread that
//! writes into a bounded channel; the response body drains that channel.
//! The status line is only committed once the encoder produced its first
//! chunk, so failures that happen before any byte is sent (a missing root,
//! an unreadable first file) become a `500` with the error text. Failures
//! after that point abort the body, which the client detects as a truncated
//! archive.

use crate::stream::{BodyChunk, ChannelWriter};
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use codesync_archive::{ArchiveEncoder, EntryFilter, ARCHIVE_CONTENT_TYPE, ARCHIVE_FILE_NAME};
use codesync_core::{ConfigRoot, Result, SyncConfig, SyncError};
use futures::stream::{self, StreamExt};
use std::future::{Future, IntoFuture};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Path of the single sync endpoint
pub const SYNC_PATH: &str = "/sync";

/// Chunks buffered between the encoder thread and the socket
const CHANNEL_DEPTH: usize = 8;

/// Server settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Address to bind
    pub bind_address: String,

    /// Port to bind (0 picks a free port)
    pub port: u16,

    /// Extra exclusion globs on top of the fixed filter rules
    pub exclude: Vec<String>,

    /// Gzip level for the streamed archive
    pub compression_level: u32,

    /// Size of body chunks handed to the HTTP layer
    pub stream_chunk_bytes: usize,

    /// How long in-flight transfers may continue after shutdown starts
    pub shutdown_grace: Duration,
}

impl ServerOptions {
    /// Server settings from a loaded configuration
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            bind_address: config.network.bind_address.clone(),
            port: config.network.port,
            exclude: config.transfer.exclude.clone(),
            compression_level: config.transfer.compression_level,
            stream_chunk_bytes: config.transfer.stream_chunk_bytes,
            shutdown_grace: Duration::from_secs(config.network.shutdown_grace_secs),
        }
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

struct ServerState {
    encoder: Arc<ArchiveEncoder>,
    chunk_bytes: usize,
}

/// HTTP server exposing `GET /sync`.
pub struct SyncServer {
    options: ServerOptions,
    state: Arc<ServerState>,
}

impl SyncServer {
    /// Creates a server for `roots`. Fails on invalid exclusion patterns.
    pub fn new(roots: Vec<ConfigRoot>, options: ServerOptions) -> Result<Self> {
        let filter = EntryFilter::with_patterns(&options.exclude)?;
        let encoder = ArchiveEncoder::new(roots, filter)
            .with_compression_level(options.compression_level);

        let state = Arc::new(ServerState {
            encoder: Arc::new(encoder),
            chunk_bytes: options.stream_chunk_bytes,
        });

        Ok(Self { options, state })
    }

    /// Roots served by this server
    pub fn roots(&self) -> &[ConfigRoot] {
        self.state.encoder.roots()
    }

    /// Server settings
    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    /// Router with the sync route; other methods on it get `405`.
    pub fn router(&self) -> Router {
        Router::new()
            .route(
                SYNC_PATH,
                get(sync_handler).fallback(method_not_allowed),
            )
            .with_state(Arc::clone(&self.state))
    }

    /// Binds the configured address.
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = format!("{}:{}", self.options.bind_address, self.options.port);
        TcpListener::bind(&addr)
            .await
            .map_err(|e| SyncError::server(format!("failed to bind {}: {}", addr, e)))
    }

    /// Serves requests on `listener` until `shutdown` completes.
    ///
    /// After `shutdown` resolves no new connections are accepted; transfers
    /// in flight get the configured grace period to finish before the
    /// server returns regardless.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local: Option<SocketAddr> = listener.local_addr().ok();
        if let Some(addr) = local {
            info!("Sync server listening on {}", addr);
        }

        let grace = self.options.shutdown_grace;
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let server = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .into_future();
        tokio::pin!(server);

        tokio::select! {
            result = &mut server => {
                return result.map_err(|e| SyncError::server(e.to_string()));
            }
            _ = shutdown => {
                info!("Shutdown requested, waiting up to {}s for transfers", grace.as_secs());
            }
        }

        let _ = stop_tx.send(());
        match tokio::time::timeout(grace, &mut server).await {
            Ok(result) => result.map_err(|e| SyncError::server(e.to_string())),
            Err(_) => {
                warn!("Grace period elapsed, closing remaining transfers");
                Ok(())
            }
        }
    }
}

async fn sync_handler(State(state): State<Arc<ServerState>>) -> Response {
    info!("Sync request received, preparing archive");

    let (tx, mut rx) = mpsc::channel::<BodyChunk>(CHANNEL_DEPTH);
    let encoder = Arc::clone(&state.encoder);
    let chunk_bytes = state.chunk_bytes;

    tokio::task::spawn_blocking(move || {
        let mut writer = ChannelWriter::new(tx, chunk_bytes);
        match encoder.encode(&mut writer) {
            Ok(summary) => info!(
                "Archive sent: {} files, {} bytes uncompressed",
                summary.file_count, summary.total_bytes
            ),
            Err(err) => {
                error!("Archive encoding failed: {}", err);
                writer.fail(io::Error::new(io::ErrorKind::Other, err.to_string()));
            }
        }
    });

    match rx.recv().await {
        Some(Ok(first)) => {
            let rest = stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|chunk| (chunk, rx))
            });
            let body = stream::once(async move { Ok::<Bytes, io::Error>(first) }).chain(rest);

            (
                [
                    (header::CONTENT_TYPE, ARCHIVE_CONTENT_TYPE.to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{}\"", ARCHIVE_FILE_NAME),
                    ),
                ],
                Body::from_stream(body),
            )
                .into_response()
        }
        Some(Err(err)) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
        None => {
            debug!("Encoder finished without output");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "archive stream ended unexpectedly",
            )
                .into_response()
        }
    }
}

async fn method_not_allowed() -> impl IntoResponse {
    (StatusCode::METHOD_NOT_ALLOWED, "only GET is supported")
}
