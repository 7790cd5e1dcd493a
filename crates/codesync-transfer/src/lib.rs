//! Codesync HTTP transfer
//!
//! The server side exposes a single `GET /sync` route that streams a fresh
//! archive of its configuration roots for every request. The client side
//! downloads that archive, validates it, moves its own roots aside and
//! extracts the archive in their place.
//!
//! # Examples
//!
//! ```no_run
//! use codesync_core::ConfigRoot;
//! use codesync_transfer::{ClientOptions, SyncClient};
//!
//! #[tokio::main]
//! async fn main() -> codesync_core::Result<()> {
//!     let roots = vec![ConfigRoot::labeled("User", "/home/dev/.config/Code/User")];
//!     let client = SyncClient::new(ClientOptions::default())?;
//!     let report = client.sync("192.168.1.50", &roots).await?;
//!
//!     println!("Wrote {} files", report.stats.files_written);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod net;
pub mod server;
pub mod stream;

pub use client::{sync_url, ClientOptions, SyncClient, SyncReport};
pub use net::{detect_lan_ip, is_private_lan};
pub use server::{ServerOptions, SyncServer, SYNC_PATH};
pub use stream::{BodyChunk, ChannelWriter};
