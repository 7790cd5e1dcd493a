//! Codesync archive pipeline
//!
//! This crate turns configuration roots into a single tar+gzip stream and
//! back again.
//!
//! # Features
//!
//! ## Encoding
//! - **Lazy traversal**: excluded subtrees are pruned without being read
//! - **Streaming compression**: archive bytes go straight to any `Write` sink
//! - **Smart filtering**: caches, logs, sockets and journals are left out
//! - **Abort safety**: a failed encode never produces a well-formed archive
//!
//! ## Decoding
//! - **Validate first**: every entry name is checked before anything is written
//! - **Integrity**: truncated or corrupt streams are rejected via the gzip trailer
//! - **Backups**: existing destinations are renamed aside, never deleted
//!
//! # Examples
//!
//! ```no_run
//! use codesync_archive::{ArchiveEncoder, BackupManager, DecodedArchive, EntryFilter};
//! use codesync_core::ConfigRoot;
//! use std::path::Path;
//!
//! fn main() -> codesync_core::Result<()> {
//!     let roots = vec![ConfigRoot::unlabeled("/home/dev/.config/Code/User")];
//!     let bytes = ArchiveEncoder::new(roots, EntryFilter::new()).encode_to_vec()?;
//!
//!     let dest = Path::new("/tmp/User");
//!     let decoded = DecodedArchive::parse(&bytes)?;
//!     BackupManager::new().snapshot(dest)?;
//!     let stats = decoded.write_to(dest)?;
//!
//!     println!("Extracted {} files", stats.files_written);
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod backup;
pub mod extract;
pub mod filters;
pub mod walk;

// Re-export commonly used types
pub use archive::{ArchiveEncoder, EncodeSummary, ARCHIVE_CONTENT_TYPE, ARCHIVE_FILE_NAME};
pub use backup::{backup_path_for, BackupManager, BackupSnapshot, RenameFn, BACKUP_MARKER};
pub use extract::{extract, ArchiveEntry, DecodedArchive, EntryKind, ExtractStats};
pub use filters::{
    EntryFilter, FilterDecision, EXCLUDED_COMPONENTS, EXCLUDED_SUFFIXES, RETAINED_DIRECTORIES,
};
pub use walk::{walk_root, SourceFile};
