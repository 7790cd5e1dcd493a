//! Streaming tar+gzip encoding of configuration roots.
//!
//! The encoder walks every root, appends the included files to a tar stream
//! and compresses it with gzip straight into the caller's sink. Nothing is
//! staged on disk, so the server can hand bytes to the HTTP body as soon as
//! they are produced.
//!
//! A failed encode never ends in a well-formed archive: once an error is
//! seen the sink refuses further writes, which stops the tar and gzip
//! finalizers from emitting trailers that would make a partial transfer look
//! complete.

use crate::filters::EntryFilter;
use crate::walk::{walk_root, SourceFile};
use codesync_core::config::DEFAULT_COMPRESSION_LEVEL;
use codesync_core::{ConfigRoot, Result, SyncError};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::cell::Cell;
use std::fs::{self, File};
use std::io::{self, Read, Take, Write};
use std::rc::Rc;
use tar::{Builder as TarBuilder, EntryType, Header, HeaderMode};

/// Content type served for encoded archives
pub const ARCHIVE_CONTENT_TYPE: &str = "application/gzip";

/// File name suggested to HTTP clients
pub const ARCHIVE_FILE_NAME: &str = "vscode_settings.tar.gz";

/// Totals for a completed encode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodeSummary {
    /// Number of file entries written
    pub file_count: usize,

    /// Uncompressed bytes of file content
    pub total_bytes: u64,

    /// Number of roots walked
    pub root_count: usize,
}

/// Encodes configuration roots into a gzip-compressed tar stream.
#[derive(Debug, Clone)]
pub struct ArchiveEncoder {
    roots: Vec<ConfigRoot>,
    filter: EntryFilter,
    compression_level: u32,
}

impl ArchiveEncoder {
    /// Creates an encoder over `roots` using `filter` for every root.
    pub fn new(roots: Vec<ConfigRoot>, filter: EntryFilter) -> Self {
        Self {
            roots,
            filter,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }

    /// Sets the compression level.
    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.clamp(1, 9);
        self
    }

    /// Roots this encoder walks, in archive order.
    pub fn roots(&self) -> &[ConfigRoot] {
        &self.roots
    }

    /// Encodes every root into `sink`.
    ///
    /// On success the sink holds a complete archive and has been flushed. On
    /// failure the sink holds at most a prefix that no decoder accepts.
    pub fn encode<W: Write>(&self, sink: W) -> Result<EncodeSummary> {
        if self.roots.len() > 1 && self.roots.iter().any(|r| r.label().is_none()) {
            return Err(SyncError::invalid_config(
                "every root must be labeled when encoding more than one",
            ));
        }

        let aborted = Rc::new(Cell::new(false));
        let guarded = GuardedSink {
            inner: sink,
            aborted: Rc::clone(&aborted),
        };
        let encoder = GzEncoder::new(guarded, Compression::new(self.compression_level));
        let mut tar = TarBuilder::new(encoder);

        let summary = match self.append_roots(&mut tar) {
            Ok(summary) => summary,
            Err(err) => {
                aborted.set(true);
                return Err(err);
            }
        };

        if let Err(err) = finalize(tar) {
            aborted.set(true);
            return Err(SyncError::Io(err));
        }

        tracing::debug!(
            "Encoded {} files ({} bytes) from {} roots",
            summary.file_count,
            summary.total_bytes,
            summary.root_count
        );

        Ok(summary)
    }

    /// Encodes every root into memory.
    pub fn encode_to_vec(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(buf)
    }

    fn append_roots<W: Write>(&self, tar: &mut TarBuilder<W>) -> Result<EncodeSummary> {
        let mut summary = EncodeSummary::default();

        for root in &self.roots {
            tracing::debug!("Archiving {}", root);
            if let Some(label) = root.label() {
                append_root_dir(tar, root, label)?;
            }
            for file in walk_root(root, &self.filter) {
                let file = file?;
                let size = append_file(tar, root, &file)?;
                summary.file_count += 1;
                summary.total_bytes += size;
            }
            summary.root_count += 1;
        }

        Ok(summary)
    }
}

/// Appends the directory entry for a labeled root.
///
/// The entry is written even when nothing below the root is transferred,
/// so the receiver still replaces its copy of that root.
fn append_root_dir<W: Write>(
    tar: &mut TarBuilder<W>,
    root: &ConfigRoot,
    label: &str,
) -> Result<()> {
    let meta = fs::metadata(root.path()).map_err(|e| SyncError::encode(root.path(), e))?;
    if !meta.is_dir() {
        return Err(SyncError::encode(
            root.path(),
            io::Error::new(io::ErrorKind::Other, "not a directory"),
        ));
    }

    let mut header = Header::new_gnu();
    header.set_metadata_in_mode(&meta, HeaderMode::Complete);
    header.set_entry_type(EntryType::Directory);
    header.set_size(0);
    tar.append_data(&mut header, label, io::empty())?;
    Ok(())
}

/// Appends one file, returning the number of content bytes written.
fn append_file<W: Write>(
    tar: &mut TarBuilder<W>,
    root: &ConfigRoot,
    file: &SourceFile,
) -> Result<u64> {
    let handle = File::open(&file.path).map_err(|e| SyncError::encode(&file.path, e))?;
    let meta = handle
        .metadata()
        .map_err(|e| SyncError::encode(&file.path, e))?;
    let size = meta.len();

    let mut header = Header::new_gnu();
    header.set_metadata_in_mode(&meta, HeaderMode::Complete);
    header.set_size(size);

    let name = root.archive_name(&file.relative);
    let content = SizedReader::new(handle, size);
    tar.append_data(&mut header, &name, content)
        .map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => SyncError::encode(&file.path, e),
            _ => SyncError::Io(e),
        })?;

    Ok(size)
}

/// Reads exactly the size recorded in the entry header.
///
/// Bytes appended after the header was written are ignored; a file that
/// shrinks while being read fails with `UnexpectedEof`.
struct SizedReader<R> {
    inner: Take<R>,
}

impl<R: Read> SizedReader<R> {
    fn new(inner: R, size: u64) -> Self {
        Self {
            inner: inner.take(size),
        }
    }
}

impl<R: Read> Read for SizedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n == 0 && !buf.is_empty() && self.inner.limit() > 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "file shrank while it was archived",
            ));
        }
        Ok(n)
    }
}

/// Writes the tar end marker and the gzip trailer, then flushes the sink.
fn finalize<W: Write>(tar: TarBuilder<GzEncoder<GuardedSink<W>>>) -> io::Result<()> {
    let mut gz = tar.into_inner()?;
    gz.try_finish()?;
    let mut sink = gz.finish()?;
    sink.flush()
}

/// Write adapter that fails every write once the encode is aborted.
///
/// A failed inner write also aborts, so a broken sink stays broken while
/// the tar and gzip writers are dropped.
struct GuardedSink<W> {
    inner: W,
    aborted: Rc<Cell<bool>>,
}

impl<W> GuardedSink<W> {
    fn check(&self) -> io::Result<()> {
        if self.aborted.get() {
            Err(io::Error::new(io::ErrorKind::Other, "archive encoding aborted"))
        } else {
            Ok(())
        }
    }
}

impl<W: Write> Write for GuardedSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.check()?;
        self.inner.write(buf).map_err(|e| {
            self.aborted.set(true);
            e
        })
    }

    fn flush(&mut self) -> io::Result<()> {
        self.check()?;
        self.inner.flush().map_err(|e| {
            self.aborted.set(true);
            e
        })
    }
}
