//! Validated decoding and extraction of received archives.
//!
//! Decoding happens in two phases. [`DecodedArchive::parse`] reads the whole
//! stream, checks every entry name and verifies the gzip trailer; any entry
//! that could escape its destination rejects the archive before a single
//! byte is written. Only a fully validated archive can then be written out
//! with [`DecodedArchive::write_to`] or [`DecodedArchive::write_roots`].

use codesync_core::{ConfigRoot, Result, SyncError};
use flate2::read::GzDecoder;
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};
use tracing::{debug, warn};

/// Kind of an archive entry that is extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// A validated archive entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Normalized, forward-slash separated relative name
    pub name: String,

    /// File or directory
    pub kind: EntryKind,

    /// Permission bits recorded in the archive
    pub mode: Option<u32>,

    /// File content (empty for directories)
    pub data: Vec<u8>,
}

impl ArchiveEntry {
    /// First component of the name, used to route labeled archives.
    pub fn label(&self) -> &str {
        self.name.split('/').next().unwrap_or_default()
    }

    /// Name with the first component removed.
    pub fn strip_label(&self) -> Option<&str> {
        self.name.split_once('/').map(|(_, rest)| rest)
    }

    fn relative_path(name: &str) -> PathBuf {
        name.split('/').collect()
    }
}

/// Counters for a completed extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub files_written: usize,
    pub dirs_created: usize,
    pub bytes_written: u64,
    /// Entries whose label matched no destination root
    pub skipped: usize,
}

/// A fully read and validated archive.
#[derive(Debug, Clone, Default)]
pub struct DecodedArchive {
    entries: Vec<ArchiveEntry>,
}

impl DecodedArchive {
    /// Parses and validates a complete archive held in memory.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(SyncError::invalid_archive("empty archive stream"));
        }

        let mut archive = Archive::new(GzDecoder::new(bytes));
        let mut entries = Vec::new();

        {
            let iter = archive.entries().map_err(invalid)?;
            for entry in iter {
                let mut entry = entry.map_err(invalid)?;
                let raw_name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
                let header = entry.header();
                let entry_type = header.entry_type();
                let mode = header.mode().ok();
                let expected_size = header.size().map_err(invalid)?;

                let kind = match entry_type {
                    EntryType::Regular | EntryType::Continuous => EntryKind::File,
                    EntryType::Directory => EntryKind::Directory,
                    other => {
                        warn!("Skipping unsupported archive entry {} ({:?})", raw_name, other);
                        continue;
                    }
                };

                let name = match sanitize_entry_name(&raw_name)? {
                    Some(name) => name,
                    None if kind == EntryKind::Directory => continue,
                    None => {
                        return Err(SyncError::invalid_archive("file entry with an empty name"))
                    }
                };

                let mut data = Vec::new();
                if kind == EntryKind::File {
                    entry.read_to_end(&mut data).map_err(invalid)?;
                    if data.len() as u64 != expected_size {
                        return Err(SyncError::invalid_archive(format!(
                            "entry '{}' is truncated",
                            name
                        )));
                    }
                }

                entries.push(ArchiveEntry {
                    name,
                    kind,
                    mode,
                    data,
                });
            }
        }

        // The entry iterator stops at the end marker; the gzip trailer that
        // carries the checksum is only verified once the stream is drained.
        let mut decoder = archive.into_inner();
        io::copy(&mut decoder, &mut io::sink()).map_err(invalid)?;

        debug!("Decoded archive with {} entries", entries.len());
        Ok(Self { entries })
    }

    /// Reads `reader` to the end and parses the archive.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::parse(&bytes)
    }

    /// Validated entries in archive order.
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Distinct first components of the entry names.
    pub fn labels(&self) -> BTreeSet<&str> {
        self.entries.iter().map(ArchiveEntry::label).collect()
    }

    /// Roots that [`write_roots`](Self::write_roots) would write into.
    ///
    /// A single unlabeled root always receives the archive. Labeled roots
    /// receive it only when at least one entry carries their label.
    pub fn roots_receiving<'a>(&self, roots: &'a [ConfigRoot]) -> Vec<&'a ConfigRoot> {
        if let [single] = roots {
            if single.label().is_none() {
                return vec![single];
            }
        }

        let labels = self.labels();
        roots
            .iter()
            .filter(|root| root.label().is_some_and(|l| labels.contains(l)))
            .collect()
    }

    /// Writes every entry below `dest`, creating it if needed.
    pub fn write_to(&self, dest: &Path) -> Result<ExtractStats> {
        let plan = self
            .entries
            .iter()
            .map(|entry| (dest, ArchiveEntry::relative_path(&entry.name), entry))
            .collect();

        let mut stats = ExtractStats::default();
        apply(&[dest], plan, &mut stats)?;
        Ok(stats)
    }

    /// Writes each entry into the root named by its label.
    ///
    /// With a single unlabeled root this is [`write_to`](Self::write_to).
    /// Entries whose label matches no root are skipped.
    pub fn write_roots(&self, roots: &[ConfigRoot]) -> Result<ExtractStats> {
        if let [single] = roots {
            if single.label().is_none() {
                return self.write_to(single.path());
            }
        }

        let mut stats = ExtractStats::default();
        let mut plan = Vec::new();

        for entry in &self.entries {
            let Some(root) = roots.iter().find(|r| r.label() == Some(entry.label())) else {
                if entry.kind == EntryKind::Directory && entry.strip_label().is_none() {
                    continue;
                }
                warn!("No destination for archive entry {}", entry.name);
                stats.skipped += 1;
                continue;
            };

            match entry.strip_label() {
                Some(rest) => plan.push((root.path(), ArchiveEntry::relative_path(rest), entry)),
                // The label directory itself maps onto the root
                None if entry.kind == EntryKind::Directory => {}
                None => {
                    warn!("Skipping file entry {} at label level", entry.name);
                    stats.skipped += 1;
                }
            }
        }

        let dests: Vec<&Path> = self
            .roots_receiving(roots)
            .into_iter()
            .map(ConfigRoot::path)
            .collect();
        apply(&dests, plan, &mut stats)?;
        Ok(stats)
    }
}

/// Reads, validates and extracts an archive below `dest`.
pub fn extract<R: Read>(reader: R, dest: &Path) -> Result<ExtractStats> {
    DecodedArchive::read_from(reader)?.write_to(dest)
}

fn invalid(err: io::Error) -> SyncError {
    SyncError::invalid_archive(err.to_string())
}

/// Normalizes an entry name, rejecting anything that could leave the
/// destination. Returns `None` for names that denote the destination itself.
fn sanitize_entry_name(raw: &str) -> Result<Option<String>> {
    if raw.starts_with('/') || raw.starts_with('\\') {
        return Err(SyncError::path_traversal(raw));
    }

    let mut parts = Vec::new();
    for part in raw.split(|c| c == '/' || c == '\\') {
        match part {
            "" | "." => continue,
            ".." => return Err(SyncError::path_traversal(raw)),
            _ => {
                // Catches drive prefixes and anything else that is not a plain name
                let mut components = Path::new(part).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(_)), None) => parts.push(part),
                    _ => return Err(SyncError::path_traversal(raw)),
                }
            }
        }
    }

    if parts.is_empty() {
        Ok(None)
    } else {
        Ok(Some(parts.join("/")))
    }
}

/// Joins a sanitized relative path onto `dest` and checks containment.
fn safe_join(dest: &Path, relative: &Path) -> Result<PathBuf> {
    let mut joined = dest.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(name) => joined.push(name),
            _ => {
                return Err(SyncError::path_traversal(
                    relative.to_string_lossy().into_owned(),
                ))
            }
        }
    }

    if joined == dest || !joined.starts_with(dest) {
        return Err(SyncError::path_traversal(
            relative.to_string_lossy().into_owned(),
        ));
    }
    Ok(joined)
}

fn apply(
    dests: &[&Path],
    plan: Vec<(&Path, PathBuf, &ArchiveEntry)>,
    stats: &mut ExtractStats,
) -> Result<()> {
    for dest in dests {
        fs::create_dir_all(dest).map_err(|e| SyncError::decode(*dest, e))?;
    }

    let mut dir_modes = Vec::new();

    for (dest, relative, entry) in plan {
        let target = safe_join(dest, &relative)?;

        match entry.kind {
            EntryKind::Directory => {
                fs::create_dir_all(&target).map_err(|e| SyncError::decode(&target, e))?;
                stats.dirs_created += 1;
                if let Some(mode) = entry.mode {
                    dir_modes.push((target, mode));
                }
            }
            EntryKind::File => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|e| SyncError::decode(parent, e))?;
                }
                write_file(&target, entry).map_err(|e| SyncError::decode(&target, e))?;
                stats.files_written += 1;
                stats.bytes_written += entry.data.len() as u64;
            }
        }
    }

    // Deepest first, after all files, so restrictive modes cannot block writes
    for (dir, mode) in dir_modes.into_iter().rev() {
        set_mode(&dir, mode).map_err(|e| SyncError::decode(&dir, e))?;
    }

    Ok(())
}

fn write_file(target: &Path, entry: &ArchiveEntry) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(target)?;
    file.write_all(&entry.data)?;
    file.flush()?;

    if let Some(mode) = entry.mode {
        set_mode(target, mode)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    // Setuid, setgid and sticky bits from a received archive are dropped
    let mode = mode & 0o777;
    if mode == 0 {
        return Ok(());
    }
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}
