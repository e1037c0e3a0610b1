//! Streaming extraction of release tarballs.
//!
//! Archives are decompressed and unpacked one entry at a time, with path
//! traversal protection to prevent zip-slip attacks. gzip and zstd streams
//! are detected from their magic bytes; anything else is read as a plain tar
//! stream.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Component, Path};

use log::{debug, trace};

const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xb5, 0x2f, 0xfd];

/// Permission bits honoured when creating files from archive entries.
const MODE_MASK: u32 = 0o777;

/// Trait for extracting release archives, enabling test mocking.
///
/// # Examples
///
/// ```
/// use relsync::extraction::TarballExtractor;
///
/// let extractor = TarballExtractor;
/// // Use extractor.extract(archive_path, dest_dir) in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveExtractor {
    /// Extract the archive at `archive_path` into `dest_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::PathTraversal`] if any entry attempts to
    /// escape the destination directory, [`ExtractionError::Entry`] when an
    /// entry cannot be read or written, and [`ExtractionError::Io`] for
    /// failures not tied to an entry.
    fn extract(&self, archive_path: &Path, dest_dir: &Path)
    -> Result<ExtractSummary, ExtractionError>;
}

/// Errors arising from archive extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    /// I/O error not attributable to a single entry (opening the archive,
    /// reading the stream header).
    #[error("extraction I/O error: {0}")]
    Io(#[from] io::Error),

    /// A path in the archive attempts to traverse outside the destination.
    #[error("path traversal detected: {path}")]
    PathTraversal {
        /// The offending path from the archive entry.
        path: String,
    },

    /// Reading or writing a specific entry failed.
    #[error("failed to extract {path}: {source}")]
    Entry {
        /// The entry path as recorded in the archive.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Counts of what an extraction produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Directory entries created (or already present).
    pub directories: usize,
    /// Regular files written.
    pub files: usize,
    /// Entries ignored: links, devices, and empty names.
    pub skipped: usize,
    /// pax global headers, which describe the archive rather than a file.
    pub metadata: usize,
}

/// Compression applied around the tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// gzip (`.tar.gz`, GitHub tarballs).
    Gzip,
    /// Zstandard (`.tar.zst`).
    Zstd,
    /// Uncompressed tar.
    None,
}

impl Compression {
    /// Identify the compression from the first bytes of a stream.
    #[must_use]
    pub fn detect(head: &[u8]) -> Self {
        if head.starts_with(GZIP_MAGIC) {
            Self::Gzip
        } else if head.starts_with(ZSTD_MAGIC) {
            Self::Zstd
        } else {
            Self::None
        }
    }
}

/// Default extractor reading archives from disk.
pub struct TarballExtractor;

impl ArchiveExtractor for TarballExtractor {
    fn extract(
        &self,
        archive_path: &Path,
        dest_dir: &Path,
    ) -> Result<ExtractSummary, ExtractionError> {
        let file = File::open(archive_path)?;
        unpack(file, dest_dir)
    }
}

/// Unpack a (possibly compressed) tar stream into `dest_dir`.
///
/// Entries are applied in stream order. Each file is closed before the next
/// entry is read, so at most one output file is open at a time.
///
/// # Errors
///
/// See [`ArchiveExtractor::extract`].
pub fn unpack<R: Read>(reader: R, dest_dir: &Path) -> Result<ExtractSummary, ExtractionError> {
    let decoder = decompress(reader)?;
    let mut archive = tar::Archive::new(decoder);
    let mut summary = ExtractSummary::default();

    for entry_result in archive.entries()? {
        let mut entry = entry_result?;
        let entry_path = entry
            .path()
            .map_err(|source| ExtractionError::Entry {
                path: String::from_utf8_lossy(&entry.path_bytes()).into_owned(),
                source,
            })?
            .into_owned();

        if entry.header().entry_type() == tar::EntryType::XGlobalHeader {
            trace!("reading past pax global header {}", entry_path.display());
            summary.metadata += 1;
            continue;
        }

        if is_blank(&entry_path) {
            trace!("skipping entry with empty path");
            summary.skipped += 1;
            continue;
        }

        validate_entry_path(&entry_path)?;
        let target = dest_dir.join(&entry_path);

        match entry.header().entry_type() {
            tar::EntryType::Directory => {
                create_directory(&target).map_err(|source| entry_error(&entry_path, source))?;
                summary.directories += 1;
            }
            tar::EntryType::Regular | tar::EntryType::Continuous => {
                let mode = entry.header().mode().unwrap_or(0o644) & MODE_MASK;
                let size = entry.size();
                write_file(&mut entry, &target, mode, size)
                    .map_err(|source| entry_error(&entry_path, source))?;
                summary.files += 1;
            }
            other => {
                debug!(
                    "skipping {} entry {}",
                    entry_kind(other),
                    entry_path.display()
                );
                summary.skipped += 1;
            }
        }
    }

    Ok(summary)
}

/// Wrap `reader` in the decoder matching its magic bytes.
fn decompress<'a, R: Read + 'a>(reader: R) -> io::Result<Box<dyn Read + 'a>> {
    let mut buffered = BufReader::new(reader);
    let compression = Compression::detect(buffered.fill_buf()?);
    trace!("archive compression: {compression:?}");

    Ok(match compression {
        Compression::Gzip => Box::new(flate2::bufread::MultiGzDecoder::new(buffered)),
        Compression::Zstd => Box::new(zstd::stream::read::Decoder::with_buffer(buffered)?),
        Compression::None => Box::new(buffered),
    })
}

/// Validate that a tar entry path does not escape the destination
/// directory via `..` components, roots, or absolute paths.
fn validate_entry_path(path: &Path) -> Result<(), ExtractionError> {
    let escapes = path.is_absolute()
        || path.components().any(|component| {
            matches!(
                component,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
    if escapes {
        return Err(ExtractionError::PathTraversal {
            path: path.display().to_string(),
        });
    }
    Ok(())
}

fn is_blank(path: &Path) -> bool {
    path.components()
        .all(|component| matches!(component, Component::CurDir))
}

fn create_directory(target: &Path) -> io::Result<()> {
    trace!("creating directory {}", target.display());
    fs::create_dir_all(target)
}

fn write_file(entry: &mut impl Read, target: &Path, mode: u32, size: u64) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    trace!("writing {} ({size} bytes, mode {mode:o})", target.display());

    let mut file = open_for_write(target, mode)?;
    let copied = io::copy(&mut entry.take(size), &mut file)?;
    if copied != size {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("archive ended after {copied} of {size} bytes"),
        ));
    }
    apply_mode(&file, mode)?;
    Ok(())
}

#[cfg(unix)]
fn open_for_write(target: &Path, mode: u32) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;

    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(target)
}

#[cfg(not(unix))]
fn open_for_write(target: &Path, _mode: u32) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(target)
}

// `open` only applies the mode to new files; re-extraction over an existing
// file must still end with the archived permissions.
#[cfg(unix)]
fn apply_mode(file: &File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    file.set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn apply_mode(_file: &File, _mode: u32) -> io::Result<()> {
    Ok(())
}

fn entry_error(path: &Path, source: io::Error) -> ExtractionError {
    ExtractionError::Entry {
        path: path.display().to_string(),
        source,
    }
}

fn entry_kind(entry_type: tar::EntryType) -> &'static str {
    match entry_type {
        tar::EntryType::Symlink => "symlink",
        tar::EntryType::Link => "hard link",
        tar::EntryType::Char | tar::EntryType::Block => "device",
        tar::EntryType::Fifo => "fifo",
        _ => "unsupported",
    }
}

#[cfg(test)]
#[path = "extraction_tests.rs"]
mod tests;
