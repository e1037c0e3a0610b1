//! Shared test utilities for the relsync crate.
//!
//! Available to unit tests and, through the `test-support` feature, to the
//! behaviour suite under `tests/`.

use std::cell::Cell;
use std::io::Write;
use std::path::Path;

use crate::release::{FetchError, ReleaseInfo, ReleaseSource};

#[derive(Debug, Clone)]
enum FixtureEntry {
    Dir(String),
    File {
        path: String,
        contents: Vec<u8>,
        mode: u32,
    },
    Raw {
        path: String,
        contents: Vec<u8>,
    },
    Symlink {
        path: String,
        target: String,
    },
    PaxGlobal(Vec<u8>),
}

/// Builds tar archives in memory.
///
/// Regular entries go through [`tar::Builder`]; [`TarballFixture::raw_file`]
/// writes the name bytes straight into the header so that hostile paths such
/// as `../../etc/passwd` can be produced.
#[derive(Debug, Clone, Default)]
pub struct TarballFixture {
    entries: Vec<FixtureEntry>,
}

impl TarballFixture {
    /// Start an empty archive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory entry.
    #[must_use]
    pub fn dir(mut self, path: &str) -> Self {
        self.entries.push(FixtureEntry::Dir(path.to_owned()));
        self
    }

    /// Add a regular file with mode `0o644`.
    #[must_use]
    pub fn file(self, path: &str, contents: &str) -> Self {
        self.file_with_mode(path, contents, 0o644)
    }

    /// Add a regular file with explicit permission bits.
    #[must_use]
    pub fn file_with_mode(mut self, path: &str, contents: &str, mode: u32) -> Self {
        self.entries.push(FixtureEntry::File {
            path: path.to_owned(),
            contents: contents.as_bytes().to_vec(),
            mode,
        });
        self
    }

    /// Add a regular file whose name is written verbatim, bypassing the
    /// builder's path checks.
    #[must_use]
    pub fn raw_file(mut self, path: &str, contents: &str) -> Self {
        self.entries.push(FixtureEntry::Raw {
            path: path.to_owned(),
            contents: contents.as_bytes().to_vec(),
        });
        self
    }

    /// Add a symbolic link.
    #[must_use]
    pub fn symlink(mut self, path: &str, target: &str) -> Self {
        self.entries.push(FixtureEntry::Symlink {
            path: path.to_owned(),
            target: target.to_owned(),
        });
        self
    }

    /// Add a pax global header carrying a `comment` record, as `git archive`
    /// writes at the start of every GitHub tarball.
    #[must_use]
    pub fn pax_global_header(mut self, comment: &str) -> Self {
        let body = format!(" comment={comment}\n");
        let mut len = body.len();
        while len != body.len() + len.to_string().len() {
            len = body.len() + len.to_string().len();
        }
        self.entries
            .push(FixtureEntry::PaxGlobal(format!("{len}{body}").into_bytes()));
        self
    }

    /// Render the archive as an uncompressed tar stream.
    ///
    /// # Panics
    ///
    /// Panics if the in-memory tar builder fails.
    #[must_use]
    #[expect(clippy::expect_used, reason = "fixture construction failures are test bugs")]
    pub fn into_tar(self) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for entry in self.entries {
            match entry {
                FixtureEntry::Dir(path) => {
                    let mut header = tar::Header::new_gnu();
                    header.set_entry_type(tar::EntryType::Directory);
                    header.set_mode(0o755);
                    header.set_size(0);
                    builder
                        .append_data(&mut header, &path, std::io::empty())
                        .expect("append directory");
                }
                FixtureEntry::File {
                    path,
                    contents,
                    mode,
                } => {
                    let mut header = tar::Header::new_gnu();
                    header.set_entry_type(tar::EntryType::Regular);
                    header.set_mode(mode);
                    header.set_size(contents.len() as u64);
                    builder
                        .append_data(&mut header, &path, contents.as_slice())
                        .expect("append file");
                }
                FixtureEntry::Raw { path, contents } => {
                    let mut header = tar::Header::new_gnu();
                    let gnu = header.as_gnu_mut().expect("gnu header");
                    for (slot, byte) in gnu.name.iter_mut().zip(path.as_bytes()) {
                        *slot = *byte;
                    }
                    header.set_entry_type(tar::EntryType::Regular);
                    header.set_mode(0o644);
                    header.set_size(contents.len() as u64);
                    header.set_cksum();
                    builder
                        .append(&header, contents.as_slice())
                        .expect("append raw entry");
                }
                FixtureEntry::Symlink { path, target } => {
                    let mut header = tar::Header::new_gnu();
                    header.set_entry_type(tar::EntryType::Symlink);
                    header.set_mode(0o777);
                    header.set_size(0);
                    builder
                        .append_link(&mut header, &path, &target)
                        .expect("append symlink");
                }
                FixtureEntry::PaxGlobal(records) => {
                    let mut header = tar::Header::new_ustar();
                    header.set_entry_type(tar::EntryType::XGlobalHeader);
                    header.set_mode(0o644);
                    header.set_size(records.len() as u64);
                    builder
                        .append_data(&mut header, "pax_global_header", records.as_slice())
                        .expect("append pax global header");
                }
            }
        }
        builder.into_inner().expect("finish tar stream")
    }

    /// Render the archive as a gzip-compressed tar stream.
    ///
    /// # Panics
    ///
    /// Panics if compression fails.
    #[must_use]
    #[expect(clippy::expect_used, reason = "fixture construction failures are test bugs")]
    pub fn into_gzip(self) -> Vec<u8> {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&self.into_tar()).expect("gzip tar stream");
        encoder.finish().expect("finish gzip stream")
    }

    /// Render the archive as a zstd-compressed tar stream.
    ///
    /// # Panics
    ///
    /// Panics if compression fails.
    #[must_use]
    #[expect(clippy::expect_used, reason = "fixture construction failures are test bugs")]
    pub fn into_zstd(self) -> Vec<u8> {
        zstd::stream::encode_all(self.into_tar().as_slice(), 0).expect("zstd tar stream")
    }
}

/// A gzip tarball shaped like a GitHub source archive: a pax global header,
/// then one top-level directory holding `dist/index.html`, `dist/app.js`,
/// and a README outside the payload.
#[must_use]
pub fn release_tarball(top: &str) -> Vec<u8> {
    TarballFixture::new()
        .pax_global_header("5e1f2a9c0d4b8e7f6a5b4c3d2e1f0a9b8c7d6e5f")
        .dir(&format!("{top}/"))
        .dir(&format!("{top}/dist/"))
        .file(&format!("{top}/dist/index.html"), "<html></html>")
        .file(&format!("{top}/dist/app.js"), "console.log('ui');")
        .file(&format!("{top}/README.md"), "upstream readme")
        .into_gzip()
}

/// A [`ReleaseSource`] serving canned metadata and archive bytes.
///
/// Counts archive downloads so tests can assert that up-to-date runs never
/// fetch anything.
#[derive(Debug)]
pub struct StubReleaseSource {
    release: Result<ReleaseInfo, String>,
    archive: Vec<u8>,
    downloads: Cell<usize>,
}

impl StubReleaseSource {
    /// Serve `tag` with the given archive bytes.
    #[must_use]
    pub fn new(tag: &str, archive: Vec<u8>) -> Self {
        Self {
            release: Ok(ReleaseInfo {
                tag_name: tag.to_owned(),
                tarball_url: format!("https://example.test/tarball/{tag}"),
            }),
            archive,
            downloads: Cell::new(0),
        }
    }

    /// A source whose metadata request fails with `reason`.
    #[must_use]
    pub fn unreachable(reason: &str) -> Self {
        Self {
            release: Err(reason.to_owned()),
            archive: Vec::new(),
            downloads: Cell::new(0),
        }
    }

    /// Number of archive downloads served so far.
    #[must_use]
    pub fn downloads(&self) -> usize {
        self.downloads.get()
    }
}

impl ReleaseSource for StubReleaseSource {
    fn latest_release(&self) -> Result<ReleaseInfo, FetchError> {
        self.release.clone().map_err(|reason| FetchError::Http {
            url: "https://example.test/releases/latest".to_owned(),
            reason,
        })
    }

    fn download_archive(&self, _url: &str, dest: &Path) -> Result<u64, FetchError> {
        self.downloads.set(self.downloads.get() + 1);
        std::fs::write(dest, &self.archive)?;
        Ok(self.archive.len() as u64)
    }
}
