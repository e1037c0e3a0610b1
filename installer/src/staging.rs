//! Transient staging area for one sync run.
//!
//! The staging area lives beneath the working directory, never inside the
//! output directory. It holds the downloaded archive and the extracted tree.
//! Dropping a [`StagingArea`] removes it, so every exit path (including
//! early returns and panics) leaves nothing behind; [`StagingArea::close`]
//! does the same but reports failures.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// Prefix of staging directory names under the working directory.
pub const STAGING_PREFIX: &str = ".relsync-staging-";

const ARCHIVE_FILENAME: &str = "release.tar";
const EXTRACT_DIRNAME: &str = "extracted";

/// Scratch directory owned by a single sync run.
#[derive(Debug)]
pub struct StagingArea {
    root: TempDir,
}

impl StagingArea {
    /// Create a fresh staging area inside `work_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if `work_dir` is missing or not writable.
    pub fn create(work_dir: &Path) -> io::Result<Self> {
        let root = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(work_dir)?;
        fs::create_dir(root.path().join(EXTRACT_DIRNAME))?;
        Ok(Self { root })
    }

    /// Root of the staging area.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// Where the downloaded archive is written.
    #[must_use]
    pub fn archive_path(&self) -> PathBuf {
        self.root.path().join(ARCHIVE_FILENAME)
    }

    /// Directory the archive is unpacked into.
    #[must_use]
    pub fn extract_dir(&self) -> PathBuf {
        self.root.path().join(EXTRACT_DIRNAME)
    }

    /// Remove the staging area and everything in it.
    ///
    /// # Errors
    ///
    /// Returns the removal error; the caller decides how to report it.
    pub fn close(self) -> io::Result<()> {
        self.root.close()
    }
}
