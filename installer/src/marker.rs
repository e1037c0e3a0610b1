//! Persisted record of the last synced release.
//!
//! The marker is a one-field TOML file stored at the root of the output
//! directory:
//!
//! ```toml
//! version = "1.2.3"
//! ```
//!
//! It is replaced wholesale via a temporary file and rename, so readers see
//! either the previous record or the new one.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::semver::{ParseError, SemanticVersion};

/// Default marker file name inside the output directory.
pub const MARKER_FILENAME: &str = ".relsync-version.toml";

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct MarkerRecord {
    version: String,
}

/// Errors arising while reading or writing the version marker.
#[derive(Debug, thiserror::Error)]
pub enum MarkerError {
    /// No marker file exists yet.
    #[error("no version marker at {path}")]
    NotFound {
        /// Where the marker was expected.
        path: PathBuf,
    },

    /// The marker exists but is not a valid marker record.
    #[error("version marker {path} is corrupt: {reason}")]
    Corrupt {
        /// Marker file path.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// The recorded version text is not a valid version.
    #[error("version marker {path} holds an invalid version: {source}")]
    InvalidVersion {
        /// Marker file path.
        path: PathBuf,
        /// Version parse failure.
        #[source]
        source: ParseError,
    },

    /// Reading the marker file failed.
    #[error("failed to read version marker {path}: {source}")]
    Read {
        /// Marker file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Writing the marker file failed.
    #[error("failed to write version marker {path}: {source}")]
    Write {
        /// Marker file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Handle on the version marker of one output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMarker {
    path: PathBuf,
}

impl VersionMarker {
    /// Marker with the default file name inside `output_dir`.
    #[must_use]
    pub fn in_dir(output_dir: &Path) -> Self {
        Self::with_file_name(output_dir, MARKER_FILENAME)
    }

    /// Marker with a custom file name inside `output_dir`.
    #[must_use]
    pub fn with_file_name(output_dir: &Path, file_name: &str) -> Self {
        Self {
            path: output_dir.join(file_name),
        }
    }

    /// Full path of the marker file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return true when a marker file is present.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the recorded version.
    ///
    /// # Errors
    ///
    /// Returns [`MarkerError::NotFound`] when the file is absent,
    /// [`MarkerError::Corrupt`] when it is not a marker record,
    /// [`MarkerError::InvalidVersion`] when the recorded version does not
    /// parse, and [`MarkerError::Read`] on I/O failures.
    pub fn load(&self) -> Result<SemanticVersion, MarkerError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                return Err(MarkerError::NotFound {
                    path: self.path.clone(),
                });
            }
            Err(source) => {
                return Err(MarkerError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let record: MarkerRecord =
            toml::from_str(&content).map_err(|e| MarkerError::Corrupt {
                path: self.path.clone(),
                reason: e.message().to_owned(),
            })?;

        SemanticVersion::parse(&record.version).map_err(|source| MarkerError::InvalidVersion {
            path: self.path.clone(),
            source,
        })
    }

    /// Record `version`, replacing any previous marker.
    ///
    /// The output directory must already exist.
    ///
    /// # Errors
    ///
    /// Returns [`MarkerError::Write`] if the record cannot be written or
    /// moved into place.
    pub fn save(&self, version: &SemanticVersion) -> Result<(), MarkerError> {
        let record = MarkerRecord {
            version: version.to_string(),
        };
        let body = toml::to_string(&record).map_err(|e| MarkerError::Write {
            path: self.path.clone(),
            source: std::io::Error::other(e),
        })?;

        self.write_atomically(body.as_bytes())
            .map_err(|source| MarkerError::Write {
                path: self.path.clone(),
                source,
            })
    }

    fn write_atomically(&self, body: &[u8]) -> std::io::Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| std::io::Error::other("marker path has no parent directory"))?;
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(body)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
