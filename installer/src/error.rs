//! Error types for a sync run.
//!
//! Each module owns a focused error enum; [`SyncError`] composes them into
//! the single failure type the CLI reports. Any `SyncError` ends the run with
//! a non-zero exit code and leaves the version marker untouched.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::extraction::ExtractionError;
use crate::marker::MarkerError;
use crate::relocate::LayoutError;
use crate::release::FetchError;
use crate::semver::ParseError;

/// Errors that abort a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Settings could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Release metadata or archive could not be fetched.
    #[error("network error: {0}")]
    Network(#[from] FetchError),

    /// The upstream release tag is not a usable version.
    #[error("upstream release tag \"{tag}\" is not a valid version: {source}")]
    RemoteVersion {
        /// The tag as published.
        tag: String,
        /// Parse failure.
        #[source]
        source: ParseError,
    },

    /// The archive could not be unpacked safely.
    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractionError),

    /// The unpacked archive does not have the expected shape, or its payload
    /// could not be copied out.
    #[error("relocation failed: {0}")]
    Layout(#[from] LayoutError),

    /// The version marker could not be written.
    #[error(transparent)]
    Marker(#[from] MarkerError),

    /// A filesystem operation outside the other categories failed.
    #[error("{context} {path}: {source}")]
    Io {
        /// What was being attempted.
        context: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using [`SyncError`].
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_version_error_names_the_tag() {
        let err = SyncError::RemoteVersion {
            tag: "latest".to_owned(),
            source: ParseError::InvalidComponent {
                raw: "latest".to_owned(),
                component: "atest".to_owned(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("\"latest\""));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn io_error_includes_context_and_path() {
        let err = SyncError::Io {
            context: "failed to create staging area in",
            path: PathBuf::from("/readonly"),
            source: std::io::Error::other("permission denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("staging area"));
        assert!(msg.contains("/readonly"));
        assert!(msg.contains("permission denied"));
    }

    #[test]
    fn network_error_wraps_fetch_error() {
        let err = SyncError::from(FetchError::NotFound {
            url: "https://example.test/latest".to_owned(),
        });
        assert!(err.to_string().starts_with("network error"));
    }

    #[test]
    fn layout_error_is_reported_as_relocation_failure() {
        let err = SyncError::from(LayoutError::UnexpectedTopLevel {
            entries: vec!["a".to_owned(), "b".to_owned()],
        });
        let msg = err.to_string();
        assert!(msg.contains("relocation failed"));
        assert!(msg.contains("found 2"));
    }
}
