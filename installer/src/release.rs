//! Release metadata lookup and archive download.
//!
//! Provides a trait-based abstraction over the upstream releases endpoint so
//! the sync pipeline can be exercised without network access.

use std::io;
use std::path::Path;
use std::time::Duration;

use log::debug;
use serde::Deserialize;

/// Media type requested from GitHub-style release endpoints.
const ACCEPT: &str = "application/vnd.github+json";

/// The subset of a release description the sync needs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseInfo {
    /// Release tag, usually a version with a `v` prefix.
    pub tag_name: String,
    /// Location of the gzip-compressed source tarball.
    pub tarball_url: String,
}

/// Trait for fetching release metadata and archives.
///
/// Abstractions allow tests to mock HTTP behaviour without network access.
///
/// # Examples
///
/// ```
/// use relsync::release::HttpReleaseSource;
/// use std::time::Duration;
///
/// let source = HttpReleaseSource::new(
///     "https://api.github.com/repos/swagger-api/swagger-ui/releases/latest",
///     "relsync-docs",
///     Duration::from_secs(30),
/// );
/// assert!(source.releases_url().ends_with("/releases/latest"));
/// // Use source.latest_release() in production
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait ReleaseSource {
    /// Fetch the description of the latest release.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body is not a release
    /// description.
    fn latest_release(&self) -> Result<ReleaseInfo, FetchError>;

    /// Stream the archive at `url` into the file `dest`.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns an error if the download or file write fails.
    fn download_archive(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}

/// Errors arising from release lookups and downloads.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// HTTP request failed.
    #[error("request failed for {url}: {reason}")]
    Http {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested resource was not found (HTTP 404).
    #[error("not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// The release endpoint answered with something other than a release.
    #[error("invalid release metadata from {url}: {reason}")]
    InvalidMetadata {
        /// The metadata URL.
        url: String,
        /// Decoder message.
        reason: String,
    },

    /// I/O error writing the downloaded file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] io::Error),
}

/// HTTP-based release source using `ureq`.
///
/// `timeout` bounds connecting and waiting for the response head on every
/// request. The metadata request is additionally capped as a whole; archive
/// bodies may take as long as they need once data is flowing.
pub struct HttpReleaseSource {
    releases_url: String,
    user_agent: String,
    timeout: Duration,
    agent: ureq::Agent,
}

impl HttpReleaseSource {
    /// Create a source for `releases_url`.
    #[must_use]
    pub fn new(releases_url: &str, user_agent: &str, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(timeout))
            .timeout_recv_response(Some(timeout))
            .build();
        Self {
            releases_url: releases_url.to_owned(),
            user_agent: user_agent.to_owned(),
            timeout,
            agent: ureq::Agent::new_with_config(config),
        }
    }

    /// The metadata endpoint this source queries.
    #[must_use]
    pub fn releases_url(&self) -> &str {
        &self.releases_url
    }

    fn get(
        &self,
        url: &str,
        call_limit: Option<Duration>,
    ) -> Result<ureq::http::Response<ureq::Body>, FetchError> {
        debug!("GET {url}");
        self.agent
            .get(url)
            .config()
            .timeout_global(call_limit)
            .build()
            .header("User-Agent", self.user_agent.as_str())
            .header("Accept", ACCEPT)
            .call()
            .map_err(|e| map_ureq_error(url, &e))
    }
}

impl ReleaseSource for HttpReleaseSource {
    fn latest_release(&self) -> Result<ReleaseInfo, FetchError> {
        let url = self.releases_url.as_str();
        let body = self
            .get(url, Some(self.timeout))?
            .into_body()
            .read_to_string()
            .map_err(|e| FetchError::Http {
                url: url.to_owned(),
                reason: e.to_string(),
            })?;
        parse_release(url, &body)
    }

    fn download_archive(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let response = self.get(url, None)?;
        let mut file = std::fs::File::create(dest)?;
        let mut body = response.into_body();
        let written = io::copy(&mut body.as_reader(), &mut file).map_err(FetchError::Io)?;
        file.sync_all()?;
        debug!("downloaded {written} bytes from {url}");
        Ok(written)
    }
}

/// Decode a release description from the endpoint's JSON body.
///
/// # Errors
///
/// Returns [`FetchError::InvalidMetadata`] when required fields are missing
/// or the body is not JSON.
pub fn parse_release(url: &str, body: &str) -> Result<ReleaseInfo, FetchError> {
    serde_json::from_str(body).map_err(|e| FetchError::InvalidMetadata {
        url: url.to_owned(),
        reason: e.to_string(),
    })
}

/// Map a ureq error to a [`FetchError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> FetchError {
    match err {
        ureq::Error::StatusCode(404) => FetchError::NotFound {
            url: url.to_owned(),
        },
        other => FetchError::Http {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}
