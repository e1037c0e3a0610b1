//! Sync settings loaded from an optional TOML file.
//!
//! Settings resolve in order of precedence: command-line flags, then the
//! `RELSYNC_RELEASES_URL` environment variable, then the settings file, then
//! built-in defaults. The defaults track the swagger-ui project: its latest
//! GitHub release, with the `dist` directory as the payload.

use std::path::{Component, Path};
use std::time::Duration;

use camino::Utf8Path;
use serde::Deserialize;

use crate::marker::MARKER_FILENAME;

/// Environment variable overriding the releases endpoint.
pub const RELEASES_URL_ENV: &str = "RELSYNC_RELEASES_URL";

const DEFAULT_RELEASES_URL: &str =
    "https://api.github.com/repos/swagger-api/swagger-ui/releases/latest";
const DEFAULT_PAYLOAD_DIR: &str = "dist";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Errors raised while loading settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("failed to read settings file {path}: {source}")]
    Read {
        /// Settings file path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid TOML for this schema.
    #[error("invalid settings file {path}: {reason}")]
    Parse {
        /// Settings file path.
        path: String,
        /// Parser message.
        reason: String,
    },

    /// A setting holds a value that cannot be used.
    #[error("invalid setting {key}: {reason}")]
    Invalid {
        /// Setting name.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Settings controlling where releases come from and how they are laid out.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SyncSettings {
    /// Endpoint returning `{tag_name, tarball_url}` JSON for the latest
    /// release.
    pub releases_url: String,
    /// Directory inside the archive's top-level folder that is copied to the
    /// output directory. Empty copies the whole top-level folder.
    pub payload_dir: String,
    /// File name of the version marker inside the output directory.
    pub marker_file: String,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
    /// Connect and response-head timeout, in seconds; also caps the whole
    /// metadata request.
    pub timeout_secs: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            releases_url: DEFAULT_RELEASES_URL.to_owned(),
            payload_dir: DEFAULT_PAYLOAD_DIR.to_owned(),
            marker_file: MARKER_FILENAME.to_owned(),
            user_agent: concat!("relsync/", env!("CARGO_PKG_VERSION")).to_owned(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl SyncSettings {
    /// Read settings from `path`, or return defaults when `path` is `None`.
    ///
    /// Values are not validated here; callers layer their overrides first
    /// and then call [`SyncSettings::validate`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn read(path: Option<&Utf8Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    fn from_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;
        Self::from_toml(&source).map_err(|reason| ConfigError::Parse {
            path: path.to_string(),
            reason,
        })
    }

    /// Parse settings from TOML text; omitted keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns the parser message on failure.
    pub fn from_toml(source: &str) -> Result<Self, String> {
        toml::from_str(source).map_err(|e| e.message().to_owned())
    }

    /// Apply the environment override for the releases endpoint, reading
    /// variables through `lookup`.
    #[must_use]
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(RELEASES_URL_ENV).filter(|url| !url.trim().is_empty()) {
            self.releases_url = url.trim().to_owned();
        }
        self
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check values that would otherwise fail late in the run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.releases_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "releases_url",
                reason: "must not be empty".to_owned(),
            });
        }
        if !is_plain_relative(&self.payload_dir) {
            return Err(ConfigError::Invalid {
                key: "payload_dir",
                reason: format!("{:?} must be a relative path without `..`", self.payload_dir),
            });
        }
        if !is_single_file_name(&self.marker_file) {
            return Err(ConfigError::Invalid {
                key: "marker_file",
                reason: format!("{:?} must be a bare file name", self.marker_file),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "timeout_secs",
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

fn is_plain_relative(value: &str) -> bool {
    Path::new(value)
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

fn is_single_file_name(value: &str) -> bool {
    let mut components = Path::new(value).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn defaults_track_swagger_ui() {
        let settings = SyncSettings::default();

        assert!(settings.releases_url.contains("swagger-api/swagger-ui"));
        assert_eq!(settings.payload_dir, "dist");
        assert_eq!(settings.marker_file, MARKER_FILENAME);
        assert!(settings.user_agent.starts_with("relsync/"));
        assert_eq!(settings.timeout(), Duration::from_secs(30));
        assert!(settings.validate().is_ok());
    }

    #[rstest]
    fn deserialises_partial_overrides() {
        let settings = SyncSettings::from_toml("payload_dir = \"build\"\ntimeout_secs = 5\n")
            .expect("expected settings to parse");

        assert_eq!(settings.payload_dir, "build");
        assert_eq!(settings.timeout_secs, 5);
        assert_eq!(settings.marker_file, MARKER_FILENAME);
    }

    #[rstest]
    fn rejects_unknown_fields() {
        assert!(SyncSettings::from_toml("checksum = true\n").is_err());
    }

    #[rstest]
    fn rejects_wrongly_typed_values() {
        assert!(SyncSettings::from_toml("timeout_secs = \"soon\"\n").is_err());
    }

    #[rstest]
    #[case::parent_payload("payload_dir", SyncSettings { payload_dir: "../etc".to_owned(), ..SyncSettings::default() })]
    #[case::absolute_payload("payload_dir", SyncSettings { payload_dir: "/dist".to_owned(), ..SyncSettings::default() })]
    #[case::nested_marker("marker_file", SyncSettings { marker_file: "a/b.toml".to_owned(), ..SyncSettings::default() })]
    #[case::empty_marker("marker_file", SyncSettings { marker_file: String::new(), ..SyncSettings::default() })]
    #[case::empty_url("releases_url", SyncSettings { releases_url: " ".to_owned(), ..SyncSettings::default() })]
    #[case::zero_timeout("timeout_secs", SyncSettings { timeout_secs: 0, ..SyncSettings::default() })]
    fn validate_rejects_unusable_values(#[case] expected_key: &str, #[case] settings: SyncSettings) {
        match settings.validate() {
            Err(ConfigError::Invalid { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[rstest]
    fn empty_payload_dir_is_allowed() {
        let settings = SyncSettings {
            payload_dir: String::new(),
            ..SyncSettings::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[rstest]
    fn env_override_replaces_releases_url() {
        let settings = SyncSettings::default().with_env_overrides(|key| {
            (key == RELEASES_URL_ENV).then(|| " https://example.test/latest ".to_owned())
        });
        assert_eq!(settings.releases_url, "https://example.test/latest");
    }

    #[rstest]
    fn blank_env_override_is_ignored() {
        let settings = SyncSettings::default().with_env_overrides(|_| Some("  ".to_owned()));
        assert_eq!(settings.releases_url, DEFAULT_RELEASES_URL);
    }

    #[rstest]
    fn process_environment_is_consulted() {
        temp_env::with_var(RELEASES_URL_ENV, Some("https://mirror.test/latest"), || {
            let settings =
                SyncSettings::default().with_env_overrides(|key| std::env::var(key).ok());
            assert_eq!(settings.releases_url, "https://mirror.test/latest");
        });
    }

    #[rstest]
    fn read_keeps_file_values_for_later_validation() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("relsync.toml");
        std::fs::write(&path, "payload_dir = \"../escape\"\n").expect("write settings");
        let path = camino::Utf8PathBuf::try_from(path).expect("utf-8 path");

        let settings = SyncSettings::read(Some(&path)).expect("settings file parses");
        assert_eq!(settings.payload_dir, "../escape");
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid { key: "payload_dir", .. })
        ));
    }

    #[rstest]
    fn read_reports_missing_file() {
        let path = camino::Utf8PathBuf::from("/nonexistent/relsync.toml");
        assert!(matches!(
            SyncSettings::read(Some(&path)),
            Err(ConfigError::Read { .. })
        ));
    }

    #[rstest]
    fn read_reports_malformed_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("relsync.toml");
        std::fs::write(&path, "payload_dir = [\n").expect("write settings");
        let path = camino::Utf8PathBuf::try_from(path).expect("utf-8 path");

        assert!(matches!(
            SyncSettings::read(Some(&path)),
            Err(ConfigError::Parse { .. })
        ));
    }
}
