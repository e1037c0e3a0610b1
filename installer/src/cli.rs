//! CLI argument definitions for relsync.
//!
//! This module defines the command-line interface using clap and merges the
//! flags with the settings file and environment into one [`SyncSettings`].

use camino::Utf8PathBuf;
use clap::Parser;

use crate::config::{ConfigError, SyncSettings};

/// Keep a directory in sync with the latest upstream release.
#[derive(Parser, Debug, Clone)]
#[command(name = "relsync")]
#[command(version, about)]
#[command(long_about = concat!(
    "Keep a directory in sync with the latest upstream release.\n\n",
    "relsync asks the releases endpoint for the latest release, compares its ",
    "tag with the version recorded in the output directory, and when upstream ",
    "is newer downloads the source tarball, unpacks it in a staging area, and ",
    "copies the payload directory into place before recording the new version.\n\n",
    "By default the payload is the `dist` directory of the latest swagger-ui ",
    "release.",
))]
#[command(after_help = concat!(
    "ENVIRONMENT:\n",
    "  RELSYNC_RELEASES_URL    Releases endpoint (overridden by --releases-url)\n\n",
    "EXAMPLES:\n",
    "  Sync swagger-ui into ./static/docs:\n",
    "    $ relsync -o static/docs\n\n",
    "  Check for an update without downloading:\n",
    "    $ relsync -o static/docs --dry-run\n\n",
    "  Sync the whole source tree of another project:\n",
    "    $ relsync -o vendor/ui --payload-dir '' \\\n",
    "        --releases-url https://api.github.com/repos/owner/repo/releases/latest",
))]
pub struct Cli {
    /// Directory receiving the payload and the version marker.
    #[arg(short, long = "out", value_name = "DIR", default_value = ".")]
    pub output_dir: Utf8PathBuf,

    /// TOML settings file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Releases endpoint returning `tag_name` and `tarball_url`.
    #[arg(long, value_name = "URL")]
    pub releases_url: Option<String>,

    /// Directory inside the release archive to copy out ('' for all of it).
    #[arg(long, value_name = "NAME")]
    pub payload_dir: Option<String>,

    /// Parent directory of the staging area [default: current directory].
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<Utf8PathBuf>,

    /// Check for an update and exit without downloading.
    #[arg(long)]
    pub dry_run: bool,

    /// Suppress progress output (errors and warnings still shown).
    #[arg(short, long)]
    pub quiet: bool,
}

impl Default for Cli {
    /// Creates a `Cli` equivalent to running `relsync` with no arguments.
    fn default() -> Self {
        Self {
            output_dir: Utf8PathBuf::from("."),
            config: None,
            releases_url: None,
            payload_dir: None,
            work_dir: None,
            dry_run: false,
            quiet: false,
        }
    }
}

impl Cli {
    /// Resolve the effective settings.
    ///
    /// Flags win over the environment (read through `lookup`), which wins
    /// over the settings file, which wins over the built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the settings file cannot be loaded or the
    /// merged settings are invalid.
    ///
    /// # Examples
    ///
    /// ```
    /// use relsync::cli::Cli;
    ///
    /// let cli = Cli {
    ///     payload_dir: Some("build".to_owned()),
    ///     ..Cli::default()
    /// };
    /// let settings = cli.resolve_settings(|_| None).expect("valid settings");
    /// assert_eq!(settings.payload_dir, "build");
    /// ```
    pub fn resolve_settings<F>(&self, lookup: F) -> Result<SyncSettings, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = SyncSettings::read(self.config.as_deref())?.with_env_overrides(lookup);
        if let Some(url) = &self.releases_url {
            settings.releases_url.clone_from(url);
        }
        if let Some(payload_dir) = &self.payload_dir {
            settings.payload_dir.clone_from(payload_dir);
        }
        settings.validate()?;
        Ok(settings)
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
