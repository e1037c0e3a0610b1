//! Sync orchestrator.
//!
//! One run walks a fixed sequence: read the version marker, fetch and compare
//! the upstream version, and when upstream is newer download the archive,
//! unpack it into a staging area, relocate the payload into the output
//! directory, and record the new version. The marker is written only after
//! relocation succeeds, so a failed run leaves it untouched and the next run
//! retries.
//!
//! The staging area is owned by the run. Its drop removes it on every exit
//! path; the orchestrator closes it explicitly so that a cleanup failure is
//! reported as an event without replacing the run's result.

use std::fs;
use std::io;
use std::path::Path;

use log::debug;

use crate::config::SyncSettings;
use crate::error::{Result, SyncError};
use crate::events::{SyncEvent, SyncReporter, SyncStage};
use crate::extraction::{ArchiveExtractor, ExtractSummary, TarballExtractor};
use crate::marker::{MarkerError, VersionMarker};
use crate::release::{HttpReleaseSource, ReleaseInfo, ReleaseSource};
use crate::relocate::{RelocateSummary, relocate};
use crate::semver::{SemanticVersion, is_newer};
use crate::staging::StagingArea;

/// Inputs for one sync run.
#[derive(Debug, Clone, Copy)]
pub struct SyncConfig<'a> {
    /// Directory receiving the payload and the version marker.
    pub output_dir: &'a Path,
    /// Parent directory of the transient staging area.
    pub work_dir: &'a Path,
    /// Subdirectory of the archive's top-level folder to copy out. Empty
    /// copies the whole folder.
    pub payload_dir: &'a str,
    /// File name of the version marker.
    pub marker_file: &'a str,
    /// Stop after the version comparison.
    pub dry_run: bool,
}

/// What an update did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSummary {
    /// Size of the downloaded archive.
    pub downloaded_bytes: u64,
    /// Extraction counts.
    pub extracted: ExtractSummary,
    /// Relocation counts.
    pub relocated: RelocateSummary,
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The output directory already holds the latest version.
    UpToDate {
        /// Version read from the marker (or the baseline).
        current: SemanticVersion,
        /// Latest upstream version.
        remote: SemanticVersion,
    },
    /// A newer version exists but the run was a dry run.
    UpdateAvailable {
        /// Version read from the marker (or the baseline).
        current: SemanticVersion,
        /// Latest upstream version.
        remote: SemanticVersion,
    },
    /// The output directory was updated.
    Updated {
        /// Version recorded before the run (or the baseline).
        previous: SemanticVersion,
        /// Version now recorded in the marker.
        installed: SemanticVersion,
        /// Counts from the download, extraction, and relocation.
        summary: SyncSummary,
    },
}

/// Run a sync against the HTTP release source described by `settings`.
///
/// # Errors
///
/// Returns a [`SyncError`] when the remote version cannot be determined or
/// any step of the update fails.
pub fn run_sync(
    config: &SyncConfig<'_>,
    settings: &SyncSettings,
    reporter: &mut dyn SyncReporter,
) -> Result<SyncOutcome> {
    let source = HttpReleaseSource::new(
        &settings.releases_url,
        &settings.user_agent,
        settings.timeout(),
    );
    run_sync_with(config, &source, &TarballExtractor, reporter)
}

/// Testable inner function with injected collaborators.
///
/// [`run_sync`] delegates here with the HTTP source and the tarball
/// extractor.
///
/// # Errors
///
/// See [`run_sync`].
pub fn run_sync_with(
    config: &SyncConfig<'_>,
    source: &dyn ReleaseSource,
    extractor: &dyn ArchiveExtractor,
    reporter: &mut dyn SyncReporter,
) -> Result<SyncOutcome> {
    let marker = VersionMarker::with_file_name(config.output_dir, config.marker_file);
    let current = read_current_version(&marker, reporter);

    let release = source.latest_release()?;
    let remote = SemanticVersion::parse(&release.tag_name).map_err(|source| {
        SyncError::RemoteVersion {
            tag: release.tag_name.clone(),
            source,
        }
    })?;

    if !is_newer(&current, &remote) {
        reporter.report(SyncEvent::info(
            SyncStage::CompareVersions,
            format!("{current} is up to date (upstream {remote})"),
        ));
        return Ok(SyncOutcome::UpToDate { current, remote });
    }

    reporter.report(SyncEvent::info(
        SyncStage::CompareVersions,
        format!("update available: {current} -> {remote}"),
    ));
    if config.dry_run {
        return Ok(SyncOutcome::UpdateAvailable { current, remote });
    }

    if is_within(config.work_dir, config.output_dir) {
        reporter.report(SyncEvent::warning(
            SyncStage::Download,
            format!(
                "staging inside the output directory {}; pass --work-dir to stage elsewhere",
                config.output_dir.display()
            ),
        ));
    }
    let staging = StagingArea::create(config.work_dir).map_err(|source| SyncError::Io {
        context: "failed to create staging area in",
        path: config.work_dir.to_path_buf(),
        source,
    })?;
    debug!("staging in {}", staging.path().display());

    let installed = install_release(config, source, extractor, &release, &staging, reporter)
        .and_then(|summary| {
            record_version(&marker, &remote, reporter)?;
            Ok(summary)
        });
    close_staging(staging, reporter);

    Ok(SyncOutcome::Updated {
        previous: current,
        installed: remote,
        summary: installed?,
    })
}

/// Load the recorded version, substituting the baseline on any failure.
fn read_current_version(
    marker: &VersionMarker,
    reporter: &mut dyn SyncReporter,
) -> SemanticVersion {
    let baseline = SemanticVersion::baseline();
    match marker.load() {
        Ok(version) => {
            reporter.report(SyncEvent::info(
                SyncStage::CheckMarker,
                format!("recorded version {version}"),
            ));
            version
        }
        Err(err @ MarkerError::NotFound { .. }) => {
            reporter.report(SyncEvent::info(
                SyncStage::CheckMarker,
                format!("{err}; assuming {baseline}"),
            ));
            baseline
        }
        Err(err) => {
            reporter.report(SyncEvent::warning(
                SyncStage::CheckMarker,
                format!("{err}; assuming {baseline}"),
            ));
            baseline
        }
    }
}

/// Download, extract, and relocate `release` through `staging`.
fn install_release(
    config: &SyncConfig<'_>,
    source: &dyn ReleaseSource,
    extractor: &dyn ArchiveExtractor,
    release: &ReleaseInfo,
    staging: &StagingArea,
    reporter: &mut dyn SyncReporter,
) -> Result<SyncSummary> {
    reporter.report(SyncEvent::info(
        SyncStage::Download,
        format!("fetching {}", release.tarball_url),
    ));
    let archive_path = staging.archive_path();
    let downloaded_bytes = source.download_archive(&release.tarball_url, &archive_path)?;

    reporter.report(SyncEvent::info(
        SyncStage::Extract,
        format!("unpacking {downloaded_bytes} bytes"),
    ));
    let extract_dir = staging.extract_dir();
    let extracted = extractor.extract(&archive_path, &extract_dir)?;
    if extracted.skipped > 0 {
        reporter.report(SyncEvent::info(
            SyncStage::Extract,
            format!("skipped {} link or special entries", extracted.skipped),
        ));
    }

    let relocated = relocate(&extract_dir, config.payload_dir, config.output_dir)?;
    reporter.report(SyncEvent::info(
        SyncStage::Relocate,
        format!(
            "copied {} files into {}",
            relocated.files,
            config.output_dir.display()
        ),
    ));

    Ok(SyncSummary {
        downloaded_bytes,
        extracted,
        relocated,
    })
}

fn record_version(
    marker: &VersionMarker,
    version: &SemanticVersion,
    reporter: &mut dyn SyncReporter,
) -> Result<()> {
    marker.save(version)?;
    reporter.report(SyncEvent::info(
        SyncStage::RecordVersion,
        format!("recorded {version} in {}", marker.path().display()),
    ));
    Ok(())
}

fn close_staging(staging: StagingArea, reporter: &mut dyn SyncReporter) {
    let path = staging.path().to_path_buf();
    reporter.report(cleanup_event(&path, staging.close()));
}

/// Describe the outcome of removing the staging area at `path`.
fn cleanup_event(path: &Path, removal: io::Result<()>) -> SyncEvent {
    match removal {
        Ok(()) => SyncEvent::info(SyncStage::Cleanup, format!("removed {}", path.display())),
        Err(err) => SyncEvent::warning(
            SyncStage::Cleanup,
            format!("failed to remove {}: {err}", path.display()),
        ),
    }
}

/// Whether `work_dir` is `output_dir` or lies beneath it.
fn is_within(work_dir: &Path, output_dir: &Path) -> bool {
    let resolve = |path: &Path| fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    resolve(work_dir).starts_with(resolve(output_dir))
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
