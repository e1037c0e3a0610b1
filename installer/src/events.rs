//! Structured progress events emitted by the sync pipeline.
//!
//! The pipeline never prints. It hands `{stage, message}` events to a
//! [`SyncReporter`]; the CLI renders them on stderr and tests collect them in
//! a `Vec`.

use std::fmt;
use std::io::Write;

/// Pipeline stage that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStage {
    /// Reading the version marker.
    CheckMarker,
    /// Fetching and comparing the remote version.
    CompareVersions,
    /// Downloading the archive.
    Download,
    /// Unpacking into the staging area.
    Extract,
    /// Copying the payload into the output directory.
    Relocate,
    /// Writing the version marker.
    RecordVersion,
    /// Removing the staging area.
    Cleanup,
}

impl SyncStage {
    /// Short lowercase label used in rendered output.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::CheckMarker => "marker",
            Self::CompareVersions => "compare",
            Self::Download => "download",
            Self::Extract => "extract",
            Self::Relocate => "relocate",
            Self::RecordVersion => "record",
            Self::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLevel {
    /// Normal progress.
    Info,
    /// Something went wrong without failing the run.
    Warning,
}

/// One progress event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    /// Stage that emitted the event.
    pub stage: SyncStage,
    /// Severity.
    pub level: EventLevel,
    /// Human-readable description.
    pub message: String,
}

impl SyncEvent {
    /// Create a progress event for `stage`.
    #[must_use]
    pub fn info(stage: SyncStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            level: EventLevel::Info,
            message: message.into(),
        }
    }

    /// Create a warning event for `stage`.
    #[must_use]
    pub fn warning(stage: SyncStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            level: EventLevel::Warning,
            message: message.into(),
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            EventLevel::Info => write!(f, "[{}] {}", self.stage, self.message),
            EventLevel::Warning => write!(f, "[{}] warning: {}", self.stage, self.message),
        }
    }
}

/// Consumer of pipeline events.
pub trait SyncReporter {
    /// Receive one event.
    fn report(&mut self, event: SyncEvent);
}

impl SyncReporter for Vec<SyncEvent> {
    fn report(&mut self, event: SyncEvent) {
        self.push(event);
    }
}

/// Renders events as lines on a writer (stderr in the CLI).
pub struct WriterReporter<W: Write> {
    out: W,
    quiet: bool,
}

impl<W: Write> WriterReporter<W> {
    /// Create a reporter; `quiet` drops everything but warnings.
    #[must_use]
    pub fn new(out: W, quiet: bool) -> Self {
        Self { out, quiet }
    }
}

impl<W: Write> SyncReporter for WriterReporter<W> {
    fn report(&mut self, event: SyncEvent) {
        match event.level {
            EventLevel::Info => log::info!("{event}"),
            EventLevel::Warning => log::warn!("{event}"),
        }
        if self.quiet && event.level == EventLevel::Info {
            return;
        }
        if writeln!(self.out, "{event}").is_err() {
            // Best-effort output; ignore write failures.
        }
    }
}
