//! relsync CLI entrypoint.
//!
//! This binary keeps an output directory in sync with the latest upstream
//! release and reports what it did on stderr.

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use relsync::cli::Cli;
use relsync::error::{Result, SyncError};
use relsync::events::WriterReporter;
use relsync::sync::{SyncConfig, SyncOutcome, run_sync};

fn main() {
    let cli = Cli::parse();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stderr: &mut dyn Write) -> Result<()> {
    let settings = cli.resolve_settings(|key| std::env::var(key).ok())?;
    let work_dir = resolve_work_dir(cli)?;

    let config = SyncConfig {
        output_dir: cli.output_dir.as_std_path(),
        work_dir: &work_dir,
        payload_dir: &settings.payload_dir,
        marker_file: &settings.marker_file,
        dry_run: cli.dry_run,
    };

    let mut reporter = WriterReporter::new(&mut *stderr, cli.quiet);
    let outcome = run_sync(&config, &settings, &mut reporter)?;

    if !cli.quiet {
        write_stderr_line(stderr, outcome_message(&outcome));
    }
    Ok(())
}

/// Uses `--work-dir` when given, otherwise the current directory.
fn resolve_work_dir(cli: &Cli) -> Result<PathBuf> {
    match &cli.work_dir {
        Some(dir) => Ok(dir.clone().into_std_path_buf()),
        None => std::env::current_dir().map_err(|source| SyncError::Io {
            context: "failed to resolve working directory",
            path: PathBuf::from("."),
            source,
        }),
    }
}

fn outcome_message(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::UpToDate { current, .. } => format!("Already up to date at {current}."),
        SyncOutcome::UpdateAvailable { current, remote } => {
            format!("Update available: {current} -> {remote} (dry run, nothing changed).")
        }
        SyncOutcome::Updated {
            previous,
            installed,
            summary,
        } => format!(
            "Updated {previous} -> {installed} ({} files).",
            summary.relocated.files
        ),
    }
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            1
        }
    }
}

fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}
