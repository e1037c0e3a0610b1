//! Moving the extracted payload into the output directory.
//!
//! Upstream tarballs wrap everything in one generated top-level directory
//! (for GitHub, `<owner>-<repo>-<sha>/`). Relocation finds that directory,
//! picks the payload subtree inside it, and copies it over the output
//! directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::trace;
use walkdir::WalkDir;

/// Errors arising from an unexpected archive layout or a failed copy.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    /// The staging area does not hold exactly one top-level entry.
    #[error("expected one top-level directory in the archive, found {}: [{}]", .entries.len(), .entries.join(", "))]
    UnexpectedTopLevel {
        /// Names found at the top level.
        entries: Vec<String>,
    },

    /// The payload subdirectory is absent from the archive.
    #[error("payload directory {path} not found in the archive")]
    MissingPayload {
        /// Expected payload location inside the staging area.
        path: PathBuf,
    },

    /// Listing the staging area failed.
    #[error("failed to read {path}: {source}")]
    Scan {
        /// Directory being listed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Copying into the output directory failed.
    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        /// Source path.
        from: PathBuf,
        /// Destination path.
        to: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Counts of what a relocation copied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelocateSummary {
    /// Files copied into the output directory.
    pub files: usize,
}

/// Locate the single top-level directory of an extracted archive.
///
/// # Errors
///
/// Returns [`LayoutError::UnexpectedTopLevel`] unless `extract_dir` holds
/// exactly one entry and that entry is a directory.
pub fn single_top_level(extract_dir: &Path) -> Result<PathBuf, LayoutError> {
    let scan_error = |source| LayoutError::Scan {
        path: extract_dir.to_path_buf(),
        source,
    };
    let mut entries = fs::read_dir(extract_dir)
        .map_err(scan_error)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()
        .map_err(scan_error)?;
    entries.sort();

    match entries.as_slice() {
        [only] if only.is_dir() => Ok(only.clone()),
        _ => Err(LayoutError::UnexpectedTopLevel {
            entries: entries
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect(),
        }),
    }
}

/// Copy `<top>/<payload_dir>` from `extract_dir` into `output_dir`.
///
/// An empty `payload_dir` copies the whole top-level directory. The output
/// directory is created when absent; existing files are overwritten and
/// files not in the payload are left alone.
///
/// # Errors
///
/// Returns a [`LayoutError`] for unexpected layouts or copy failures.
pub fn relocate(
    extract_dir: &Path,
    payload_dir: &str,
    output_dir: &Path,
) -> Result<RelocateSummary, LayoutError> {
    let top = single_top_level(extract_dir)?;
    let payload = if payload_dir.is_empty() {
        top
    } else {
        top.join(payload_dir)
    };
    if !payload.is_dir() {
        return Err(LayoutError::MissingPayload { path: payload });
    }
    copy_tree(&payload, output_dir)
}

/// Recursively copy the contents of `src` into `dst`.
///
/// # Errors
///
/// Returns [`LayoutError::Copy`] naming the path that failed.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<RelocateSummary, LayoutError> {
    let copy_error = |from: &Path, to: &Path, source| LayoutError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };
    fs::create_dir_all(dst).map_err(|e| copy_error(src, dst, e))?;

    let mut summary = RelocateSummary::default();
    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| copy_error(src, dst, io::Error::from(e)))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| copy_error(entry.path(), dst, io::Error::other(e)))?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| copy_error(entry.path(), &target, e))?;
        } else if entry.file_type().is_file() {
            trace!("copying {} to {}", entry.path().display(), target.display());
            remove_existing_file(&target).map_err(|e| copy_error(entry.path(), &target, e))?;
            fs::copy(entry.path(), &target).map_err(|e| copy_error(entry.path(), &target, e))?;
            summary.files += 1;
        }
    }
    Ok(summary)
}

/// Unlink a file or link left at `target` by an earlier sync, so the copy
/// creates a fresh file instead of opening a read-only one or following a
/// link out of the output directory.
fn remove_existing_file(target: &Path) -> io::Result<()> {
    match fs::symlink_metadata(target) {
        Ok(meta) if !meta.is_dir() => fs::remove_file(target),
        Ok(_) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    struct Dirs {
        temp: TempDir,
        extract: PathBuf,
        output: PathBuf,
    }

    #[fixture]
    fn dirs() -> Dirs {
        let temp = tempfile::tempdir().expect("temp dir");
        let extract = temp.path().join("extracted");
        let output = temp.path().join("out");
        fs::create_dir(&extract).expect("create extract dir");
        Dirs {
            temp,
            extract,
            output,
        }
    }

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().expect("parent")).expect("create parent");
        fs::write(path, contents).expect("write file");
    }

    #[rstest]
    fn copies_payload_subtree_only(dirs: Dirs) {
        let top = dirs.extract.join("swagger-api-swagger-ui-abc123");
        write(&top.join("dist/index.html"), "<html/>");
        write(&top.join("dist/css/app.css"), "body{}");
        write(&top.join("README.md"), "readme");

        let summary = relocate(&dirs.extract, "dist", &dirs.output).expect("relocate");

        assert_eq!(summary.files, 2);
        assert_eq!(
            fs::read_to_string(dirs.output.join("index.html")).expect("read"),
            "<html/>"
        );
        assert!(dirs.output.join("css/app.css").is_file());
        assert!(!dirs.output.join("README.md").exists());
        assert!(!dirs.output.join("dist").exists());
    }

    #[rstest]
    fn empty_payload_copies_whole_top_level(dirs: Dirs) {
        let top = dirs.extract.join("project-1.0");
        write(&top.join("bin/tool"), "#!/bin/sh");
        write(&top.join("LICENSE"), "ISC");

        let summary = relocate(&dirs.extract, "", &dirs.output).expect("relocate");

        assert_eq!(summary.files, 2);
        assert!(dirs.output.join("bin/tool").is_file());
        assert!(dirs.output.join("LICENSE").is_file());
    }

    #[rstest]
    fn overwrites_existing_and_keeps_unrelated_files(dirs: Dirs) {
        let top = dirs.extract.join("pkg");
        write(&top.join("dist/index.html"), "new");
        write(&dirs.output.join("index.html"), "old");
        write(&dirs.output.join("local.txt"), "mine");

        relocate(&dirs.extract, "dist", &dirs.output).expect("relocate");

        assert_eq!(
            fs::read_to_string(dirs.output.join("index.html")).expect("read"),
            "new"
        );
        assert!(dirs.output.join("local.txt").is_file());
    }

    #[cfg(unix)]
    #[rstest]
    fn read_only_files_are_replaced_on_resync(dirs: Dirs) {
        use std::os::unix::fs::PermissionsExt;

        let top = dirs.extract.join("pkg");
        let published = top.join("dist/index.html");
        write(&published, "v1");
        fs::set_permissions(&published, fs::Permissions::from_mode(0o444)).expect("chmod");
        relocate(&dirs.extract, "dist", &dirs.output).expect("first relocate");
        let installed = dirs.output.join("index.html");
        let mode = fs::metadata(&installed).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o444);

        fs::set_permissions(&published, fs::Permissions::from_mode(0o644)).expect("chmod");
        write(&published, "v2");
        fs::set_permissions(&published, fs::Permissions::from_mode(0o444)).expect("chmod");
        relocate(&dirs.extract, "dist", &dirs.output).expect("second relocate");

        assert_eq!(fs::read_to_string(&installed).expect("read"), "v2");
    }

    #[cfg(unix)]
    #[rstest]
    fn links_in_the_output_are_replaced_not_followed(dirs: Dirs) {
        let outside = dirs.temp.path().join("outside.txt");
        fs::write(&outside, "untouched").expect("write outside");
        fs::create_dir_all(&dirs.output).expect("create output");
        std::os::unix::fs::symlink(&outside, dirs.output.join("index.html")).expect("symlink");
        write(&dirs.extract.join("pkg/dist/index.html"), "payload");

        relocate(&dirs.extract, "dist", &dirs.output).expect("relocate");

        assert_eq!(fs::read_to_string(&outside).expect("read outside"), "untouched");
        let installed = dirs.output.join("index.html");
        assert!(fs::symlink_metadata(&installed).expect("metadata").is_file());
        assert_eq!(fs::read_to_string(&installed).expect("read"), "payload");
    }

    #[rstest]
    fn two_top_level_entries_are_rejected(dirs: Dirs) {
        write(&dirs.extract.join("first/dist/a"), "a");
        write(&dirs.extract.join("second/dist/b"), "b");

        match relocate(&dirs.extract, "dist", &dirs.output) {
            Err(LayoutError::UnexpectedTopLevel { entries }) => {
                assert_eq!(entries, ["first", "second"]);
            }
            other => panic!("expected UnexpectedTopLevel, got {other:?}"),
        }
        assert!(!dirs.output.exists());
    }

    #[rstest]
    fn empty_extraction_is_rejected(dirs: Dirs) {
        assert!(matches!(
            single_top_level(&dirs.extract),
            Err(LayoutError::UnexpectedTopLevel { entries }) if entries.is_empty()
        ));
    }

    #[rstest]
    fn lone_top_level_file_is_rejected(dirs: Dirs) {
        write(&dirs.extract.join("release.txt"), "not a directory");
        assert!(matches!(
            single_top_level(&dirs.extract),
            Err(LayoutError::UnexpectedTopLevel { .. })
        ));
    }

    #[rstest]
    fn missing_payload_directory_is_reported(dirs: Dirs) {
        write(&dirs.extract.join("pkg/src/lib.rs"), "");

        let result = relocate(&dirs.extract, "dist", &dirs.output);
        assert!(matches!(result, Err(LayoutError::MissingPayload { .. })));
    }
}
