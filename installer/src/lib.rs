//! relsync library.
//!
//! This crate keeps a local directory in sync with the latest packaged
//! release of an upstream project. It is used by the `relsync` CLI binary
//! and can be driven programmatically with injected release sources and
//! extractors for testing.
//!
//! # Modules
//!
//! - [`cli`] - Command-line argument definitions and settings precedence
//! - [`config`] - TOML settings and environment overrides
//! - [`error`] - Error composition for a sync run
//! - [`events`] - Structured progress events and reporters
//! - [`extraction`] - Streaming tarball extraction with traversal protection
//! - [`marker`] - Version marker persistence
//! - [`release`] - Release metadata lookup and archive download
//! - [`relocate`] - Copying the payload into the output directory
//! - [`semver`] - Version parsing and ordering
//! - [`staging`] - Transient staging area
//! - [`sync`] - Sync orchestration

pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod extraction;
pub mod marker;
pub mod release;
pub mod relocate;
pub mod semver;
pub mod staging;
pub mod sync;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
