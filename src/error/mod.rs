//! # Error Module
//!
//! Error types for the media archive.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, file names, what went wrong
//! - **Per-file errors are values** - they end up in the run report, not in `?`
//! - **Recovery hints** - suggest how to fix when possible

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
///
/// Only configuration problems surface here as a failed run. Everything that
/// concerns a single file is recorded in the report instead.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Scanning error: {0}")]
    Scan(#[from] ScanError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Report error: {0}")]
    Report(#[from] std::io::Error),
}

/// Errors that occur while walking the source tree
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Permission denied accessing: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Failed to read {path}: {source}")]
    ReadEntry {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// Path the error refers to
    pub fn path(&self) -> &PathBuf {
        match self {
            ScanError::DirectoryNotFound { path }
            | ScanError::PermissionDenied { path }
            | ScanError::ReadEntry { path, .. } => path,
        }
    }
}

/// Errors that occur while computing content digests
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Failed to read {path} for hashing: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that occur while applying a single relocation action
#[derive(Error, Debug)]
pub enum RelocationError {
    #[error("Source file not found: {path}")]
    SourceMissing { path: PathBuf },

    #[error("Destination already exists, refusing to overwrite: {path}")]
    DestinationExists { path: PathBuf },

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Copy verification failed for {path}: source {expected} bytes, destination {actual} bytes")]
    VerificationFailed {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("Failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors in the run configuration, detected before anything is touched
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Event '{name}' ends before it starts ({start} > {end})")]
    InvalidEventRange {
        name: String,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    #[error("Event name '{name}' cannot be used as a folder name")]
    InvalidEventName { name: String },

    #[error("Failed to read event rules from {path}: {reason}")]
    EventFile { path: PathBuf, reason: String },

    #[error("No archive root given")]
    MissingArchiveRoot,

    #[error("Archive root {path} exists but is not a directory")]
    ArchiveNotDirectory { path: PathBuf },

    #[error("Failed to build worker pool: {0}")]
    WorkerPool(String),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, ArchiveError>;
