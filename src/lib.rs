//! # Media Archive
//!
//! Reconciles an unsorted tree of photos and videos into a canonical,
//! deduplicated archive laid out by capture date.
//!
//! ## Core Philosophy
//! - **Never lose a photo** - a source is only removed once its copy is confirmed
//! - **Explain every date** - each file records which source its date came from
//! - **Preview first** - dry-run computes the exact same plan without touching disk
//!
//! ## Architecture
//! - `core` - The scan / date / hash / plan / execute engine
//! - `events` - Event-driven progress reporting
//! - `error` - Error types

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{ArchiveError, Result};

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// File name prefix of the persistent run log
pub const LOG_FILE_PREFIX: &str = "media_archive";

/// Rotated log files kept on disk
pub const MAX_LOG_FILES: usize = 14;

/// Initialize tracing for the library
///
/// This should be called by the application entry point. `RUST_LOG` takes
/// precedence; otherwise the level is `info`, or `debug` when `verbose`.
/// Events go to stderr and, when `log_dir` is given, to a daily rotated
/// `media_archive.<date>.log` in that directory. Keep the returned guard
/// alive until exit so buffered lines reach the file.
pub fn init_tracing(verbose: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (file_layer, guard, file_error) = match log_dir.map(open_log_file) {
        Some(Ok(appender)) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard), None)
        }
        Some(Err(e)) => (None, None, Some(e)),
        None => (None, None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();

    // A second call (tests, embedding apps) keeps the first subscriber.
    if installed.is_err() {
        return None;
    }
    if let Some(e) = file_error {
        tracing::warn!("log file disabled: {e}");
    }
    guard
}

fn open_log_file(dir: &Path) -> std::result::Result<RollingFileAppender, InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
}
