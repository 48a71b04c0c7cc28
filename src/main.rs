//! # media-archive CLI
//!
//! Command-line interface for the media archive.
//!
//! ## Usage
//! ```bash
//! media-archive organize ~/Inbox ~/Archive --dry-run
//! media-archive deduplicate ~/Pictures --output json
//! ```

mod cli;

use media_archive::Result;
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    cli::run()
}
