//! # Core Module
//!
//! The archive engine, free of any CLI concerns.
//!
//! ## Modules
//! - `scanner` - Discovers photos and videos in directories
//! - `dating` - Resolves one capture date per file
//! - `hasher` - Computes content digests for duplicate candidates
//! - `duplicates` - Groups identical files and elects keepers
//! - `calendar` - Maps dates onto named events
//! - `organize` - Plans and applies relocations
//! - `pipeline` - Orchestrates the full workflow
//! - `reporter` - Per-file run reports and exports

pub mod calendar;
pub mod dating;
pub mod duplicates;
pub mod hasher;
pub mod organize;
pub mod pipeline;
pub mod reporter;
pub mod scanner;

// Re-export commonly used types
pub use calendar::{EventCalendar, EventRule};
pub use dating::{DateSource, DatedFile, ResolvedDate};
pub use duplicates::{DuplicateGroup, DuplicateIndex};
pub use hasher::ContentId;
pub use organize::{ArchivePlan, OutcomeStatus, RelocationAction};
pub use pipeline::Pipeline;
pub use reporter::RunReport;
pub use scanner::{MediaFile, MediaKind};
