//! # Pipeline Module
//!
//! Orchestrates a full archive run.
//!
//! ## Pipeline Stages
//! 1. **Scan** - Discover photos and videos under the source root
//! 2. **Analyze** - Resolve dates and hash duplicate candidates, side by side
//! 3. **Plan** - Elect keepers and compute every file's action
//! 4. **Execute** - Apply the plan (or only report it, on a dry run)
//!
//! ## Parallelism
//! Each run gets its own bounded rayon pool, so a large archive on a NAS
//! is never hit by more concurrent reads than `workers`.

mod executor;

pub use executor::{Pipeline, PipelineBuilder, PipelineConfig, DEFAULT_WORKERS};
