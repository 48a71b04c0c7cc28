//! Archive relocation module.
//!
//! Turns dated, deduplicated files into a relocation plan and applies it
//! to the `YYYY/YYYYMM[/event]` archive layout.

mod executor;
mod planner;
mod types;

pub use executor::{move_file, Executor};
pub use planner::{RelocationPlanner, DEFAULT_SUFFIX_LEN};
pub use types::*;
