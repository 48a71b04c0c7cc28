//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted by the archive pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Scanning phase events
    Scan(ScanEvent),
    /// Date resolution events
    Resolve(ResolveEvent),
    /// Content hashing events
    Hash(HashEvent),
    /// Execution phase events
    Execute(ExecuteEvent),
    /// Pipeline-level events
    Pipeline(PipelineEvent),
}

/// Events during the scanning phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Scanning has started
    Started { root: PathBuf },
    /// A media file was found
    FileFound { path: PathBuf },
    /// An error occurred but scanning continues
    Error { path: PathBuf, message: String },
    /// Scanning completed
    Completed { total_files: usize },
}

/// Events during date resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResolveEvent {
    /// Progress update
    Progress { completed: usize, total: usize },
    /// Resolution completed
    Completed { total: usize },
}

/// Events during the hashing phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum HashEvent {
    /// Hashing has started for the size-colliding candidates
    Started {
        candidates: usize,
        skipped_unique_size: usize,
        skipped_unique_prefix: usize,
    },
    /// Progress update during hashing
    Progress(HashProgress),
    /// A file could not be read; it is treated as unique
    Error { path: PathBuf, message: String },
    /// Hashing completed
    Completed {
        total_hashed: usize,
        duplicate_groups: usize,
    },
}

/// Progress information during hashing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashProgress {
    /// Number of files hashed so far
    pub completed: usize,
    /// Total number of files to hash
    pub total: usize,
    /// File just hashed
    pub current_path: PathBuf,
}

/// Events while applying the plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExecuteEvent {
    /// Execution has started
    Started { total_actions: usize, dry_run: bool },
    /// One action finished (any outcome)
    Progress { completed: usize, total: usize },
    /// An action failed; the run continues
    Failed { path: PathBuf, message: String },
    /// Execution completed
    Completed { applied: usize, failed: usize },
}

/// Pipeline-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// Pipeline has started
    Started,
    /// Moving to a new phase
    PhaseChanged { phase: PipelinePhase },
    /// Pipeline completed
    Completed { summary: PipelineSummary },
}

/// Phases of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelinePhase {
    Scanning,
    Analyzing,
    Planning,
    Executing,
}

/// Summary of pipeline results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Total media files scanned
    pub total_files: usize,
    /// Number of duplicate groups found
    pub duplicate_groups: usize,
    /// Files moved (or that would be moved)
    pub moves: usize,
    /// Redundant copies deleted (or that would be deleted)
    pub deletions: usize,
    /// Actions that failed
    pub failures: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl std::fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelinePhase::Scanning => write!(f, "Scanning"),
            PipelinePhase::Analyzing => write!(f, "Dating and hashing"),
            PipelinePhase::Planning => write!(f, "Planning"),
            PipelinePhase::Executing => write!(f, "Executing"),
        }
    }
}
