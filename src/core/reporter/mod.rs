//! # Reporter Module
//!
//! Records what a run did to every file, and why.
//!
//! Every scanned file gets exactly one entry: the action that was planned,
//! the outcome of executing it, and a reason whenever the file was left
//! alone or something went wrong. Nothing a run does is silent.

mod export;

pub use export::{export_csv, export_json, export_to_file, format_bytes, ExportFormat};

use crate::core::dating::DateSource;
use crate::core::organize::{ActionOutcome, ArchivePlan, OutcomeStatus, PlanSummary, RelocationAction};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One file's line in the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub source: PathBuf,
    /// `move`, `delete` or `skip`
    pub action: String,
    /// Move destination
    pub target: Option<PathBuf>,
    /// Copy that makes a deletion safe
    pub survivor: Option<PathBuf>,
    pub date: NaiveDateTime,
    pub date_source: DateSource,
    pub status: OutcomeStatus,
    pub reason: Option<String>,
}

/// Counts per outcome and action
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_files: usize,
    pub moved: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Actions a dry run would have applied
    pub planned: usize,
    pub duplicate_groups: usize,
    /// Bytes freed by applied deletions
    pub reclaimed_bytes: u64,
    /// Files that could not be scanned or hashed
    pub read_errors: usize,
}

/// Complete result of a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub dry_run: bool,
    pub source_root: PathBuf,
    /// `None` for deduplicate-only runs
    pub archive_root: Option<PathBuf>,
    pub plan: PlanSummary,
    pub summary: ReportSummary,
    pub entries: Vec<ReportEntry>,
    /// Scan and hash errors, one message per file
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

impl RunReport {
    /// Join a plan with its execution outcomes (both in plan order)
    pub fn new(
        plan: &ArchivePlan,
        outcomes: Vec<ActionOutcome>,
        dry_run: bool,
        source_root: PathBuf,
        archive_root: Option<PathBuf>,
    ) -> Self {
        let mut summary = ReportSummary {
            total_files: plan.actions.len(),
            ..Default::default()
        };

        let entries: Vec<ReportEntry> = plan
            .actions
            .iter()
            .zip(outcomes)
            .map(|(planned, outcome)| {
                match (outcome.status, &outcome.action) {
                    (OutcomeStatus::Applied, RelocationAction::Move { .. }) => summary.moved += 1,
                    (OutcomeStatus::Applied, RelocationAction::DeleteRedundant { .. }) => {
                        summary.deleted += 1;
                        summary.reclaimed_bytes += planned.size_bytes;
                    }
                    (OutcomeStatus::Applied, RelocationAction::Skip { .. }) => {}
                    (OutcomeStatus::Skipped, _) => summary.skipped += 1,
                    (OutcomeStatus::Failed, _) => summary.failed += 1,
                    (OutcomeStatus::Planned, _) => summary.planned += 1,
                }

                let survivor = match &outcome.action {
                    RelocationAction::DeleteRedundant { survivor, .. } => Some(survivor.clone()),
                    _ => None,
                };
                ReportEntry {
                    target: outcome.action.target().map(PathBuf::from),
                    action: outcome.action.kind().to_string(),
                    survivor,
                    source: outcome.source,
                    date: planned.resolved.date,
                    date_source: planned.resolved.source,
                    status: outcome.status,
                    reason: outcome.reason,
                }
            })
            .collect();

        Self {
            run_id: plan.id.clone(),
            dry_run,
            source_root,
            archive_root,
            plan: plan.summary.clone(),
            summary,
            entries,
            errors: Vec::new(),
            duration_ms: 0,
        }
    }

    /// True when at least one action failed
    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    pub fn entries_with(&self, status: OutcomeStatus) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(move |e| e.status == status)
    }

    /// Entry for a source path
    pub fn entry_for(&self, source: &std::path::Path) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.source == source)
    }
}
