//! Types for the organize module.

use crate::core::dating::{DateSource, ResolvedDate};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// What will happen to one scanned file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelocationAction {
    /// Move the file to its archive location
    Move { target: PathBuf },
    /// Delete a byte-identical copy once `survivor` is confirmed on disk
    DeleteRedundant { keeper: PathBuf, survivor: PathBuf },
    /// Leave the file untouched
    Skip { reason: SkipReason },
}

impl RelocationAction {
    pub fn kind(&self) -> &'static str {
        match self {
            RelocationAction::Move { .. } => "move",
            RelocationAction::DeleteRedundant { .. } => "delete",
            RelocationAction::Skip { .. } => "skip",
        }
    }

    /// Destination path for moves
    pub fn target(&self) -> Option<&Path> {
        match self {
            RelocationAction::Move { target } => Some(target),
            _ => None,
        }
    }
}

/// Why a file is left where it is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// Source already sits at its archive location
    AlreadyInPlace,
    /// A byte-identical file already occupies the target
    IdenticalAtTarget { existing: PathBuf },
    /// Every disambiguated name is taken by different content
    CollisionUnresolvable { target: PathBuf },
    /// Source could not be read to settle a name collision
    Unreadable { message: String },
    /// Deduplicate-only runs never move files
    KeptInPlace,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::AlreadyInPlace => write!(f, "already in place"),
            SkipReason::IdenticalAtTarget { existing } => {
                write!(f, "identical file already at {}", existing.display())
            }
            SkipReason::CollisionUnresolvable { target } => write!(
                f,
                "name collision at {} could not be resolved",
                target.display()
            ),
            SkipReason::Unreadable { message } => write!(f, "source unreadable: {message}"),
            SkipReason::KeptInPlace => write!(f, "kept in place"),
        }
    }
}

/// An action bound to its source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedAction {
    pub source: PathBuf,
    pub size_bytes: u64,
    pub resolved: ResolvedDate,
    pub action: RelocationAction,
}

/// Summary of files by year
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearSummary {
    pub year: i32,
    pub count: usize,
    pub size_bytes: u64,
}

/// Totals shown before anything is executed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub total_files: usize,
    pub total_size_bytes: u64,
    pub moves: usize,
    pub deletions: usize,
    pub skips: usize,
    /// Moves that needed a disambiguated name
    pub conflicts: usize,
    /// Bytes freed by the deletions
    pub reclaimable_bytes: u64,
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Newest year first
    pub by_year: Vec<YearSummary>,
    pub by_source: BTreeMap<DateSource, usize>,
}

/// The relocation plan (preview)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivePlan {
    pub id: String,
    /// One entry per scanned file, sorted by source path
    pub actions: Vec<PlannedAction>,
    pub summary: PlanSummary,
}

impl ArchivePlan {
    pub(crate) fn new(actions: Vec<PlannedAction>, conflicts: usize) -> Self {
        let summary = summarize(&actions, conflicts);
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            actions,
            summary,
        }
    }

    pub fn moves(&self) -> impl Iterator<Item = &PlannedAction> {
        self.actions
            .iter()
            .filter(|a| matches!(a.action, RelocationAction::Move { .. }))
    }

    pub fn deletions(&self) -> impl Iterator<Item = &PlannedAction> {
        self.actions
            .iter()
            .filter(|a| matches!(a.action, RelocationAction::DeleteRedundant { .. }))
    }

    /// Action planned for a source path
    pub fn action_for(&self, source: &Path) -> Option<&RelocationAction> {
        self.actions
            .binary_search_by(|a| a.source.as_path().cmp(source))
            .ok()
            .map(|i| &self.actions[i].action)
    }
}

fn summarize(actions: &[PlannedAction], conflicts: usize) -> PlanSummary {
    let mut summary = PlanSummary {
        total_files: actions.len(),
        conflicts,
        ..Default::default()
    };
    let mut by_year: HashMap<i32, (usize, u64)> = HashMap::new();
    let mut earliest: Option<NaiveDate> = None;
    let mut latest: Option<NaiveDate> = None;

    for planned in actions {
        summary.total_size_bytes += planned.size_bytes;
        match planned.action {
            RelocationAction::Move { .. } => summary.moves += 1,
            RelocationAction::DeleteRedundant { .. } => {
                summary.deletions += 1;
                summary.reclaimable_bytes += planned.size_bytes;
            }
            RelocationAction::Skip { .. } => summary.skips += 1,
        }

        let date = planned.resolved.date.date();
        earliest = Some(earliest.map_or(date, |e| e.min(date)));
        latest = Some(latest.map_or(date, |l| l.max(date)));

        let entry = by_year.entry(date.year()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += planned.size_bytes;

        *summary.by_source.entry(planned.resolved.source).or_default() += 1;
    }

    summary.by_year = by_year
        .into_iter()
        .map(|(year, (count, size_bytes))| YearSummary {
            year,
            count,
            size_bytes,
        })
        .collect();
    summary.by_year.sort_by(|a, b| b.year.cmp(&a.year));
    summary.date_range = earliest.zip(latest);
    summary
}

/// How executing one action ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Applied,
    Skipped,
    Failed,
    /// Dry run: would have been applied
    Planned,
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeStatus::Applied => write!(f, "applied"),
            OutcomeStatus::Skipped => write!(f, "skipped"),
            OutcomeStatus::Failed => write!(f, "failed"),
            OutcomeStatus::Planned => write!(f, "planned"),
        }
    }
}

/// Result of executing one planned action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub source: PathBuf,
    pub action: RelocationAction,
    pub status: OutcomeStatus,
    pub reason: Option<String>,
}

impl ActionOutcome {
    pub(crate) fn new(planned: &PlannedAction, status: OutcomeStatus, reason: Option<String>) -> Self {
        Self {
            source: planned.source.clone(),
            action: planned.action.clone(),
            status,
            reason,
        }
    }
}
