//! Executor for relocation plans.
//!
//! Moves run first, grouped by target directory: directories are handled in
//! parallel, files within one directory sequentially. Deletions only start
//! after every move has finished, and only when their survivor is on disk.

use super::types::*;
use crate::error::RelocationError;
use crate::events::{Event, EventSender, ExecuteEvent};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Applies a plan to the filesystem
#[derive(Debug, Clone, Default)]
pub struct Executor {
    dry_run: bool,
}

impl Executor {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Execute every action, returning one outcome per action in plan order.
    ///
    /// A failing action never aborts the run.
    pub fn execute(&self, plan: &ArchivePlan, events: &EventSender) -> Vec<ActionOutcome> {
        let total = plan.actions.len();
        events.send(Event::Execute(ExecuteEvent::Started {
            total_actions: total,
            dry_run: self.dry_run,
        }));
        tracing::info!(actions = total, dry_run = self.dry_run, "executing plan");

        let progress = Progress {
            completed: AtomicUsize::new(0),
            total,
            events,
        };

        let mut by_dir: BTreeMap<&Path, Vec<usize>> = BTreeMap::new();
        let mut deletes = Vec::new();
        let mut outcomes: Vec<Option<ActionOutcome>> = vec![None; total];

        for (i, planned) in plan.actions.iter().enumerate() {
            match &planned.action {
                RelocationAction::Move { target } => by_dir
                    .entry(target.parent().unwrap_or(Path::new("")))
                    .or_default()
                    .push(i),
                RelocationAction::DeleteRedundant { .. } => deletes.push(i),
                RelocationAction::Skip { reason } => {
                    outcomes[i] = Some(ActionOutcome::new(
                        planned,
                        OutcomeStatus::Skipped,
                        Some(reason.to_string()),
                    ));
                    progress.tick();
                }
            }
        }

        let moved: Vec<(usize, ActionOutcome)> = by_dir
            .into_par_iter()
            .flat_map_iter(|(_, indices)| {
                indices
                    .into_iter()
                    .map(|i| (i, self.run_one(&plan.actions[i], &progress)))
                    .collect::<Vec<_>>()
            })
            .collect();

        // Barrier: every survivor is in its final place before anything is deleted
        let deleted: Vec<(usize, ActionOutcome)> = deletes
            .into_par_iter()
            .map(|i| (i, self.run_one(&plan.actions[i], &progress)))
            .collect();

        for (i, outcome) in moved.into_iter().chain(deleted) {
            outcomes[i] = Some(outcome);
        }

        let outcomes: Vec<ActionOutcome> = outcomes.into_iter().flatten().collect();
        let applied = outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Applied)
            .count();
        let failed = outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Failed)
            .count();

        events.send(Event::Execute(ExecuteEvent::Completed { applied, failed }));
        tracing::info!(applied, failed, "execution finished");
        outcomes
    }

    fn run_one(&self, planned: &PlannedAction, progress: &Progress<'_>) -> ActionOutcome {
        let outcome = if self.dry_run {
            ActionOutcome::new(planned, OutcomeStatus::Planned, None)
        } else {
            match &planned.action {
                RelocationAction::Move { target } => match move_file(&planned.source, target) {
                    Ok(()) => ActionOutcome::new(planned, OutcomeStatus::Applied, None),
                    Err(error) => failed(planned, error, progress),
                },
                RelocationAction::DeleteRedundant { survivor, .. } => {
                    match delete_redundant(&planned.source, survivor) {
                        Ok(None) => ActionOutcome::new(planned, OutcomeStatus::Applied, None),
                        Ok(Some(reason)) => {
                            tracing::warn!(path = %planned.source.display(), "delete skipped: {reason}");
                            ActionOutcome::new(planned, OutcomeStatus::Skipped, Some(reason))
                        }
                        Err(error) => failed(planned, error, progress),
                    }
                }
                RelocationAction::Skip { reason } => {
                    ActionOutcome::new(planned, OutcomeStatus::Skipped, Some(reason.to_string()))
                }
            }
        };
        progress.tick();
        outcome
    }
}

struct Progress<'a> {
    completed: AtomicUsize,
    total: usize,
    events: &'a EventSender,
}

impl Progress<'_> {
    fn tick(&self) {
        let completed = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        self.events.send(Event::Execute(ExecuteEvent::Progress {
            completed,
            total: self.total,
        }));
    }
}

fn failed(planned: &PlannedAction, error: RelocationError, progress: &Progress<'_>) -> ActionOutcome {
    tracing::error!(path = %planned.source.display(), "{error}");
    progress.events.send(Event::Execute(ExecuteEvent::Failed {
        path: planned.source.clone(),
        message: error.to_string(),
    }));
    ActionOutcome::new(planned, OutcomeStatus::Failed, Some(error.to_string()))
}

/// Move without ever overwriting, and without removing the source before
/// the destination is complete.
pub fn move_file(source: &Path, target: &Path) -> Result<(), RelocationError> {
    if !source.is_file() {
        return Err(RelocationError::SourceMissing {
            path: source.to_path_buf(),
        });
    }
    if fs::symlink_metadata(target).is_ok() {
        return Err(RelocationError::DestinationExists {
            path: target.to_path_buf(),
        });
    }

    let parent = target.parent().unwrap_or(Path::new(""));
    fs::create_dir_all(parent).map_err(|source| RelocationError::CreateDir {
        path: parent.to_path_buf(),
        source,
    })?;

    match fs::hard_link(source, target) {
        Ok(()) => remove(source),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(RelocationError::DestinationExists {
                path: target.to_path_buf(),
            })
        }
        Err(e) => {
            tracing::debug!(
                source = %source.display(),
                target = %target.display(),
                "hard link unavailable ({e}), copying"
            );
            copy_then_remove(source, target, parent)
        }
    }
}

/// Copy into a hidden `.partial` file next to the target, verify, then
/// publish it under the final name.
fn copy_then_remove(source: &Path, target: &Path, dir: &Path) -> Result<(), RelocationError> {
    let write_error = |e: io::Error| RelocationError::Write {
        path: target.to_path_buf(),
        source: e,
    };

    let metadata = fs::metadata(source).map_err(|_| RelocationError::SourceMissing {
        path: source.to_path_buf(),
    })?;
    let expected = metadata.len();

    let mut temp = tempfile::Builder::new()
        .prefix(".")
        .suffix(".partial")
        .tempfile_in(dir)
        .map_err(write_error)?;

    let mut input = File::open(source).map_err(write_error)?;
    io::copy(&mut input, temp.as_file_mut()).map_err(write_error)?;
    temp.as_file().sync_all().map_err(write_error)?;

    let actual = temp.as_file().metadata().map_err(write_error)?.len();
    if actual != expected {
        // Dropping `temp` removes the partial copy
        return Err(RelocationError::VerificationFailed {
            path: target.to_path_buf(),
            expected,
            actual,
        });
    }

    if let Ok(modified) = metadata.modified() {
        temp.as_file().set_modified(modified).map_err(write_error)?;
    }

    temp.persist_noclobber(target).map_err(|e| {
        if e.error.kind() == io::ErrorKind::AlreadyExists {
            RelocationError::DestinationExists {
                path: target.to_path_buf(),
            }
        } else {
            write_error(e.error)
        }
    })?;

    remove(source)
}

/// Delete a redundant copy. `Ok(Some(reason))` when it was left alone.
fn delete_redundant(path: &Path, survivor: &Path) -> Result<Option<String>, RelocationError> {
    if path == survivor {
        return Ok(Some("file is its own survivor".to_string()));
    }
    let source = fs::metadata(path).map_err(|_| RelocationError::SourceMissing {
        path: path.to_path_buf(),
    })?;

    match fs::metadata(survivor) {
        Ok(meta) if meta.is_file() && meta.len() == source.len() => {}
        Ok(meta) if meta.is_file() => {
            return Ok(Some(format!(
                "survivor {} changed size since planning",
                survivor.display()
            )))
        }
        _ => {
            return Ok(Some(format!(
                "survivor {} is not on disk",
                survivor.display()
            )))
        }
    }

    remove(path)?;
    Ok(None)
}

fn remove(path: &Path) -> Result<(), RelocationError> {
    fs::remove_file(path).map_err(|source| RelocationError::Remove {
        path: PathBuf::from(path),
        source,
    })
}
