//! Plan generator for relocation runs.
//!
//! Targets are computed in parallel; claiming them is a single sequential
//! pass in source-path order, so the same inputs always give the same plan.

use super::types::*;
use crate::core::calendar::EventCalendar;
use crate::core::dating::{strip_disambiguation, DatedFile, DISAMBIGUATION_MARKER};
use crate::core::duplicates::{DuplicateIndex, FileRole};
use crate::core::hasher::{ContentHasher, ContentId, HashResult};
use chrono::Datelike;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Digest characters used for the first disambiguation attempt
pub const DEFAULT_SUFFIX_LEN: usize = 8;

/// Wider suffixes tried when a shorter one is still taken
const WIDER_SUFFIXES: [usize; 3] = [16, 32, 64];

/// Generates relocation plans
#[derive(Debug, Clone)]
pub struct RelocationPlanner {
    archive_root: PathBuf,
    calendar: Option<EventCalendar>,
    suffix_len: usize,
}

impl RelocationPlanner {
    pub fn new(archive_root: impl Into<PathBuf>) -> Self {
        Self {
            archive_root: archive_root.into(),
            calendar: None,
            suffix_len: DEFAULT_SUFFIX_LEN,
        }
    }

    /// File matching dates into event subfolders
    pub fn with_events(mut self, calendar: EventCalendar) -> Self {
        self.calendar = Some(calendar);
        self
    }

    /// First disambiguation width, clamped to 1..=64
    pub fn with_suffix_len(mut self, len: usize) -> Self {
        self.suffix_len = len.clamp(1, 64);
        self
    }

    /// `<archive>/YYYY/YYYYMM[/<event>]/<file name>`
    pub fn target_for(&self, dated: &DatedFile) -> PathBuf {
        let date = dated.resolved.date;
        let mut dir = self
            .archive_root
            .join(format!("{:04}", date.year()))
            .join(format!("{:04}{:02}", date.year(), date.month()));

        if let Some(event) = self
            .calendar
            .as_ref()
            .and_then(|calendar| calendar.classify(date.date()))
        {
            dir.push(event);
        }

        dir.join(dated.file.path.file_name().unwrap_or_default())
    }

    fn suffix_widths(&self) -> Vec<usize> {
        std::iter::once(self.suffix_len)
            .chain(WIDER_SUFFIXES.into_iter().filter(|&w| w > self.suffix_len))
            .collect()
    }

    /// Build the full organize plan: moves for keepers and unique files,
    /// deletions for redundant copies.
    pub fn plan(&self, dated: &[DatedFile], hashes: &HashResult, index: &DuplicateIndex) -> ArchivePlan {
        let mut files: Vec<&DatedFile> = dated.iter().collect();
        files.sort_by(|a, b| a.file.path.cmp(&b.file.path));

        let targets: Vec<Option<PathBuf>> = files
            .par_iter()
            .map(|d| match index.role(&d.file.path) {
                FileRole::Redundant(_) => None,
                FileRole::Keeper(_) | FileRole::Unique => Some(self.target_for(d)),
            })
            .collect();

        let mut pass = ClaimPass::new(&hashes.digests, self.suffix_widths());
        let mut decided: Vec<Option<RelocationAction>> = vec![None; files.len()];
        // digest -> (effective keeper, where the surviving copy ends up)
        let mut survivors: HashMap<&ContentId, (PathBuf, PathBuf)> = HashMap::new();
        let mut promoted: HashSet<PathBuf> = HashSet::new();

        for (i, (dated, target)) in files.iter().zip(&targets).enumerate() {
            let Some(target) = target else { continue };
            let source = &dated.file.path;
            let group = index.group_of(source);

            if let Some(group) = group {
                if target != source && group.redundant.contains(target) && target.is_file() {
                    // A redundant copy already sits where the keeper belongs
                    tracing::debug!(
                        keeper = %source.display(),
                        occupant = %target.display(),
                        "swapping keeper with copy already in place"
                    );
                    promoted.insert(target.clone());
                    survivors.insert(&group.digest, (target.clone(), target.clone()));
                    decided[i] = Some(RelocationAction::DeleteRedundant {
                        keeper: target.clone(),
                        survivor: target.clone(),
                    });
                    continue;
                }
            }

            let action = pass.resolve(dated, target);
            if let Some(group) = group {
                let survivor = match &action {
                    RelocationAction::Move { target } => target.clone(),
                    RelocationAction::Skip {
                        reason: SkipReason::IdenticalAtTarget { existing },
                    } => existing.clone(),
                    _ => source.clone(),
                };
                survivors.insert(&group.digest, (source.clone(), survivor));
            }
            decided[i] = Some(action);
        }

        let actions: Vec<PlannedAction> = files
            .iter()
            .zip(decided)
            .map(|(dated, decided)| {
                let source = &dated.file.path;
                let action = decided.unwrap_or_else(|| {
                    if promoted.contains(source) {
                        return RelocationAction::Skip {
                            reason: SkipReason::AlreadyInPlace,
                        };
                    }
                    let (keeper, survivor) = index
                        .group_of(source)
                        .and_then(|g| survivors.get(&g.digest).cloned())
                        .unwrap_or_else(|| {
                            let keeper = index
                                .group_of(source)
                                .map(|g| g.keeper.clone())
                                .unwrap_or_default();
                            (keeper.clone(), keeper)
                        });
                    RelocationAction::DeleteRedundant { keeper, survivor }
                });
                PlannedAction {
                    source: source.clone(),
                    size_bytes: dated.file.size,
                    resolved: dated.resolved,
                    action,
                }
            })
            .collect();

        let plan = ArchivePlan::new(actions, pass.conflicts);
        tracing::info!(
            moves = plan.summary.moves,
            deletions = plan.summary.deletions,
            skips = plan.summary.skips,
            conflicts = plan.summary.conflicts,
            "relocation plan ready"
        );
        plan
    }

    /// Deduplicate in place: nothing moves, redundant copies are deleted
    /// in favour of their keeper.
    pub fn plan_deduplication(dated: &[DatedFile], index: &DuplicateIndex) -> ArchivePlan {
        let mut actions: Vec<PlannedAction> = dated
            .iter()
            .map(|d| {
                let action = match index.role(&d.file.path) {
                    FileRole::Redundant(group) => RelocationAction::DeleteRedundant {
                        keeper: group.keeper.clone(),
                        survivor: group.keeper.clone(),
                    },
                    FileRole::Keeper(_) | FileRole::Unique => RelocationAction::Skip {
                        reason: SkipReason::KeptInPlace,
                    },
                };
                PlannedAction {
                    source: d.file.path.clone(),
                    size_bytes: d.file.size,
                    resolved: d.resolved,
                    action,
                }
            })
            .collect();
        actions.sort_by(|a, b| a.source.cmp(&b.source));

        ArchivePlan::new(actions, 0)
    }
}

/// `<stem>~<suffix>.<ext>` next to `base`, replacing any earlier suffix
fn disambiguated(base: &Path, suffix: &str) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = strip_disambiguation(&stem);
    let name = match base.extension() {
        Some(ext) => format!(
            "{stem}{DISAMBIGUATION_MARKER}{suffix}.{}",
            ext.to_string_lossy()
        ),
        None => format!("{stem}{DISAMBIGUATION_MARKER}{suffix}"),
    };
    base.with_file_name(name)
}

/// Who holds a candidate target
enum Occupancy {
    Free,
    /// `content` is the file whose bytes will be (or are) at the target
    Taken { content: PathBuf, size: Option<u64> },
}

struct Claim {
    source: PathBuf,
    size: u64,
}

/// Sequential claim resolution with memoized on-demand digests
struct ClaimPass<'a> {
    known: &'a HashMap<PathBuf, ContentId>,
    memo: HashMap<PathBuf, Result<ContentId, String>>,
    claimed: HashMap<PathBuf, Claim>,
    widths: Vec<usize>,
    conflicts: usize,
}

impl<'a> ClaimPass<'a> {
    fn new(known: &'a HashMap<PathBuf, ContentId>, widths: Vec<usize>) -> Self {
        Self {
            known,
            memo: HashMap::new(),
            claimed: HashMap::new(),
            widths,
            conflicts: 0,
        }
    }

    fn resolve(&mut self, dated: &DatedFile, base: &Path) -> RelocationAction {
        let source = &dated.file.path;
        let mut candidate = base.to_path_buf();
        let mut widths = self.widths.clone().into_iter();

        loop {
            if candidate == *source {
                return RelocationAction::Skip {
                    reason: SkipReason::AlreadyInPlace,
                };
            }

            match self.occupancy(&candidate) {
                Occupancy::Free => {
                    if candidate != base {
                        self.conflicts += 1;
                    }
                    self.claimed.insert(
                        candidate.clone(),
                        Claim {
                            source: source.clone(),
                            size: dated.file.size,
                        },
                    );
                    return RelocationAction::Move { target: candidate };
                }
                Occupancy::Taken { content, size } => {
                    if size == Some(dated.file.size) && self.same_content(source, &content) {
                        return RelocationAction::Skip {
                            reason: SkipReason::IdenticalAtTarget {
                                existing: candidate,
                            },
                        };
                    }
                }
            }

            let Some(width) = widths.next() else {
                tracing::warn!(
                    path = %source.display(),
                    target = %base.display(),
                    "no free disambiguated name"
                );
                return RelocationAction::Skip {
                    reason: SkipReason::CollisionUnresolvable {
                        target: base.to_path_buf(),
                    },
                };
            };
            let digest = match self.digest(source) {
                Ok(digest) => digest,
                Err(message) => {
                    return RelocationAction::Skip {
                        reason: SkipReason::Unreadable { message },
                    }
                }
            };
            candidate = disambiguated(base, digest.short(width));
        }
    }

    fn occupancy(&self, candidate: &Path) -> Occupancy {
        if let Some(claim) = self.claimed.get(candidate) {
            return Occupancy::Taken {
                content: claim.source.clone(),
                size: Some(claim.size),
            };
        }
        match fs::symlink_metadata(candidate) {
            Ok(meta) => Occupancy::Taken {
                content: candidate.to_path_buf(),
                size: meta.is_file().then(|| meta.len()),
            },
            Err(_) => Occupancy::Free,
        }
    }

    fn same_content(&mut self, a: &Path, b: &Path) -> bool {
        match (self.digest(a), self.digest(b)) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }

    fn digest(&mut self, path: &Path) -> Result<ContentId, String> {
        if let Some(known) = self.known.get(path) {
            return Ok(known.clone());
        }
        self.memo
            .entry(path.to_path_buf())
            .or_insert_with(|| {
                ContentHasher::digest_file(path).map_err(|e| {
                    tracing::warn!(path = %path.display(), "cannot hash collision candidate: {e}");
                    e.to_string()
                })
            })
            .clone()
    }
}
