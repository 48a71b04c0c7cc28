//! # Duplicates Module
//!
//! Groups byte-identical files and elects one keeper per group.
//!
//! ## Keeper Order
//! | Step | Rule                                     |
//! |------|------------------------------------------|
//! | 1    | Earliest resolved date                   |
//! | 2    | More trusted date source                 |
//! | 3    | Lexicographically smallest path          |
//!
//! This is a total order, so the keeper does not depend on scan order.

use crate::core::dating::DatedFile;
use crate::core::hasher::{ContentId, HashResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A set of files with identical content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Shared content digest
    pub digest: ContentId,
    /// The copy that survives
    pub keeper: PathBuf,
    /// Copies earmarked for deletion, sorted by path
    pub redundant: Vec<PathBuf>,
    /// Size of one copy in bytes
    pub size_bytes: u64,
}

impl DuplicateGroup {
    /// Bytes freed once the redundant copies are gone
    pub fn reclaimable_bytes(&self) -> u64 {
        self.size_bytes * self.redundant.len() as u64
    }

    /// Keeper first, then the redundant copies
    pub fn members(&self) -> impl Iterator<Item = &PathBuf> {
        std::iter::once(&self.keeper).chain(self.redundant.iter())
    }
}

/// What a file is with respect to duplicate detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole<'a> {
    /// No identical twin was found
    Unique,
    /// Survivor of its group
    Keeper(&'a DuplicateGroup),
    /// Identical to the keeper of its group
    Redundant(&'a DuplicateGroup),
}

/// Total order used to elect keepers (smallest wins)
pub fn keeper_order(a: &DatedFile, b: &DatedFile) -> Ordering {
    a.resolved
        .date
        .cmp(&b.resolved.date)
        .then_with(|| a.resolved.source.priority().cmp(&b.resolved.source.priority()))
        .then_with(|| a.file.path.cmp(&b.file.path))
}

/// Duplicate groups of one run, with a path lookup
#[derive(Debug, Default)]
pub struct DuplicateIndex {
    groups: Vec<DuplicateGroup>,
    by_path: HashMap<PathBuf, usize>,
}

impl DuplicateIndex {
    /// Build the index once all dates and digests are known.
    ///
    /// Files present in `hashes` but missing from `dated` are ignored.
    pub fn build(dated: &[DatedFile], hashes: &HashResult) -> Self {
        let by_path: HashMap<&Path, &DatedFile> = dated
            .iter()
            .map(|d| (d.file.path.as_path(), d))
            .collect();

        let mut index = DuplicateIndex::default();

        for (digest, paths) in &hashes.by_digest {
            let mut members: Vec<&DatedFile> = paths
                .iter()
                .filter_map(|p| by_path.get(p.as_path()).copied())
                .collect();
            if members.len() < 2 {
                continue;
            }

            members.sort_by(|a, b| keeper_order(a, b));
            let keeper = members[0];
            let mut redundant: Vec<PathBuf> =
                members[1..].iter().map(|d| d.file.path.clone()).collect();
            redundant.sort();

            let group_index = index.groups.len();
            for member in &members {
                index.by_path.insert(member.file.path.clone(), group_index);
            }
            index.groups.push(DuplicateGroup {
                digest: digest.clone(),
                keeper: keeper.file.path.clone(),
                redundant,
                size_bytes: keeper.file.size,
            });
        }

        tracing::info!(groups = index.groups.len(), "duplicate index built");
        index
    }

    pub fn groups(&self) -> &[DuplicateGroup] {
        &self.groups
    }

    /// Group a path belongs to, if any
    pub fn group_of(&self, path: &Path) -> Option<&DuplicateGroup> {
        self.by_path.get(path).map(|&i| &self.groups[i])
    }

    pub fn role(&self, path: &Path) -> FileRole<'_> {
        match self.group_of(path) {
            None => FileRole::Unique,
            Some(group) if group.keeper == path => FileRole::Keeper(group),
            Some(group) => FileRole::Redundant(group),
        }
    }

    /// Number of files that would be deleted
    pub fn redundant_count(&self) -> usize {
        self.groups.iter().map(|g| g.redundant.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dating::{DateSource, ResolvedDate};
    use crate::core::scanner::{MediaFile, MediaKind};
    use chrono::NaiveDate;
    use std::time::SystemTime;

    fn dated(path: &str, year: i32, source: DateSource) -> DatedFile {
        DatedFile {
            file: MediaFile {
                path: PathBuf::from(path),
                size: 10,
                modified: SystemTime::UNIX_EPOCH,
                kind: MediaKind::Image,
            },
            resolved: ResolvedDate {
                date: NaiveDate::from_ymd_opt(year, 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                source,
            },
        }
    }

    fn hashes(groups: &[&[&str]]) -> HashResult {
        let mut result = HashResult::default();
        for (i, paths) in groups.iter().enumerate() {
            let digest: ContentId =
                serde_json::from_value(serde_json::json!(format!("{:064x}", i))).unwrap();
            for path in *paths {
                result.digests.insert(PathBuf::from(path), digest.clone());
            }
            result
                .by_digest
                .insert(digest, paths.iter().map(PathBuf::from).collect());
        }
        result
    }

    #[test]
    fn earliest_date_is_kept() {
        let files = vec![
            dated("/in/a.jpg", 2021, DateSource::FilesystemMtime),
            dated("/in/b.jpg", 2020, DateSource::FilesystemMtime),
        ];
        let index = DuplicateIndex::build(&files, &hashes(&[&["/in/a.jpg", "/in/b.jpg"]]));

        assert_eq!(index.groups().len(), 1);
        assert_eq!(index.groups()[0].keeper, PathBuf::from("/in/b.jpg"));
        assert!(matches!(index.role(Path::new("/in/a.jpg")), FileRole::Redundant(_)));
        assert!(matches!(index.role(Path::new("/in/b.jpg")), FileRole::Keeper(_)));
        assert!(matches!(index.role(Path::new("/in/c.jpg")), FileRole::Unique));
    }

    #[test]
    fn source_priority_breaks_date_ties() {
        let files = vec![
            dated("/in/a.jpg", 2020, DateSource::FilesystemMtime),
            dated("/in/z.jpg", 2020, DateSource::Exif),
        ];
        let index = DuplicateIndex::build(&files, &hashes(&[&["/in/a.jpg", "/in/z.jpg"]]));

        assert_eq!(index.groups()[0].keeper, PathBuf::from("/in/z.jpg"));
    }

    #[test]
    fn path_breaks_remaining_ties() {
        let files = vec![
            dated("/in/b.jpg", 2020, DateSource::Exif),
            dated("/in/a.jpg", 2020, DateSource::Exif),
        ];
        let index = DuplicateIndex::build(&files, &hashes(&[&["/in/a.jpg", "/in/b.jpg"]]));

        assert_eq!(index.groups()[0].keeper, PathBuf::from("/in/a.jpg"));
    }

    #[test]
    fn keeper_is_independent_of_input_order() {
        let mut files = vec![
            dated("/in/c.jpg", 2022, DateSource::Filename),
            dated("/in/a.jpg", 2019, DateSource::FilesystemMtime),
            dated("/in/b.jpg", 2019, DateSource::Exif),
        ];
        let digests = hashes(&[&["/in/a.jpg", "/in/b.jpg", "/in/c.jpg"]]);

        let expected = DuplicateIndex::build(&files, &digests).groups()[0].clone();
        for _ in 0..3 {
            files.rotate_left(1);
            assert_eq!(DuplicateIndex::build(&files, &digests).groups()[0], expected);
            files.reverse();
            assert_eq!(DuplicateIndex::build(&files, &digests).groups()[0], expected);
        }
        assert_eq!(expected.keeper, PathBuf::from("/in/b.jpg"));
        assert_eq!(expected.redundant.len(), 2);
    }

    #[test]
    fn singletons_are_not_groups() {
        let files = vec![dated("/in/a.jpg", 2020, DateSource::Exif)];
        let index = DuplicateIndex::build(&files, &hashes(&[&["/in/a.jpg"]]));

        assert!(index.groups().is_empty());
        assert_eq!(index.redundant_count(), 0);
    }

    #[test]
    fn reclaimable_bytes_counts_redundant_copies() {
        let files = vec![
            dated("/in/a.jpg", 2020, DateSource::Exif),
            dated("/in/b.jpg", 2021, DateSource::Exif),
            dated("/in/c.jpg", 2022, DateSource::Exif),
        ];
        let index = DuplicateIndex::build(
            &files,
            &hashes(&[&["/in/a.jpg", "/in/b.jpg", "/in/c.jpg"]]),
        );

        assert_eq!(index.groups()[0].reclaimable_bytes(), 20);
        assert_eq!(index.groups()[0].members().count(), 3);
    }
}
