//! Cheap filters that rule out duplicates before any full-file read.
//!
//! 1. **Size**: files with a unique byte size cannot have a twin.
//! 2. **Prefix**: within a size group, files whose first 4 KiB hash (xxh3)
//!    is unique cannot have a twin either.
//!
//! Both filters only ever remove files that provably have no duplicate, so
//! the final grouping is exactly what full hashing of everything would give.

use crate::core::scanner::MediaFile;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use xxhash_rust::xxh3::xxh3_64;

/// Size of prefix to hash for preliminary filtering (4KB)
const PREFIX_SIZE: usize = 4096;

/// Files that still need a full digest
#[derive(Debug)]
pub struct Prefiltered<'a> {
    pub candidates: Vec<&'a MediaFile>,
    pub skipped_unique_size: usize,
    pub skipped_unique_prefix: usize,
}

/// Apply the size filter and, when enabled, the prefix filter.
pub fn prefilter(files: &[MediaFile], use_prefix: bool) -> Prefiltered<'_> {
    let by_size = filter_by_size(files);
    let size_candidates = by_size.len();
    let skipped_unique_size = files.len() - size_candidates;

    let candidates = if use_prefix {
        filter_by_prefix(by_size)
    } else {
        by_size
    };

    Prefiltered {
        skipped_unique_prefix: size_candidates - candidates.len(),
        skipped_unique_size,
        candidates,
    }
}

fn filter_by_size(files: &[MediaFile]) -> Vec<&MediaFile> {
    let mut size_groups: HashMap<u64, Vec<&MediaFile>> = HashMap::new();
    for file in files {
        size_groups.entry(file.size).or_default().push(file);
    }

    let mut candidates: Vec<&MediaFile> = size_groups
        .into_values()
        .filter(|group| group.len() >= 2)
        .flatten()
        .collect();
    candidates.sort_by(|a, b| a.path.cmp(&b.path));
    candidates
}

fn filter_by_prefix(files: Vec<&MediaFile>) -> Vec<&MediaFile> {
    let prefixes: Vec<Option<u64>> = files
        .par_iter()
        .map(|file| prefix_hash(&file.path))
        .collect();

    // Keyed by size too: equal prefixes of different-size files mean nothing.
    let mut groups: HashMap<(u64, u64), usize> = HashMap::new();
    for (file, prefix) in files.iter().zip(&prefixes) {
        if let Some(prefix) = prefix {
            *groups.entry((file.size, *prefix)).or_default() += 1;
        }
    }

    files
        .into_iter()
        .zip(prefixes)
        .filter(|(file, prefix)| match prefix {
            Some(prefix) => groups.get(&(file.size, *prefix)).copied().unwrap_or(0) >= 2,
            // Unreadable now; let the full hash report the error.
            None => true,
        })
        .map(|(file, _)| file)
        .collect()
}

fn prefix_hash(path: &Path) -> Option<u64> {
    let mut file = File::open(path).ok()?;
    let mut buffer = [0u8; PREFIX_SIZE];
    let mut filled = 0;
    while filled < PREFIX_SIZE {
        match file.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => return None,
        }
    }
    Some(xxh3_64(&buffer[..filled]))
}
