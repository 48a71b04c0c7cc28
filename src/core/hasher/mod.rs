//! # Hasher Module
//!
//! Content identity for exact-duplicate detection.
//!
//! ## How It Works
//! 1. Group files by byte size (free, already known from the scan)
//! 2. Within size groups, compare a 4 KiB prefix hash (one small read)
//! 3. Stream the survivors through BLAKE3 in 64 KiB chunks
//!
//! Files with a unique size are never opened, which keeps I/O low on large
//! archives behind slow NAS links.

mod prefilter;

pub use prefilter::{prefilter, Prefiltered};

use crate::core::scanner::MediaFile;
use crate::error::HashError;
use crate::events::{Event, EventSender, HashEvent, HashProgress};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// BLAKE3 digest of a file's full contents, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Full hex digest
    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// First `len` hex characters (clamped to the digest length)
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Output of hashing a scanned file set
#[derive(Debug, Default)]
pub struct HashResult {
    /// Digest of every file that was hashed
    pub digests: HashMap<PathBuf, ContentId>,
    /// Files sharing each digest, paths sorted
    pub by_digest: BTreeMap<ContentId, Vec<PathBuf>>,
    /// Files that could not be read (treated as unique content)
    pub errors: Vec<HashError>,
    pub skipped_unique_size: usize,
    pub skipped_unique_prefix: usize,
}

/// Computes content digests for duplicate candidates
#[derive(Debug, Clone)]
pub struct ContentHasher {
    prefix_filter: bool,
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self {
            prefix_filter: true,
        }
    }
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the 4 KiB prefix pre-filter
    pub fn with_prefix_filter(mut self, enabled: bool) -> Self {
        self.prefix_filter = enabled;
        self
    }

    /// Stream a file through BLAKE3 without loading it into memory
    pub fn digest_file(path: &Path) -> Result<ContentId, HashError> {
        let io_error = |source| HashError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut file = File::open(path).map_err(io_error)?;
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let read = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(io_error(e)),
            };
            hasher.update(&buffer[..read]);
        }

        Ok(ContentId(hasher.finalize().to_hex().to_string()))
    }

    /// Hash every file that could possibly have a byte-identical twin.
    ///
    /// Runs on the current rayon pool; results are merged after all workers
    /// finish, so no map is shared between threads.
    pub fn hash_all(&self, files: &[MediaFile], events: &EventSender) -> HashResult {
        let Prefiltered {
            candidates,
            skipped_unique_size,
            skipped_unique_prefix,
        } = prefilter(files, self.prefix_filter);

        let total = candidates.len();
        events.send(Event::Hash(HashEvent::Started {
            candidates: total,
            skipped_unique_size,
            skipped_unique_prefix,
        }));
        tracing::info!(
            candidates = total,
            skipped_unique_size,
            skipped_unique_prefix,
            "hashing duplicate candidates"
        );

        let completed = AtomicUsize::new(0);
        let outcomes: Vec<(PathBuf, Result<ContentId, HashError>)> = candidates
            .par_iter()
            .map(|file| {
                let outcome = Self::digest_file(&file.path);
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                events.send(Event::Hash(HashEvent::Progress(HashProgress {
                    completed: done,
                    total,
                    current_path: file.path.clone(),
                })));
                (file.path.clone(), outcome)
            })
            .collect();

        let mut result = HashResult {
            skipped_unique_size,
            skipped_unique_prefix,
            ..Default::default()
        };

        for (path, outcome) in outcomes {
            match outcome {
                Ok(digest) => {
                    result
                        .by_digest
                        .entry(digest.clone())
                        .or_default()
                        .push(path.clone());
                    result.digests.insert(path, digest);
                }
                Err(error) => {
                    tracing::warn!(path = %path.display(), "cannot hash: {error}");
                    events.send(Event::Hash(HashEvent::Error {
                        path,
                        message: error.to_string(),
                    }));
                    result.errors.push(error);
                }
            }
        }

        for paths in result.by_digest.values_mut() {
            paths.sort();
        }

        events.send(Event::Hash(HashEvent::Completed {
            total_hashed: result.digests.len(),
            duplicate_groups: result.by_digest.values().filter(|p| p.len() >= 2).count(),
        }));

        result
    }
}
