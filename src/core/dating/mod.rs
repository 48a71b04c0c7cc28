//! # Dating Module
//!
//! Resolves one capture date per media file from an ordered fallback chain:
//!
//! | Priority | Source            | Applies to |
//! |----------|-------------------|------------|
//! | 1        | Filename token    | all        |
//! | 2        | EXIF capture time | images     |
//! | 3        | Container `mvhd`  | videos     |
//! | 4        | Filesystem mtime  | all        |
//!
//! The first source that yields a valid, plausible date wins and the
//! remaining sources are never read. This is a fallback chain, not a vote:
//! a filename date is kept even when EXIF disagrees, so every resolved date
//! can be explained by naming a single source.

mod filename;
mod photo;
mod video;

pub use filename::{date_from_filename, strip_disambiguation, DISAMBIGUATION_MARKER};
pub use photo::exif_capture_time;
pub use video::container_creation_time;

use crate::core::scanner::MediaFile;
use crate::events::{Event, EventSender, ResolveEvent};
use chrono::{DateTime, Datelike, Local, NaiveDateTime};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Where a resolved date came from, in priority order (highest first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSource {
    Filename,
    Exif,
    VideoMetadata,
    FilesystemMtime,
}

impl DateSource {
    /// Rank in the fallback chain; lower is more trusted
    pub fn priority(&self) -> u8 {
        *self as u8
    }
}

impl std::fmt::Display for DateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateSource::Filename => write!(f, "filename"),
            DateSource::Exif => write!(f, "exif"),
            DateSource::VideoMetadata => write!(f, "video-metadata"),
            DateSource::FilesystemMtime => write!(f, "filesystem-mtime"),
        }
    }
}

/// The single date selected for a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDate {
    pub date: NaiveDateTime,
    pub source: DateSource,
}

/// A scanned file paired with its resolved date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatedFile {
    pub file: MediaFile,
    pub resolved: ResolvedDate,
}

/// Inclusive range of years accepted as a real capture date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearRange {
    pub min: i32,
    pub max: i32,
}

impl YearRange {
    /// Earliest year accepted by default
    pub const DEFAULT_MIN_YEAR: i32 = 1990;

    pub fn contains(&self, date: &NaiveDateTime) -> bool {
        (self.min..=self.max).contains(&date.year())
    }
}

impl Default for YearRange {
    /// 1990 up to next year (clock skew, time zones ahead of ours)
    fn default() -> Self {
        Self {
            min: Self::DEFAULT_MIN_YEAR,
            max: Local::now().year() + 1,
        }
    }
}

type ExtractFn = fn(&MediaFile, &YearRange) -> Option<NaiveDateTime>;

/// One link of the fallback chain
struct Extractor {
    source: DateSource,
    extract: ExtractFn,
}

const CHAIN: [Extractor; 4] = [
    Extractor {
        source: DateSource::Filename,
        extract: filename::extract,
    },
    Extractor {
        source: DateSource::Exif,
        extract: photo::extract,
    },
    Extractor {
        source: DateSource::VideoMetadata,
        extract: video::extract,
    },
    Extractor {
        source: DateSource::FilesystemMtime,
        extract: extract_mtime,
    },
];

fn extract_mtime(file: &MediaFile, range: &YearRange) -> Option<NaiveDateTime> {
    Some(mtime_local(file)).filter(|d| range.contains(d))
}

fn mtime_local(file: &MediaFile) -> NaiveDateTime {
    DateTime::<Local>::from(file.modified).naive_local()
}

/// Walks the fallback chain for each file
#[derive(Debug, Clone, Default)]
pub struct DateResolver {
    years: YearRange,
}

impl DateResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the plausible year range
    pub fn with_years(mut self, years: YearRange) -> Self {
        self.years = years;
        self
    }

    /// Resolve a single file. Always succeeds: when nothing plausible is
    /// found, the raw mtime is used.
    pub fn resolve(&self, file: &MediaFile) -> ResolvedDate {
        for link in &CHAIN {
            if let Some(date) = (link.extract)(file, &self.years) {
                return ResolvedDate {
                    date,
                    source: link.source,
                };
            }
            tracing::trace!(path = %file.path.display(), source = %link.source, "date source absent");
        }

        tracing::debug!(
            path = %file.path.display(),
            "no plausible date found, using mtime as-is"
        );
        ResolvedDate {
            date: mtime_local(file),
            source: DateSource::FilesystemMtime,
        }
    }

    /// Resolve every file on the current rayon pool, preserving input order
    pub fn resolve_all(&self, files: &[MediaFile], events: &EventSender) -> Vec<DatedFile> {
        let total = files.len();
        let completed = AtomicUsize::new(0);

        let dated: Vec<DatedFile> = files
            .par_iter()
            .map(|file| {
                let resolved = self.resolve(file);
                let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if done % 100 == 0 {
                    events.send(Event::Resolve(ResolveEvent::Progress {
                        completed: done,
                        total,
                    }));
                }
                DatedFile {
                    file: file.clone(),
                    resolved,
                }
            })
            .collect();

        events.send(Event::Resolve(ResolveEvent::Completed { total }));
        dated
    }
}
