//! Directory walking implementation using walkdir.

use super::{filter::MediaFilter, MediaFile, ScanResult};
use crate::error::ScanError;
use crate::events::{Event, EventSender, ScanEvent};
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

/// Configuration for the directory scanner
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// Whether to include hidden files and directories
    pub include_hidden: bool,
}

/// Scanner implementation using the walkdir crate
///
/// Entries are visited in file-name order so that two scans of an unchanged
/// tree yield the same sequence.
pub struct WalkDirScanner {
    filter: MediaFilter,
}

impl WalkDirScanner {
    /// Create a new scanner with the given configuration
    pub fn new(config: ScanConfig) -> Self {
        Self {
            filter: MediaFilter::new().with_hidden(config.include_hidden),
        }
    }

    /// Lazily walk `root`, yielding media files and per-entry errors.
    ///
    /// Nothing is read until the iterator is advanced. Calling `iter` again
    /// starts a fresh walk.
    pub fn iter<'a>(
        &'a self,
        root: &Path,
    ) -> impl Iterator<Item = Result<MediaFile, ScanError>> + 'a {
        let filter = &self.filter;
        WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| {
                entry.depth() == 0
                    || !entry.file_type().is_dir()
                    || filter.should_descend(entry.path())
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => self.to_media_file(&entry),
                Err(e) => Some(Err(walk_error(e))),
            })
    }

    fn to_media_file(&self, entry: &DirEntry) -> Option<Result<MediaFile, ScanError>> {
        // Symlinks report their own type here because links are not followed.
        if !entry.file_type().is_file() {
            return None;
        }

        let kind = self.filter.classify(entry.path())?;

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => return Some(Err(walk_error(e))),
        };

        Some(Ok(MediaFile {
            path: entry.path().to_path_buf(),
            size: metadata.len(),
            modified: metadata
                .modified()
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH),
            kind,
        }))
    }
}

fn walk_error(e: walkdir::Error) -> ScanError {
    let path = e.path().map(Path::to_path_buf).unwrap_or_default();

    if e.io_error().map(|io| io.kind()) == Some(std::io::ErrorKind::PermissionDenied) {
        ScanError::PermissionDenied { path }
    } else {
        ScanError::ReadEntry {
            path,
            source: e.into(),
        }
    }
}

impl WalkDirScanner {
    /// Walk `root` to completion
    pub fn scan(&self, root: &Path) -> Result<ScanResult, ScanError> {
        self.scan_with_events(root, &crate::events::null_sender())
    }

    /// Walk `root` to completion, reporting each file and error.
    ///
    /// Only a missing root fails; unreadable entries below it are collected
    /// in [`ScanResult::errors`] and the walk goes on.
    pub fn scan_with_events(
        &self,
        root: &Path,
        events: &EventSender,
    ) -> Result<ScanResult, ScanError> {
        if !root.is_dir() {
            return Err(ScanError::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }

        events.send(Event::Scan(ScanEvent::Started {
            root: root.to_path_buf(),
        }));

        let mut result = ScanResult::default();

        for item in self.iter(root) {
            match item {
                Ok(file) => {
                    events.send(Event::Scan(ScanEvent::FileFound {
                        path: file.path.clone(),
                    }));
                    result.files.push(file);
                }
                Err(error) => {
                    tracing::warn!(path = %error.path().display(), "skipping unreadable entry: {error}");
                    events.send(Event::Scan(ScanEvent::Error {
                        path: error.path().clone(),
                        message: error.to_string(),
                    }));
                    result.errors.push(error);
                }
            }
        }

        events.send(Event::Scan(ScanEvent::Completed {
            total_files: result.files.len(),
        }));

        Ok(result)
    }
}
