//! File filtering logic for the scanner.

use super::MediaKind;
use std::path::Path;

/// Decides which directory entries are candidate media files
#[derive(Debug, Clone, Default)]
pub struct MediaFilter {
    /// Whether to include hidden files and directories
    include_hidden: bool,
}

impl MediaFilter {
    /// Create a filter using the fixed extension allowlist
    pub fn new() -> Self {
        Self::default()
    }

    /// Include hidden files (starting with .)
    pub fn with_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Whether a directory should be descended into
    pub fn should_descend(&self, path: &Path) -> bool {
        self.include_hidden || !is_hidden(path)
    }

    /// Media kind of a file, or `None` if it should be ignored
    pub fn classify(&self, path: &Path) -> Option<MediaKind> {
        if !self.include_hidden && is_hidden(path) {
            return None;
        }
        MediaKind::from_path(path)
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}
