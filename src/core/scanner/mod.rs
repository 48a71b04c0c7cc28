//! # Scanner Module
//!
//! Discovers photo and video files under a source root.
//!
//! ## Supported Formats
//! - Images: JPEG, PNG, HEIC/HEIF, TIFF, DNG, WebP, GIF, BMP
//! - Videos: MP4, MOV, M4V, 3GP, AVI, MKV
//!
//! Symbolic links are never followed, so link cycles cannot trap a scan.
//!
//! ## Example
//! ```rust,ignore
//! use media_archive::core::scanner::{ScanConfig, WalkDirScanner};
//!
//! let scanner = WalkDirScanner::new(ScanConfig::default());
//! let result = scanner.scan(Path::new("/Volumes/photo/inbox"))?;
//! ```

mod filter;
mod walker;

pub use filter::MediaFilter;
pub use walker::{ScanConfig, WalkDirScanner};

use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A discovered media file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaFile {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified time
    pub modified: SystemTime,
    /// Image or video
    pub kind: MediaKind,
}

impl MediaFile {
    /// File name as text, lossy for non-UTF-8 names
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Broad media category, decides which embedded metadata is consulted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    const IMAGE_EXTENSIONS: &'static [&'static str] = &[
        "jpg", "jpeg", "png", "heic", "heif", "tiff", "tif", "dng", "webp", "gif", "bmp",
    ];
    const VIDEO_EXTENSIONS: &'static [&'static str] = &["mp4", "mov", "m4v", "3gp", "avi", "mkv"];

    /// Classify a file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        if Self::IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Image)
        } else if Self::VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    /// Classify a path by its extension
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// Result of a scan operation
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Discovered media files, in walk order
    pub files: Vec<MediaFile>,
    /// Errors that occurred during scanning (non-fatal)
    pub errors: Vec<ScanError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_kind_from_extension_is_case_insensitive() {
        assert_eq!(MediaKind::from_extension("jpg"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_extension("JPEG"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_extension("HEIC"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_extension("mov"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_extension("MP4"), Some(MediaKind::Video));
    }

    #[test]
    fn unknown_extension_is_not_media() {
        assert_eq!(MediaKind::from_extension("txt"), None);
        assert_eq!(MediaKind::from_extension("pdf"), None);
        assert_eq!(MediaKind::from_path(Path::new("/photos/no_extension")), None);
    }

    #[test]
    fn file_name_is_last_component() {
        let file = MediaFile {
            path: PathBuf::from("/photos/2023/IMG_0001.JPG"),
            size: 1,
            modified: SystemTime::UNIX_EPOCH,
            kind: MediaKind::Image,
        };
        assert_eq!(file.file_name(), "IMG_0001.JPG");
    }
}
