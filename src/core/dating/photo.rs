//! EXIF capture time for image files.
//!
//! EXIF is typically present in JPEG, TIFF/DNG and HEIC files; kamadak-exif
//! also finds it inside PNG and WebP containers.

use super::YearRange;
use crate::core::scanner::{MediaFile, MediaKind};
use chrono::NaiveDateTime;
use exif::{In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Tags consulted in order: when the shutter fired, when it was digitized,
/// when the file was last written by the camera.
const DATE_TAGS: [Tag; 3] = [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime];

pub(super) fn extract(file: &MediaFile, years: &YearRange) -> Option<NaiveDateTime> {
    if file.kind != MediaKind::Image {
        return None;
    }
    exif_capture_time(&file.path).filter(|date| years.contains(date))
}

/// Capture time from the first EXIF date tag that parses.
///
/// Unreadable files and corrupt EXIF blocks yield `None`.
pub fn exif_capture_time(path: &Path) -> Option<NaiveDateTime> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let exif = match Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(e) => {
            tracing::debug!(path = %path.display(), "no usable EXIF: {e}");
            return None;
        }
    };

    DATE_TAGS.iter().find_map(|tag| {
        let field = exif.get_field(*tag, In::PRIMARY)?;
        parse_exif_datetime(&ascii_value(&field.value)?)
    })
}

/// Raw ASCII payload; `display_value()` would wrap it in quotes.
fn ascii_value(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(vec) => {
            let bytes = vec.first()?;
            let s = std::str::from_utf8(bytes).ok()?;
            Some(s.trim_end_matches('\0').trim().to_string())
        }
        _ => None,
    }
}

fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    // EXIF format: "2024:01:15 14:30:00"; some writers use dashes
    NaiveDateTime::parse_from_str(s, "%Y:%m:%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .ok()
}
