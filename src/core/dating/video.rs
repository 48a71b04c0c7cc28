//! Creation time from ISO-BMFF / QuickTime containers (`moov/mvhd`).
//!
//! Only the two boxes on the path to `mvhd` are read; the media payload is
//! skipped with seeks, so this stays cheap even on network storage.

use super::YearRange;
use crate::core::scanner::{MediaFile, MediaKind};
use chrono::{DateTime, NaiveDateTime};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Seconds between the QuickTime epoch (1904-01-01) and the Unix epoch
const QT_TO_UNIX_OFFSET: i64 = 2_082_844_800;

const ISO_BMFF_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "3gp"];

pub(super) fn extract(file: &MediaFile, years: &YearRange) -> Option<NaiveDateTime> {
    if file.kind != MediaKind::Video || !is_iso_bmff(&file.path) {
        return None;
    }
    container_creation_time(&file.path).filter(|date| years.contains(date))
}

fn is_iso_bmff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| ISO_BMFF_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// `mvhd` creation time as naive UTC. `None` for missing boxes, truncated
/// files, or a zero timestamp.
pub fn container_creation_time(path: &Path) -> Option<NaiveDateTime> {
    let mut file = File::open(path).ok()?;
    let len = file.metadata().ok()?.len();

    let moov = find_box(&mut file, 0, len, *b"moov")?;
    let mvhd = find_box(&mut file, moov.data_start, moov.data_end, *b"mvhd")?;
    let seconds = read_mvhd_creation(&mut file, &mvhd)?;

    if seconds == 0 {
        tracing::debug!(path = %path.display(), "mvhd creation time unset");
        return None;
    }

    let unix = i64::try_from(seconds).ok()?.checked_sub(QT_TO_UNIX_OFFSET)?;
    DateTime::from_timestamp(unix, 0).map(|utc| utc.naive_utc())
}

#[derive(Debug, Clone, Copy)]
struct BoxRange {
    data_start: u64,
    data_end: u64,
}

fn find_box<R: Read + Seek>(
    reader: &mut R,
    start: u64,
    end: u64,
    kind: [u8; 4],
) -> Option<BoxRange> {
    let mut offset = start;
    while offset + 8 <= end {
        reader.seek(SeekFrom::Start(offset)).ok()?;
        let mut header = [0u8; 8];
        reader.read_exact(&mut header).ok()?;

        let mut size = u64::from(u32::from_be_bytes([header[0], header[1], header[2], header[3]]));
        let box_kind = [header[4], header[5], header[6], header[7]];
        let mut header_size = 8u64;

        if size == 1 {
            let mut large = [0u8; 8];
            reader.read_exact(&mut large).ok()?;
            size = u64::from_be_bytes(large);
            header_size = 16;
        } else if size == 0 {
            // Box extends to the end of its parent
            size = end - offset;
        }

        if size < header_size {
            return None;
        }
        let box_end = offset.saturating_add(size).min(end);

        if box_kind == kind {
            return Some(BoxRange {
                data_start: offset + header_size,
                data_end: box_end,
            });
        }
        offset = box_end;
    }
    None
}

fn read_mvhd_creation<R: Read + Seek>(reader: &mut R, mvhd: &BoxRange) -> Option<u64> {
    reader.seek(SeekFrom::Start(mvhd.data_start)).ok()?;
    let mut version_flags = [0u8; 4];
    reader.read_exact(&mut version_flags).ok()?;

    if version_flags[0] == 1 {
        let mut buf = [0u8; 8];
        reader.read_exact(&mut buf).ok()?;
        Some(u64::from_be_bytes(buf))
    } else {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf).ok()?;
        Some(u64::from(u32::from_be_bytes(buf)))
    }
}
