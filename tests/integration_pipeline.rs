//! Integration tests for the full archive pipeline
//!
//! These tests build real trees on disk and run the pipeline end to end.

use assert_fs::prelude::*;
use chrono::{Local, TimeZone};
use media_archive::core::calendar::{EventCalendar, EventRule};
use media_archive::core::dating::DateSource;
use media_archive::core::hasher::ContentHasher;
use media_archive::core::organize::OutcomeStatus;
use media_archive::core::pipeline::Pipeline;
use media_archive::core::reporter::RunReport;
use media_archive::events::null_sender;
use predicates::prelude::*;
use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};

const QT_TO_UNIX_OFFSET: i64 = 2_082_844_800;

fn set_mtime(path: &Path, y: i32, m: u32, d: u32) {
    let time = Local.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap();
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(time.into())
        .unwrap();
}

/// JPEG whose only content is an EXIF block carrying `DateTimeOriginal`
fn jpeg_with_exif(date_time: &str, padding: &[u8]) -> Vec<u8> {
    assert_eq!(date_time.len(), 19);
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"MM\x00\x2a\x00\x00\x00\x08");
    // IFD0: one entry pointing at the Exif IFD (offset 26)
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&[0x87, 0x69, 0x00, 0x04, 0, 0, 0, 1]);
    tiff.extend_from_slice(&26u32.to_be_bytes());
    tiff.extend_from_slice(&0u32.to_be_bytes());
    // Exif IFD: DateTimeOriginal, ASCII[20] at offset 44
    tiff.extend_from_slice(&1u16.to_be_bytes());
    tiff.extend_from_slice(&[0x90, 0x03, 0x00, 0x02, 0, 0, 0, 20]);
    tiff.extend_from_slice(&44u32.to_be_bytes());
    tiff.extend_from_slice(&0u32.to_be_bytes());
    tiff.extend_from_slice(date_time.as_bytes());
    tiff.push(0);

    let mut app1 = b"Exif\x00\x00".to_vec();
    app1.extend_from_slice(&tiff);

    let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE1];
    jpeg.extend_from_slice(&((app1.len() + 2) as u16).to_be_bytes());
    jpeg.extend_from_slice(&app1);
    // COM segment so different files get different bytes
    jpeg.extend_from_slice(&[0xFF, 0xFE]);
    jpeg.extend_from_slice(&((padding.len() + 2) as u16).to_be_bytes());
    jpeg.extend_from_slice(padding);
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    jpeg
}

fn mp4_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);
    out
}

/// `ftyp` + `mdat` + `moov/mvhd` with the given creation time
fn mp4_created_at(unix_seconds: i64) -> Vec<u8> {
    let qt = (unix_seconds + QT_TO_UNIX_OFFSET) as u32;
    let mut mvhd = vec![0u8; 4];
    mvhd.extend_from_slice(&qt.to_be_bytes());
    mvhd.extend_from_slice(&qt.to_be_bytes());
    mvhd.extend_from_slice(&600u32.to_be_bytes());
    mvhd.extend_from_slice(&0u32.to_be_bytes());

    let mut out = mp4_box(b"ftyp", b"qt  \0\0\0\0");
    out.extend(mp4_box(b"mdat", &[0x11; 256]));
    out.extend(mp4_box(b"moov", &mp4_box(b"mvhd", &mvhd)));
    out
}

fn organize(source: &Path, archive: &Path, dry_run: bool) -> RunReport {
    Pipeline::builder()
        .source(source)
        .archive_root(archive)
        .dry_run(dry_run)
        .workers(2)
        .build()
        .run()
        .unwrap()
}

fn files_under(root: &Path) -> Vec<PathBuf> {
    walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

fn digests_under(roots: &[&Path]) -> BTreeSet<String> {
    roots
        .iter()
        .flat_map(|root| files_under(root))
        .map(|p| ContentHasher::digest_file(&p).unwrap().as_hex().to_string())
        .collect()
}

#[test]
fn filename_date_decides_the_folder() {
    let temp = assert_fs::TempDir::new().unwrap();
    let photo = temp.child("inbox/IMG_20230405_1200.jpg");
    photo.write_binary(b"not really a jpeg").unwrap();
    set_mtime(photo.path(), 2021, 6, 1);
    let archive = temp.child("archive");

    let report = organize(temp.child("inbox").path(), archive.path(), false);

    archive
        .child("2023/202304/IMG_20230405_1200.jpg")
        .assert(predicate::path::is_file());
    photo.assert(predicate::path::missing());
    assert_eq!(report.entries[0].date_source, DateSource::Filename);
    assert_eq!(report.summary.moved, 1);
}

#[test]
fn filename_date_beats_conflicting_exif() {
    let temp = assert_fs::TempDir::new().unwrap();
    let named = temp.child("inbox/IMG_20230405.jpg");
    named
        .write_binary(&jpeg_with_exif("2019:05:06 07:08:09", b"named"))
        .unwrap();
    let unnamed = temp.child("inbox/holiday.jpg");
    unnamed
        .write_binary(&jpeg_with_exif("2019:05:06 07:08:09", b"unnamed"))
        .unwrap();
    set_mtime(unnamed.path(), 2022, 1, 1);
    let archive = temp.child("archive");

    let report = organize(temp.child("inbox").path(), archive.path(), false);

    archive
        .child("2023/202304/IMG_20230405.jpg")
        .assert(predicate::path::is_file());
    archive
        .child("2019/201905/holiday.jpg")
        .assert(predicate::path::is_file());
    let sources: BTreeSet<DateSource> = report.entries.iter().map(|e| e.date_source).collect();
    assert!(sources.contains(&DateSource::Filename));
    assert!(sources.contains(&DateSource::Exif));
}

#[test]
fn video_uses_container_creation_time() {
    let temp = assert_fs::TempDir::new().unwrap();
    let clip = temp.child("inbox/clip.mov");
    // 2023-07-01T10:00:00Z
    clip.write_binary(&mp4_created_at(1_688_205_600)).unwrap();
    set_mtime(clip.path(), 2024, 2, 2);
    let archive = temp.child("archive");

    let report = organize(temp.child("inbox").path(), archive.path(), false);

    archive
        .child("2023/202307/clip.mov")
        .assert(predicate::path::is_file());
    assert_eq!(report.entries[0].date_source, DateSource::VideoMetadata);
}

#[test]
fn earliest_copy_is_kept_and_dry_run_changes_nothing() {
    let temp = assert_fs::TempDir::new().unwrap();
    let a = temp.child("inbox/a.jpg");
    let b = temp.child("inbox/b.jpg");
    a.write_binary(b"identical bytes").unwrap();
    b.write_binary(b"identical bytes").unwrap();
    set_mtime(a.path(), 2022, 5, 1);
    set_mtime(b.path(), 2021, 3, 1);
    let archive = temp.child("archive");

    let preview = organize(temp.child("inbox").path(), archive.path(), true);

    assert_eq!(preview.plan.moves, 1);
    assert_eq!(preview.plan.deletions, 1);
    assert!(preview
        .entries
        .iter()
        .all(|e| e.status == OutcomeStatus::Planned));
    a.assert(predicate::path::is_file());
    b.assert(predicate::path::is_file());
    archive.assert(predicate::path::missing());

    let report = organize(temp.child("inbox").path(), archive.path(), false);

    archive
        .child("2021/202103/b.jpg")
        .assert(predicate::path::is_file());
    archive
        .child("2022/202205/a.jpg")
        .assert(predicate::path::missing());
    a.assert(predicate::path::missing());
    b.assert(predicate::path::missing());
    assert_eq!(report.summary.deleted, 1);
    assert_eq!(report.summary.reclaimed_bytes, 15);
}

#[test]
fn event_rule_adds_a_subfolder() {
    let temp = assert_fs::TempDir::new().unwrap();
    let photo = temp.child("inbox/IMG_20230402.jpg");
    photo.write_binary(b"reunion").unwrap();
    let archive = temp.child("archive");
    let calendar = EventCalendar::new(vec![EventRule::new(
        "Reunion",
        chrono::NaiveDate::from_ymd_opt(2023, 4, 1).unwrap(),
        chrono::NaiveDate::from_ymd_opt(2023, 4, 3).unwrap(),
    )])
    .unwrap();

    Pipeline::builder()
        .source(temp.child("inbox").path())
        .archive_root(archive.path())
        .sort_events(true)
        .calendar(calendar)
        .build()
        .run()
        .unwrap();

    archive
        .child("2023/202304/Reunion/IMG_20230402.jpg")
        .assert(predicate::path::is_file());
}

#[test]
fn existing_archive_can_be_refiled_into_events() {
    let temp = assert_fs::TempDir::new().unwrap();
    temp.child("inbox/IMG_20230402.jpg")
        .write_binary(b"reunion")
        .unwrap();
    let archive = temp.child("archive");
    organize(temp.child("inbox").path(), archive.path(), false);
    archive
        .child("2023/202304/IMG_20230402.jpg")
        .assert(predicate::path::is_file());

    let calendar = EventCalendar::new(vec![EventRule::new(
        "Reunion",
        chrono::NaiveDate::from_ymd_opt(2023, 4, 1).unwrap(),
        chrono::NaiveDate::from_ymd_opt(2023, 4, 3).unwrap(),
    )])
    .unwrap();
    let report = Pipeline::builder()
        .source(archive.path())
        .archive_root(archive.path())
        .sort_events(true)
        .calendar(calendar)
        .build()
        .run_with_events(&null_sender())
        .unwrap();

    assert_eq!(report.summary.moved, 1);
    archive
        .child("2023/202304/Reunion/IMG_20230402.jpg")
        .assert(predicate::path::is_file());
    archive
        .child("2023/202304/IMG_20230402.jpg")
        .assert(predicate::path::missing());
}

#[test]
fn same_name_different_content_both_survive() {
    let temp = assert_fs::TempDir::new().unwrap();
    let first = temp.child("inbox/card1/DSC_0001.jpg");
    let second = temp.child("inbox/card2/DSC_0001.jpg");
    first.write_binary(b"first camera").unwrap();
    second.write_binary(b"other camera").unwrap();
    set_mtime(first.path(), 2020, 8, 8);
    set_mtime(second.path(), 2020, 8, 9);
    let archive = temp.child("archive");

    let report = organize(temp.child("inbox").path(), archive.path(), false);

    let placed = files_under(&archive.path().join("2020/202008"));
    assert_eq!(placed.len(), 2);
    archive
        .child("2020/202008/DSC_0001.jpg")
        .assert(predicate::path::is_file());
    let renamed = placed
        .iter()
        .find(|p| p.file_name().unwrap() != "DSC_0001.jpg")
        .unwrap();
    let name = renamed.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("DSC_0001~"));
    assert!(name.ends_with(".jpg"));
    assert_eq!(report.plan.conflicts, 1);
}

#[test]
fn second_run_is_idempotent() {
    let temp = assert_fs::TempDir::new().unwrap();
    let inbox = temp.child("inbox");
    inbox.child("IMG_20230405.jpg").write_binary(b"one").unwrap();
    inbox.child("x/IMG_20230405.jpg").write_binary(b"two").unwrap();
    inbox.child("dup.jpg").write_binary(b"one").unwrap();
    inbox.child("clip.mov").write_binary(&mp4_created_at(1_688_205_600)).unwrap();
    inbox.child("plain.png").write_binary(b"plain").unwrap();
    set_mtime(&inbox.path().join("plain.png"), 2019, 12, 31);
    let archive = temp.child("archive");

    let first = organize(inbox.path(), archive.path(), false);
    assert!(first.summary.moved > 0);
    assert!(!first.has_failures());

    let second = organize(archive.path(), archive.path(), false);

    assert_eq!(second.plan.moves, 0);
    assert_eq!(second.plan.deletions, 0);
    assert_eq!(second.summary.total_files, first.summary.moved);
    assert!(second
        .entries
        .iter()
        .all(|e| e.status == OutcomeStatus::Skipped));
}

#[test]
fn no_distinct_content_is_lost() {
    let temp = assert_fs::TempDir::new().unwrap();
    let inbox = temp.child("inbox");
    inbox.child("a.jpg").write_binary(b"alpha").unwrap();
    inbox.child("b/a.jpg").write_binary(b"bravo").unwrap();
    inbox.child("c/a.jpg").write_binary(b"alpha").unwrap();
    inbox.child("d.heic").write_binary(b"delta").unwrap();
    inbox.child("e.mp4").write_binary(&mp4_created_at(1_600_000_000)).unwrap();
    inbox.child("notes.txt").write_str("not media").unwrap();
    for path in files_under(inbox.path()) {
        set_mtime(&path, 2022, 2, 2);
    }
    let archive = temp.child("archive");
    let before = digests_under(&[inbox.path()]);

    let report = organize(inbox.path(), archive.path(), false);

    assert!(!report.has_failures());
    let after = digests_under(&[inbox.path(), archive.path()]);
    assert_eq!(before, after);
    // One of the two "alpha" copies is gone, the text file stays put
    assert_eq!(files_under(archive.path()).len(), 4);
    inbox.child("notes.txt").assert(predicate::path::is_file());
}

#[test]
fn deduplicate_only_removes_copies() {
    let temp = assert_fs::TempDir::new().unwrap();
    let keep = temp.child("pics/2019/IMG_20190101.jpg");
    let copy = temp.child("pics/backup/IMG_20190101 (1).jpg");
    let other = temp.child("pics/other.jpg");
    keep.write_binary(b"same photo").unwrap();
    copy.write_binary(b"same photo").unwrap();
    other.write_binary(b"different").unwrap();

    let report = Pipeline::builder()
        .source(temp.child("pics").path())
        .build()
        .deduplicate(&null_sender())
        .unwrap();

    keep.assert(predicate::path::is_file());
    other.assert(predicate::path::is_file());
    copy.assert(predicate::path::missing());
    assert_eq!(report.summary.deleted, 1);
    assert_eq!(report.plan.moves, 0);
}

#[test]
fn missing_source_root_is_an_error() {
    let temp = assert_fs::TempDir::new().unwrap();

    let result = Pipeline::builder()
        .source(temp.child("nope").path())
        .archive_root(temp.child("archive").path())
        .build()
        .run();

    assert!(result.is_err());
    temp.child("archive").assert(predicate::path::missing());
}
