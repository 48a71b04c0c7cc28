//! Date tokens embedded in file names (`IMG_20230405_1200.jpg`, `PXL_2023-04-05.mp4`).

use super::YearRange;
use crate::core::scanner::MediaFile;
use chrono::{NaiveDate, NaiveDateTime};
use regex::{Match, Regex};
use std::path::Path;
use std::sync::LazyLock;

/// Separates an original stem from the digest suffix added on name collisions
pub const DISAMBIGUATION_MARKER: char = '~';

static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("digit run pattern is valid"));

/// Separators allowed between year, month and day
const DATE_SEPARATORS: [&str; 2] = ["-", "_"];

pub(super) fn extract(file: &MediaFile, years: &YearRange) -> Option<NaiveDateTime> {
    date_from_filename(&file.path, years)
}

/// First calendar-valid, plausible date token in the file stem, at midnight.
///
/// A token is either eight consecutive digits (`YYYYMMDD`, at any offset
/// inside a longer digit run) or `YYYY-MM-DD` / `YYYY_MM_DD` with the same
/// separator twice. Tokens are tried left to right.
pub fn date_from_filename(path: &Path, years: &YearRange) -> Option<NaiveDateTime> {
    let stem = path.file_stem()?.to_str()?;
    let stem = strip_disambiguation(stem);
    let runs: Vec<Match<'_>> = DIGIT_RUN.find_iter(stem).collect();

    (0..runs.len())
        .flat_map(|i| tokens_at(stem, &runs[i..]))
        .filter_map(|[year, month, day]| {
            NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)?
                .and_hms_opt(0, 0, 0)
        })
        .find(|date| years.contains(date))
}

/// Candidate `[year, month, day]` tokens starting inside `runs[0]`, in
/// position order.
fn tokens_at<'a>(stem: &'a str, runs: &[Match<'a>]) -> Vec<[&'a str; 3]> {
    let digits = runs[0].as_str();
    let mut tokens: Vec<[&str; 3]> = separated_token(stem, runs).into_iter().collect();
    tokens.extend(
        (0..digits.len().saturating_sub(7))
            .map(|at| [&digits[at..at + 4], &digits[at + 4..at + 6], &digits[at + 6..at + 8]]),
    );
    tokens
}

/// `YYYY<sep>MM<sep>DD` made of exactly the next three digit runs
fn separated_token<'a>(stem: &'a str, runs: &[Match<'a>]) -> Option<[&'a str; 3]> {
    let (year, month, day) = (runs.first()?, runs.get(1)?, runs.get(2)?);
    let widths = [year, month, day].map(|run| run.as_str().len());
    if widths != [4, 2, 2] {
        return None;
    }
    let first = &stem[year.end()..month.start()];
    let second = &stem[month.end()..day.start()];
    (first == second && DATE_SEPARATORS.contains(&first))
        .then(|| [year.as_str(), month.as_str(), day.as_str()])
}

/// Remove a trailing `~<hex>` collision suffix, if present.
///
/// Without this a digest that happens to be all digits could be read back
/// as a date on the next run.
pub fn strip_disambiguation(stem: &str) -> &str {
    match stem.rsplit_once(DISAMBIGUATION_MARKER) {
        Some((original, suffix))
            if !original.is_empty()
                && !suffix.is_empty()
                && suffix.chars().all(|c| c.is_ascii_hexdigit()) =>
        {
            original
        }
        _ => stem,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn years() -> YearRange {
        YearRange {
            min: 1990,
            max: 2030,
        }
    }

    fn parse(name: &str) -> Option<NaiveDate> {
        date_from_filename(Path::new(name), &years()).map(|d| d.date())
    }

    #[test]
    fn parses_compact_token() {
        assert_eq!(
            parse("IMG_20230405_1200.jpg"),
            NaiveDate::from_ymd_opt(2023, 4, 5)
        );
        assert_eq!(parse("20191231.mov"), NaiveDate::from_ymd_opt(2019, 12, 31));
    }

    #[test]
    fn parses_separated_token() {
        assert_eq!(
            parse("PXL_2022-08-09_beach.mp4"),
            NaiveDate::from_ymd_opt(2022, 8, 9)
        );
        assert_eq!(
            parse("Screenshot 2021_01_02.png"),
            NaiveDate::from_ymd_opt(2021, 1, 2)
        );
    }

    #[test]
    fn rejects_invalid_calendar_dates() {
        assert_eq!(parse("IMG_20231345.jpg"), None);
        assert_eq!(parse("IMG_20230230.jpg"), None);
    }

    #[test]
    fn skips_implausible_token_and_tries_the_next() {
        assert_eq!(
            parse("IMG_12345678_20200102.jpg"),
            NaiveDate::from_ymd_opt(2020, 1, 2)
        );
    }

    #[test]
    fn counter_before_the_date_does_not_hide_it() {
        let expected = NaiveDate::from_ymd_opt(2023, 4, 5);
        assert_eq!(parse("DSC_0042_20230405.jpg"), expected);
        assert_eq!(parse("IMG_12345_20230405.jpg"), expected);
        assert_eq!(parse("trip_2023_20230405.jpg"), expected);
        assert_eq!(parse("IMG_0001-2023-04-05.jpg"), expected);
    }

    #[test]
    fn compact_token_inside_a_longer_run() {
        assert_eq!(
            parse("VID1920230405.mp4"),
            NaiveDate::from_ymd_opt(2023, 4, 5)
        );
    }

    #[test]
    fn separators_must_match() {
        assert_eq!(parse("IMG_2023-04_05.jpg"), None);
        assert_eq!(parse("IMG_2023-04-5.jpg"), None);
    }

    #[test]
    fn no_token_means_absent() {
        assert_eq!(parse("holiday.jpg"), None);
        assert_eq!(parse("IMG_1234.jpg"), None);
    }

    #[test]
    fn ignores_disambiguation_suffix() {
        assert_eq!(parse("beach~20210405.jpg"), None);
        let date = date_from_filename(Path::new("IMG_20230405~20210101.jpg"), &years()).unwrap();
        assert_eq!(date.year(), 2023);
    }

    #[test]
    fn strip_only_removes_hex_suffix() {
        assert_eq!(strip_disambiguation("photo~a1b2c3d4"), "photo");
        assert_eq!(strip_disambiguation("photo~draft"), "photo~draft");
        assert_eq!(strip_disambiguation("photo"), "photo");
        assert_eq!(strip_disambiguation("~abcdef"), "~abcdef");
    }
}
