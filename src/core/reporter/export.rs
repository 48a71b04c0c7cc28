//! Export functionality for run reports.
//!
//! JSON for machines, CSV for spreadsheets.

use super::RunReport;
use std::io::Write;
use std::path::Path;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    /// Guess from a file extension, defaulting to JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => ExportFormat::Csv,
            _ => ExportFormat::Json,
        }
    }
}

/// Export the whole report as pretty-printed JSON
pub fn export_json<W: Write>(report: &RunReport, mut writer: W) -> std::io::Result<()> {
    serde_json::to_writer_pretty(&mut writer, report)?;
    writeln!(writer)
}

/// Export one row per file
///
/// CSV columns: Source, Action, Target, Survivor, Date, Date Source, Status, Reason
pub fn export_csv<W: Write>(report: &RunReport, mut writer: W) -> std::io::Result<()> {
    writeln!(
        writer,
        "Source,Action,Target,Survivor,Date,Date Source,Status,Reason"
    )?;

    for entry in &report.entries {
        let target = entry
            .target
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let survivor = entry
            .survivor
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        writeln!(
            writer,
            "{},{},{},{},{},{},{},{}",
            csv_field(&entry.source.display().to_string()),
            entry.action,
            csv_field(&target),
            csv_field(&survivor),
            entry.date.format("%Y-%m-%d %H:%M:%S"),
            entry.date_source,
            entry.status,
            csv_field(entry.reason.as_deref().unwrap_or("")),
        )?;
    }

    Ok(())
}

/// Quote a field when it contains a separator, quote or newline
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Export a report to a file
pub fn export_to_file(report: &RunReport, path: &Path, format: ExportFormat) -> std::io::Result<()> {
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);

    match format {
        ExportFormat::Json => export_json(report, &mut writer)?,
        ExportFormat::Csv => export_csv(report, &mut writer)?,
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reporter::tests::sample_report;
    use tempfile::TempDir;

    #[test]
    fn csv_export_includes_header() {
        let mut output = Vec::new();
        export_csv(&sample_report(), &mut output).unwrap();

        let csv = String::from_utf8(output).unwrap();
        assert!(csv.starts_with("Source,Action,Target,Survivor,Date"));
        assert_eq!(csv.lines().count(), 4);
    }

    #[test]
    fn csv_quotes_fields_with_commas() {
        let mut output = Vec::new();
        export_csv(&sample_report(), &mut output).unwrap();

        let csv = String::from_utf8(output).unwrap();
        assert!(csv.contains("\"/inbox/copy, of IMG.jpg\",delete,"));
        assert!(csv.contains("2023-04-05 09:30:00,filename,applied"));
    }

    #[test]
    fn json_export_round_trips_summary() {
        let mut output = Vec::new();
        export_json(&sample_report(), &mut output).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["summary"]["moved"], 1);
        assert_eq!(value["entries"][0]["status"], "applied");
        assert_eq!(value["entries"][1]["date_source"], "filename");
    }

    #[test]
    fn export_to_file_picks_format() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.csv");

        export_to_file(&sample_report(), &path, ExportFormat::from_path(&path)).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("Source,"));
        assert_eq!(ExportFormat::from_path(Path::new("r.json")), ExportFormat::Json);
    }

    #[test]
    fn format_bytes_handles_all_sizes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1024 * 1024), "1.0 MB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.0 GB");
    }
}
