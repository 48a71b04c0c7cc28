//! # CLI Module
//!
//! Command-line interface for the media archive.
//!
//! ## Usage
//! ```bash
//! # Preview organizing an inbox into the archive
//! media-archive organize /Volumes/photo/inbox /Volumes/photo/archive --dry-run
//!
//! # File into event folders using ./events.yaml (or .yml / .json)
//! media-archive organize ~/Inbox ~/Archive --sort-events
//!
//! # Remove duplicate copies in place
//! media-archive deduplicate ~/Pictures
//!
//! # Re-file an existing archive into event folders
//! media-archive events ~/Archive --events trips.yaml
//!
//! # JSON output
//! media-archive organize ~/Inbox ~/Archive --output json
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use media_archive::core::calendar::{load_rules, EventCalendar};
use media_archive::core::organize::OutcomeStatus;
use media_archive::core::pipeline::{Pipeline, PipelineBuilder, DEFAULT_WORKERS};
use media_archive::core::reporter::{export_json, export_to_file, format_bytes, ExportFormat, RunReport};
use media_archive::error::{ConfigError, Result};
use media_archive::events::{
    Event, EventChannel, EventReceiver, EventSender, ExecuteEvent, HashEvent, PipelineEvent,
    ScanEvent,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;

/// Event rule files looked up when `--sort-events` is given without `--events`
const DEFAULT_EVENTS_FILES: [&str; 3] = ["events.yaml", "events.yml", "events.json"];

/// Application directory under the user config and data directories
const APP_DIR: &str = "media-archive";

/// Media Archive - organize photos and videos by capture date
#[derive(Parser, Debug)]
#[command(name = "media-archive")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Move a source tree into the dated archive, removing duplicates
    Organize {
        /// Directory to organize
        source: PathBuf,

        /// Archive root (YYYY/YYYYMM folders are created below it)
        archive: PathBuf,

        /// File dates matching an event rule into an event subfolder
        #[arg(long)]
        sort_events: bool,

        /// Event rule file (YAML or JSON); implies --sort-events
        #[arg(long, value_name = "FILE")]
        events: Option<PathBuf>,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Delete duplicate copies in place, keeping the earliest-dated one
    Deduplicate {
        /// Directory to deduplicate
        dir: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Re-file an existing archive into event subfolders.
    ///
    /// Nothing is deleted: duplicate copies are moved or left in place like
    /// any other file.
    Events {
        /// Archive root
        archive: PathBuf,

        /// Event rule file (YAML or JSON)
        #[arg(long, value_name = "FILE")]
        events: Option<PathBuf>,

        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Show what would happen without touching any file
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Worker threads for reading files
    #[arg(short, long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Include hidden files and directories
    #[arg(long)]
    include_hidden: bool,

    /// Skip the 4 KiB prefix check before full hashing
    #[arg(long)]
    no_prefix_filter: bool,

    /// Output format
    #[arg(short, long, default_value = "pretty")]
    output: OutputFormat,

    /// Also write the full report to a file (.json or .csv)
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Directory for the rotating run log
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Do not write a log file
    #[arg(long, conflicts_with = "log_dir")]
    no_logfile: bool,
}

impl RunArgs {
    fn apply(&self, builder: PipelineBuilder) -> PipelineBuilder {
        builder
            .dry_run(self.dry_run)
            .workers(self.workers)
            .include_hidden(self.include_hidden)
            .prefix_filter(!self.no_prefix_filter)
    }

    /// `--log-dir`, else `<user data dir>/media-archive/logs`, else `./logs`
    fn log_dir(&self) -> Option<PathBuf> {
        if self.no_logfile {
            return None;
        }
        self.log_dir.clone().or_else(|| {
            Some(
                dirs::data_local_dir()
                    .map(|dir| dir.join(APP_DIR).join("logs"))
                    .unwrap_or_else(|| PathBuf::from("logs")),
            )
        })
    }
}

impl Commands {
    fn run_args(&self) -> &RunArgs {
        match self {
            Commands::Organize { run, .. }
            | Commands::Deduplicate { run, .. }
            | Commands::Events { run, .. } => run,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON report for scripting
    Json,
}

enum Mode {
    Organize,
    Deduplicate,
}

/// Run the CLI. Exits with 1 when any file action failed.
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let args = cli.command.run_args();
    let _log_guard = media_archive::init_tracing(args.verbose, args.log_dir().as_deref());

    let (pipeline, mode, run) = match cli.command {
        Commands::Organize {
            source,
            archive,
            sort_events,
            events,
            run,
        } => {
            let mut builder = Pipeline::builder().source(source).archive_root(archive);
            if sort_events || events.is_some() {
                builder = builder
                    .sort_events(true)
                    .calendar(load_calendar(events.as_deref())?);
            }
            (run.apply(builder).build(), Mode::Organize, run)
        }
        Commands::Deduplicate { dir, run } => {
            let builder = Pipeline::builder().source(dir);
            (run.apply(builder).build(), Mode::Deduplicate, run)
        }
        Commands::Events {
            archive,
            events,
            run,
        } => {
            let builder = Pipeline::builder()
                .source(&archive)
                .archive_root(&archive)
                .sort_events(true)
                .remove_duplicates(false)
                .calendar(load_calendar(events.as_deref())?);
            (run.apply(builder).build(), Mode::Organize, run)
        }
    };

    let report = run_with_progress(&pipeline, mode, &run)?;

    if let Some(path) = &run.report {
        export_to_file(&report, path, ExportFormat::from_path(path))?;
    }

    match run.output {
        OutputFormat::Pretty => print_pretty_report(&Term::stderr(), &report, run.verbose),
        OutputFormat::Json => export_json(&report, std::io::stdout().lock())?,
    }

    Ok(if report.has_failures() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}

/// Explicit file, else `./events.{yaml,yml,json}`, else the same names in
/// the user config directory
fn load_calendar(explicit: Option<&Path>) -> Result<EventCalendar> {
    if let Some(path) = explicit {
        return Ok(load_rules(path)?);
    }

    let config_dir = dirs::config_dir().map(|dir| dir.join(APP_DIR));
    let candidates = [Some(PathBuf::new()), config_dir]
        .into_iter()
        .flatten()
        .flat_map(|dir| DEFAULT_EVENTS_FILES.map(|name| dir.join(name)));
    for candidate in candidates {
        if candidate.is_file() {
            return Ok(load_rules(&candidate)?);
        }
    }

    Err(ConfigError::EventFile {
        path: PathBuf::from(DEFAULT_EVENTS_FILES[0]),
        reason: "no event rule file found; pass one with --events".to_string(),
    }
    .into())
}

fn run_with_progress(pipeline: &Pipeline, mode: Mode, args: &RunArgs) -> Result<RunReport> {
    let (sender, receiver) = EventChannel::new();

    let progress = if args.output == OutputFormat::Pretty {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        Some(pb)
    } else {
        None
    };

    // Handle events in a separate thread
    let event_thread = {
        let progress = progress.clone();
        let verbose = args.verbose;
        thread::spawn(move || render_events(receiver, progress, verbose))
    };

    let result = run_mode(pipeline, mode, &sender);

    // Drop sender to signal event thread to finish
    drop(sender);
    event_thread.join().ok();
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    result
}

fn run_mode(pipeline: &Pipeline, mode: Mode, sender: &EventSender) -> Result<RunReport> {
    match mode {
        Mode::Organize => pipeline.run_with_events(sender),
        Mode::Deduplicate => pipeline.deduplicate(sender),
    }
}

fn render_events(receiver: EventReceiver, progress: Option<ProgressBar>, verbose: bool) {
    let Some(pb) = progress else {
        // Drain so senders never notice a missing consumer
        for _ in receiver.iter() {}
        return;
    };

    for event in receiver.iter() {
        match event {
            Event::Pipeline(PipelineEvent::PhaseChanged { phase }) => {
                pb.set_position(0);
                pb.set_message(phase.to_string());
            }
            Event::Scan(ScanEvent::FileFound { .. }) => pb.tick(),
            Event::Scan(ScanEvent::Completed { total_files }) => {
                pb.set_length(total_files as u64);
            }
            Event::Hash(HashEvent::Started { candidates, .. }) => {
                pb.set_length(candidates as u64);
            }
            Event::Hash(HashEvent::Progress(p)) => {
                pb.set_position(p.completed as u64);
                if verbose {
                    pb.set_message(
                        p.current_path
                            .file_name()
                            .unwrap_or_default()
                            .to_string_lossy()
                            .into_owned(),
                    );
                }
            }
            Event::Execute(ExecuteEvent::Started { total_actions, .. }) => {
                pb.set_length(total_actions as u64);
            }
            Event::Execute(ExecuteEvent::Progress { completed, .. }) => {
                pb.set_position(completed as u64);
            }
            Event::Execute(ExecuteEvent::Failed { path, message }) => {
                pb.println(format!(
                    "{} {}: {}",
                    style("✗").red(),
                    display_path(&path),
                    message
                ));
            }
            Event::Pipeline(PipelineEvent::Completed { .. }) => pb.finish_and_clear(),
            _ => {}
        }
    }
}

fn print_pretty_report(term: &Term, report: &RunReport, verbose: bool) {
    let summary = &report.summary;

    term.write_line("").ok();
    let heading = if report.dry_run {
        style("Dry run complete").bold().yellow()
    } else {
        style("Run complete").bold().green()
    };
    term.write_line(&format!("{} {}", style("✓").green().bold(), heading))
        .ok();
    term.write_line("").ok();

    term.write_line(&format!(
        "  {} files scanned in {:.1}s",
        style(summary.total_files).cyan(),
        report.duration_ms as f64 / 1000.0
    ))
    .ok();
    term.write_line(&format!(
        "  {} duplicate groups",
        style(summary.duplicate_groups).cyan()
    ))
    .ok();

    if report.dry_run {
        term.write_line(&format!(
            "  {} moves and {} deletions planned ({} reclaimable)",
            style(report.plan.moves).cyan(),
            style(report.plan.deletions).cyan(),
            style(format_bytes(report.plan.reclaimable_bytes)).yellow()
        ))
        .ok();
    } else {
        term.write_line(&format!(
            "  {} moved, {} deleted ({} reclaimed)",
            style(summary.moved).cyan(),
            style(summary.deleted).cyan(),
            style(format_bytes(summary.reclaimed_bytes)).yellow()
        ))
        .ok();
    }
    term.write_line(&format!("  {} left in place", style(summary.skipped).dim()))
        .ok();
    if report.plan.conflicts > 0 {
        term.write_line(&format!(
            "  {} name collisions resolved with a digest suffix",
            style(report.plan.conflicts).yellow()
        ))
        .ok();
    }

    if !report.plan.by_year.is_empty() {
        term.write_line("").ok();
        term.write_line(&format!("{}", style("By year:").bold().underlined()))
            .ok();
        for year in &report.plan.by_year {
            term.write_line(&format!(
                "  {}  {:>6} files  {}",
                style(year.year).bold(),
                year.count,
                style(format_bytes(year.size_bytes)).dim()
            ))
            .ok();
        }
    }

    if verbose {
        term.write_line("").ok();
        for entry in &report.entries {
            let marker = match entry.status {
                OutcomeStatus::Applied => style("✓").green(),
                OutcomeStatus::Planned => style("→").cyan(),
                OutcomeStatus::Skipped => style("○").dim(),
                OutcomeStatus::Failed => style("✗").red(),
            };
            let detail = entry
                .target
                .as_ref()
                .or(entry.survivor.as_ref())
                .map(|p| format!(" -> {}", display_path(p)))
                .unwrap_or_default();
            let reason = entry
                .reason
                .as_ref()
                .map(|r| format!(" ({r})"))
                .unwrap_or_default();
            term.write_line(&format!(
                "  {} {} {}{}{} [{}]",
                marker,
                entry.action,
                display_path(&entry.source),
                detail,
                style(reason).dim(),
                entry.date_source
            ))
            .ok();
        }
    }

    if !report.errors.is_empty() {
        term.write_line("").ok();
        term.write_line(&format!(
            "{} {} files could not be read:",
            style("!").yellow().bold(),
            report.errors.len()
        ))
        .ok();
        for error in &report.errors {
            term.write_line(&format!("  {}", style(error).dim())).ok();
        }
    }

    if summary.failed > 0 {
        term.write_line("").ok();
        term.write_line(&format!(
            "{} {} actions failed; their sources were left untouched:",
            style("✗").red().bold(),
            summary.failed
        ))
        .ok();
        for entry in report.entries_with(OutcomeStatus::Failed) {
            term.write_line(&format!(
                "  {} {}",
                display_path(&entry.source),
                style(entry.reason.as_deref().unwrap_or("")).dim()
            ))
            .ok();
        }
    }

    if report.dry_run {
        term.write_line("").ok();
        term.write_line(&format!(
            "{}",
            style("Dry run: no files were moved or deleted.").dim()
        ))
        .ok();
    }
}

/// Shorten paths under the home directory to `~/...`
fn display_path(path: &Path) -> String {
    match dirs::home_dir().and_then(|home| path.strip_prefix(home).ok().map(Path::to_path_buf)) {
        Some(rest) => format!("~/{}", rest.display()),
        None => path.display().to_string(),
    }
}
