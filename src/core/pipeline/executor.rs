//! Pipeline execution implementation.

use crate::core::calendar::EventCalendar;
use crate::core::dating::{DateResolver, DatedFile, YearRange};
use crate::core::duplicates::DuplicateIndex;
use crate::core::hasher::{ContentHasher, HashResult};
use crate::core::organize::{ArchivePlan, Executor, RelocationPlanner, DEFAULT_SUFFIX_LEN};
use crate::core::reporter::RunReport;
use crate::core::scanner::{ScanConfig, WalkDirScanner};
use crate::error::{ArchiveError, ConfigError};
use crate::events::{null_sender, Event, EventSender, PipelineEvent, PipelinePhase, PipelineSummary};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Default worker count, small enough not to saturate a NAS
pub const DEFAULT_WORKERS: usize = 4;

/// Configuration for the pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Tree to reconcile
    pub source: PathBuf,
    /// Root of the `YYYY/YYYYMM` layout (organize runs only)
    pub archive_root: Option<PathBuf>,
    /// Compute and report everything, touch nothing
    pub dry_run: bool,
    /// File dates matching an event rule into an event subfolder
    pub sort_events: bool,
    pub calendar: EventCalendar,
    /// Delete redundant copies; when off every file is filed on its own
    pub remove_duplicates: bool,
    /// Size of the worker pool
    pub workers: usize,
    pub scan_config: ScanConfig,
    /// 4 KiB prefix check before full hashing
    pub prefix_filter: bool,
    /// Digest characters in a disambiguated name
    pub suffix_len: usize,
    /// Years accepted as a real capture date
    pub years: YearRange,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::new(),
            archive_root: None,
            dry_run: false,
            sort_events: false,
            calendar: EventCalendar::default(),
            remove_duplicates: true,
            workers: DEFAULT_WORKERS,
            scan_config: ScanConfig::default(),
            prefix_filter: true,
            suffix_len: DEFAULT_SUFFIX_LEN,
            years: YearRange::default(),
        }
    }
}

/// Builder for pipeline configuration
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
}

impl PipelineBuilder {
    /// Create a new pipeline builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory to scan
    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.source = path.into();
        self
    }

    /// Archive to organize into
    pub fn archive_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.archive_root = Some(path.into());
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    pub fn sort_events(mut self, sort: bool) -> Self {
        self.config.sort_events = sort;
        self
    }

    /// Event rules, already validated
    pub fn calendar(mut self, calendar: EventCalendar) -> Self {
        self.config.calendar = calendar;
        self
    }

    pub fn remove_duplicates(mut self, remove: bool) -> Self {
        self.config.remove_duplicates = remove;
        self
    }

    /// Worker threads (at least one)
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.workers = workers.max(1);
        self
    }

    /// Set scanner configuration
    pub fn scan_config(mut self, config: ScanConfig) -> Self {
        self.config.scan_config = config;
        self
    }

    /// Include hidden files
    pub fn include_hidden(mut self, include: bool) -> Self {
        self.config.scan_config.include_hidden = include;
        self
    }

    pub fn prefix_filter(mut self, enabled: bool) -> Self {
        self.config.prefix_filter = enabled;
        self
    }

    pub fn suffix_len(mut self, len: usize) -> Self {
        self.config.suffix_len = len;
        self
    }

    pub fn years(mut self, years: YearRange) -> Self {
        self.config.years = years;
        self
    }

    /// Build the pipeline
    pub fn build(self) -> Pipeline {
        Pipeline {
            config: self.config,
        }
    }
}

/// Everything known about the source tree before planning
struct Analysis {
    dated: Vec<DatedFile>,
    hashes: HashResult,
    index: DuplicateIndex,
    errors: Vec<String>,
}

/// The scan / date / hash / plan / execute pipeline
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline builder
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Organize without events
    pub fn run(&self) -> Result<RunReport, ArchiveError> {
        self.run_with_events(&null_sender())
    }

    /// Organize the source tree into the archive, reporting progress.
    ///
    /// Only configuration problems and a missing source root fail the run;
    /// anything that goes wrong with a single file ends up in the report.
    pub fn run_with_events(&self, events: &EventSender) -> Result<RunReport, ArchiveError> {
        let archive = match &self.config.archive_root {
            Some(root) if !root.as_os_str().is_empty() => absolute(root),
            _ => return Err(ConfigError::MissingArchiveRoot.into()),
        };
        if archive.exists() && !archive.is_dir() {
            return Err(ConfigError::ArchiveNotDirectory { path: archive }.into());
        }

        self.in_pool(events, |source, start| {
            let analysis = self.analyze(&source, events)?;

            self.phase(events, PipelinePhase::Planning);
            let mut planner =
                RelocationPlanner::new(&archive).with_suffix_len(self.config.suffix_len);
            if self.config.sort_events {
                planner = planner.with_events(self.config.calendar.clone());
            }
            let no_groups = DuplicateIndex::default();
            let index = if self.config.remove_duplicates {
                &analysis.index
            } else {
                &no_groups
            };
            let plan = planner.plan(&analysis.dated, &analysis.hashes, index);

            Ok(self.execute(plan, analysis, source, Some(archive.clone()), start, events))
        })
    }

    /// Delete redundant copies in place; nothing is moved.
    pub fn deduplicate(&self, events: &EventSender) -> Result<RunReport, ArchiveError> {
        self.in_pool(events, |source, start| {
            let analysis = self.analyze(&source, events)?;

            self.phase(events, PipelinePhase::Planning);
            let plan = RelocationPlanner::plan_deduplication(&analysis.dated, &analysis.index);

            Ok(self.execute(plan, analysis, source, None, start, events))
        })
    }

    /// Run `body` on a dedicated, bounded rayon pool
    fn in_pool<F>(&self, events: &EventSender, body: F) -> Result<RunReport, ArchiveError>
    where
        F: FnOnce(PathBuf, Instant) -> Result<RunReport, ArchiveError> + Send,
    {
        let start = Instant::now();
        let source = absolute(&self.config.source);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers.max(1))
            .thread_name(|i| format!("archive-worker-{i}"))
            .build()
            .map_err(|e| ConfigError::WorkerPool(e.to_string()))?;

        tracing::info!(
            source = %source.display(),
            workers = self.config.workers,
            dry_run = self.config.dry_run,
            "pipeline started"
        );
        events.send(Event::Pipeline(PipelineEvent::Started));

        pool.install(|| body(source, start))
    }

    fn phase(&self, events: &EventSender, phase: PipelinePhase) {
        tracing::info!(%phase, "pipeline phase");
        events.send(Event::Pipeline(PipelineEvent::PhaseChanged { phase }));
    }

    fn analyze(&self, source: &Path, events: &EventSender) -> Result<Analysis, ArchiveError> {
        self.phase(events, PipelinePhase::Scanning);
        let scanner = WalkDirScanner::new(self.config.scan_config.clone());
        let scanned = scanner.scan_with_events(source, events)?;
        let mut errors: Vec<String> = scanned.errors.iter().map(|e| e.to_string()).collect();
        let files = scanned.files;

        self.phase(events, PipelinePhase::Analyzing);
        let resolver = DateResolver::new().with_years(self.config.years);
        let hasher = ContentHasher::new().with_prefix_filter(self.config.prefix_filter);
        let (dated, hashes) = rayon::join(
            || resolver.resolve_all(&files, events),
            || hasher.hash_all(&files, events),
        );
        errors.extend(hashes.errors.iter().map(|e| e.to_string()));

        let index = DuplicateIndex::build(&dated, &hashes);

        Ok(Analysis {
            dated,
            hashes,
            index,
            errors,
        })
    }

    fn execute(
        &self,
        plan: ArchivePlan,
        analysis: Analysis,
        source: PathBuf,
        archive: Option<PathBuf>,
        start: Instant,
        events: &EventSender,
    ) -> RunReport {
        self.phase(events, PipelinePhase::Executing);
        let outcomes = Executor::new(self.config.dry_run).execute(&plan, events);

        let mut report = RunReport::new(&plan, outcomes, self.config.dry_run, source, archive);
        report.summary.duplicate_groups = analysis.index.groups().len();
        report.summary.read_errors = analysis.errors.len();
        report.errors = analysis.errors;
        report.duration_ms = start.elapsed().as_millis() as u64;

        events.send(Event::Pipeline(PipelineEvent::Completed {
            summary: PipelineSummary {
                total_files: report.summary.total_files,
                duplicate_groups: report.summary.duplicate_groups,
                moves: plan.summary.moves,
                deletions: plan.summary.deletions,
                failures: report.summary.failed,
                duration_ms: report.duration_ms,
            },
        }));
        tracing::info!(
            files = report.summary.total_files,
            moved = report.summary.moved,
            deleted = report.summary.deleted,
            failed = report.summary.failed,
            duration_ms = report.duration_ms,
            "pipeline finished"
        );
        report
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
