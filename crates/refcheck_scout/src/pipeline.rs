//! One refcheck run: scan, match, report, archive, sweep.
//!
//! Stages run strictly in order. A failing stage stops the run and comes
//! back as a [`PipelineError`] carrying the stage name and the summary as it
//! stood at that point.

use crate::archive::{ArchivedReport, ReportArchiver};
use crate::config::RefcheckConfig;
use crate::error::RefcheckError;
use crate::matcher::{ReferenceMatcher, SearchCorpus};
use crate::report::build_report;
use crate::retention::{sweep, RetentionOutcome};
use crate::scanner::{ScanStats, Scanner, TimeWindow};
use crate::types::{whole_seconds, RunReport, RunSummary, RunWarning};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span};

/// Where a run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    Scanning,
    Matching,
    Reporting,
    Archiving,
    RetentionSweep,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::Scanning => "scanning",
            Stage::Matching => "matching",
            Stage::Reporting => "reporting",
            Stage::Archiving => "archiving",
            Stage::RetentionSweep => "retention_sweep",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage that failed, with what had been counted so far.
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    pub summary: RunSummary,
    #[source]
    pub source: RefcheckError,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageTiming {
    pub stage: Stage,
    pub elapsed_ms: u64,
}

/// Per-run overrides.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Replace the configured scan paths
    pub scan_paths: Option<Vec<PathBuf>>,
    /// Run time; the current time when unset
    pub now: Option<DateTime<Utc>>,
}

/// Everything a successful run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub report: RunReport,
    pub archived: ArchivedReport,
    pub retention: RetentionOutcome,
    /// Walk counters from the scanning stage
    pub scan: ScanStats,
    /// Report summary plus retention warnings
    pub summary: RunSummary,
    pub timings: Vec<StageTiming>,
}

impl RunOutcome {
    /// Warnings from every stage, retention included.
    pub fn all_warnings(&self) -> impl Iterator<Item = RunWarning> + '_ {
        self.report.warnings.iter().cloned().chain(
            self.retention
                .warnings
                .iter()
                .cloned()
                .map(RunWarning::Retention),
        )
    }
}

pub struct Pipeline {
    config: RefcheckConfig,
    interrupt: Option<Arc<AtomicBool>>,
}

impl Pipeline {
    pub fn new(config: RefcheckConfig) -> Self {
        Self {
            config,
            interrupt: None,
        }
    }

    /// Abort between stages (and between targets while matching) once `flag` is set.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    fn check_interrupt(&self, stage: Stage, summary: &RunSummary) -> Result<(), PipelineError> {
        if self
            .interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
        {
            return Err(PipelineError {
                stage,
                summary: summary.clone(),
                source: RefcheckError::Interrupted(stage.as_str()),
            });
        }
        Ok(())
    }

    pub fn run(&self, options: RunOptions) -> Result<RunOutcome, PipelineError> {
        let config = &self.config;
        let now = whole_seconds(options.now.unwrap_or_else(Utc::now));
        let scan_paths = options
            .scan_paths
            .unwrap_or_else(|| config.scan_paths.clone());

        let span = info_span!("run", at = %now);
        let _guard = span.enter();

        let mut summary = RunSummary::default();
        let mut timings = Vec::new();
        let mut warnings: Vec<RunWarning> = Vec::new();

        let fail = |stage: Stage, summary: &RunSummary, source: RefcheckError| {
            error!(stage = %stage, error = %source, "Run failed");
            PipelineError {
                stage,
                summary: RunSummary {
                    errors: summary.errors + 1,
                    ..summary.clone()
                },
                source,
            }
        };

        let archiver = ReportArchiver::new(&config.archive_dir, &config.report_basename)
            .map_err(|e| fail(Stage::Idle, &summary, e))?;

        // Scanning
        self.check_interrupt(Stage::Scanning, &summary)?;
        let started = Instant::now();
        let scanner = Scanner::new(config).map_err(|e| fail(Stage::Scanning, &summary, e))?;
        let scan = scanner.scan(
            &scan_paths,
            TimeWindow::ending_at(now, config.time_window_hours),
        );
        let scan_stats = scan.stats;
        summary.files_scanned = scan.targets.len();
        summary.warnings += scan.warnings.len();
        warnings.extend(scan.warnings.into_iter().map(RunWarning::Scan));
        timings.push(StageTiming {
            stage: Stage::Scanning,
            elapsed_ms: started.elapsed().as_millis() as u64,
        });

        // Matching
        self.check_interrupt(Stage::Matching, &summary)?;
        let started = Instant::now();
        let (corpus, corpus_warnings) =
            SearchCorpus::collect(config).map_err(|e| fail(Stage::Matching, &summary, e))?;
        summary.warnings += corpus_warnings.len();
        warnings.extend(corpus_warnings.into_iter().map(RunWarning::Match));

        let matcher = ReferenceMatcher::new(config, corpus);
        let matched = matcher
            .match_all(&scan.targets, self.interrupt.as_deref())
            .map_err(|e| fail(Stage::Matching, &summary, e))?;
        warnings.extend(matched.warnings.into_iter().map(RunWarning::Match));
        timings.push(StageTiming {
            stage: Stage::Matching,
            elapsed_ms: started.elapsed().as_millis() as u64,
        });

        // Reporting
        self.check_interrupt(Stage::Reporting, &summary)?;
        let started = Instant::now();
        let report = build_report(config, now, &scan_paths, matched.files, warnings);
        summary = report.summary.clone();
        timings.push(StageTiming {
            stage: Stage::Reporting,
            elapsed_ms: started.elapsed().as_millis() as u64,
        });

        // Archiving
        self.check_interrupt(Stage::Archiving, &summary)?;
        let started = Instant::now();
        let archived = archiver
            .write(&report)
            .map_err(|e| fail(Stage::Archiving, &summary, e))?;
        timings.push(StageTiming {
            stage: Stage::Archiving,
            elapsed_ms: started.elapsed().as_millis() as u64,
        });

        // Retention sweep; a report already on disk is never undone by an
        // interrupt here.
        let started = Instant::now();
        let retention = sweep(&archiver, &config.retention, now, Some(&archived.stem));
        summary.warnings += retention.warnings.len();
        timings.push(StageTiming {
            stage: Stage::RetentionSweep,
            elapsed_ms: started.elapsed().as_millis() as u64,
        });

        info!(
            scanned = summary.files_scanned,
            orphans = summary.orphans,
            references = summary.references_found,
            warnings = summary.warnings,
            report = %archived.stem,
            "Run complete"
        );

        Ok(RunOutcome {
            report,
            archived,
            retention,
            scan: scan_stats,
            summary,
            timings,
        })
    }
}
