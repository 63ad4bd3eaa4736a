//! Check command - scan, match, report, archive, sweep
//!
//! Runs the full pipeline once. The final summary line is printed by the
//! caller so it also appears when setup fails.

use crate::cli::context::{cli_path, override_archive_dir};
use crate::cli::error::HelpfulError;
use crate::cli::output::{print_json, print_table_colored};
use anyhow::Result;
use comfy_table::Color;
use refcheck_scout::{
    MatchWarning, Pipeline, RefcheckConfig, RunOptions, RunOutcome, RunSummary, RunWarning,
};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Arguments for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckArgs {
    pub hours: Option<u64>,
    pub paths: Vec<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub workers: Option<usize>,
    pub json: bool,
}

impl CheckArgs {
    /// Fold `--hours`, `--workers` and `--output-dir` into the loaded config.
    pub fn apply(&self, config: &mut RefcheckConfig) -> Result<()> {
        override_archive_dir(config, self.output_dir.as_deref())?;
        if let Some(hours) = self.hours {
            config.time_window_hours = hours;
        }
        if let Some(workers) = self.workers {
            config.match_workers = workers;
        }
        Ok(())
    }

    fn run_options(&self) -> Result<RunOptions> {
        let scan_paths = if self.paths.is_empty() {
            None
        } else {
            Some(
                self.paths
                    .iter()
                    .map(|p| cli_path(p))
                    .collect::<Result<Vec<_>>>()?,
            )
        };
        Ok(RunOptions {
            scan_paths,
            now: None,
        })
    }
}

/// Execute the check command. `summary` receives the run's counts, partial on failure.
pub fn run(
    args: &CheckArgs,
    config: RefcheckConfig,
    interrupt: Arc<AtomicBool>,
    summary: &mut RunSummary,
) -> Result<()> {
    let options = args.run_options()?;
    let pipeline = Pipeline::new(config).with_interrupt(interrupt);

    match pipeline.run(options) {
        Ok(outcome) => {
            *summary = outcome.summary.clone();
            if args.json {
                print_json(&outcome)?;
            } else {
                print_outcome(&outcome);
            }
            Ok(())
        }
        Err(err) => {
            *summary = err.summary.clone();
            Err(HelpfulError::stage_failed(&err).into())
        }
    }
}

fn print_outcome(outcome: &RunOutcome) {
    let report = &outcome.report;
    if report.files.is_empty() {
        println!(
            "No files modified in the last {} hours.",
            report.time_window_hours
        );
    } else {
        let rows = report
            .files
            .iter()
            .map(|file| {
                let (status, color) = if file.orphan {
                    ("ORPHAN".to_string(), Some(Color::Yellow))
                } else {
                    ("ok".to_string(), Some(Color::Green))
                };
                vec![
                    (file.path.clone(), None),
                    (file.last_modified.format("%Y-%m-%d %H:%M:%S").to_string(), None),
                    (file.reference_count.to_string(), None),
                    (status, color),
                ]
            })
            .collect();
        print_table_colored(&["File", "Modified (UTC)", "References", "Status"], rows);
    }

    // Orphans are already in the table.
    let notable: Vec<RunWarning> = outcome
        .all_warnings()
        .filter(|w| !matches!(w, RunWarning::Match(MatchWarning::Orphan { .. })))
        .collect();
    if !notable.is_empty() {
        println!();
        println!("Warnings:");
        for warning in notable {
            println!("  [{}] {}", warning.category(), warning);
        }
    }

    println!();
    println!(
        "Scanned {} file(s) in {} director(ies) in {} ms",
        outcome.scan.files_seen, outcome.scan.dirs_scanned, outcome.scan.duration_ms
    );
    if let Some(md) = outcome.archived.markdown_path() {
        println!("Report:   {}", md.display());
    }
    if let Some(json) = outcome.archived.json_path() {
        println!("          {}", json.display());
    }
    if !outcome.retention.deleted.is_empty() {
        println!(
            "Removed {} old report(s) from {}",
            outcome.retention.deleted.len(),
            report_dir(outcome)
        );
    }
}

fn report_dir(outcome: &RunOutcome) -> String {
    outcome
        .archived
        .files
        .first()
        .and_then(|p| p.parent())
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}
