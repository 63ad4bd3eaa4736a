//! Reports commands - list archived reports and prune them
//!
//! Both work on the archive directory alone; nothing is scanned.

use crate::cli::output::{format_age, print_json, print_table};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Subcommand;
use refcheck_scout::retention::sweep;
use refcheck_scout::{
    ArchivedReport, RefcheckConfig, ReportArchiver, RetentionOutcome, RetentionPolicy,
};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Subcommand, Debug, Clone)]
pub enum ReportsAction {
    /// List archived reports, newest first
    List {
        /// Archive directory (overrides archive_dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Apply the retention policy without running a check
    Prune {
        /// Archive directory (overrides archive_dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Keep at most this many reports
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        max_reports: Option<u64>,

        /// Delete reports older than this many days (0 disables)
        #[arg(long)]
        max_age_days: Option<u64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl ReportsAction {
    pub fn json(&self) -> bool {
        match self {
            ReportsAction::List { json, .. } | ReportsAction::Prune { json, .. } => *json,
        }
    }

    pub fn output_dir(&self) -> Option<&std::path::Path> {
        match self {
            ReportsAction::List { output_dir, .. } | ReportsAction::Prune { output_dir, .. } => {
                output_dir.as_deref()
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ReportListing {
    dir: PathBuf,
    reports: Vec<ArchivedReport>,
}

fn archiver_for(config: &RefcheckConfig) -> Result<ReportArchiver> {
    ReportArchiver::new(&config.archive_dir, &config.report_basename)
        .context("Failed to open report archive")
}

/// Execute a reports subcommand against an already-overridden config.
pub fn run(action: &ReportsAction, config: &RefcheckConfig) -> Result<()> {
    let archiver = archiver_for(config)?;
    match action {
        ReportsAction::List { json, .. } => list(&archiver, *json),
        ReportsAction::Prune {
            max_reports,
            max_age_days,
            json,
            ..
        } => {
            let mut policy = config.retention.clone();
            if let Some(max) = max_reports {
                policy.max_reports = Some(usize::try_from(*max).unwrap_or(usize::MAX));
            }
            if max_age_days.is_some() {
                policy.max_age_days = *max_age_days;
            }
            policy
                .validate()
                .map_err(|message| anyhow::anyhow!("Invalid retention policy: {}", message))?;
            prune(&archiver, &policy, *json)
        }
    }
}

fn list(archiver: &ReportArchiver, json: bool) -> Result<()> {
    let reports = archiver
        .list()
        .with_context(|| format!("Failed to list {}", archiver.dir().display()))?;

    if json {
        return print_json(&ReportListing {
            dir: archiver.dir().to_path_buf(),
            reports,
        });
    }

    if reports.is_empty() {
        println!("No reports in {}", archiver.dir().display());
        return Ok(());
    }

    let now = Utc::now();
    let rows = reports
        .iter()
        .map(|r| {
            vec![
                r.stem.clone(),
                r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                format_age(r.timestamp, now),
                r.files.len().to_string(),
            ]
        })
        .collect();
    print_table(&["Report", "Generated (UTC)", "Age", "Files"], rows);
    println!("{} report(s) in {}", reports.len(), archiver.dir().display());
    Ok(())
}

fn prune(archiver: &ReportArchiver, policy: &RetentionPolicy, json: bool) -> Result<()> {
    let outcome: RetentionOutcome = sweep(archiver, policy, Utc::now(), None);

    if json {
        return print_json(&outcome);
    }

    if outcome.deleted.is_empty() {
        println!("Nothing to prune ({} report(s) kept)", outcome.kept);
    } else {
        for stem in &outcome.deleted {
            println!("Deleted {}", stem);
        }
        println!(
            "Pruned {} report(s), {} kept",
            outcome.deleted.len(),
            outcome.kept
        );
    }
    for stem in &outcome.incomplete_removed {
        println!("Removed incomplete {}", stem);
    }
    for warning in &outcome.warnings {
        eprintln!("WARNING: could not delete {}: {}", warning.path, warning.reason);
    }
    Ok(())
}
