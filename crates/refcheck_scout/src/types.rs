//! Core types for refcheck
//!
//! Everything here lives for a single run, except that a [`RunReport`] is
//! serialized into the archive directory.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Truncate a timestamp to whole seconds.
///
/// Both report renderings print second-precision RFC 3339, so every stored
/// timestamp is normalized before it reaches a report.
pub fn whole_seconds(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_nanosecond(0).unwrap_or(ts)
}

// ============================================================================
// Scan Types
// ============================================================================

/// A candidate file modified inside the scan window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    /// Absolute path
    pub path: PathBuf,
    /// Project-relative path with forward slashes
    pub relative_path: String,
    /// Last modification time
    pub modified: DateTime<Utc>,
}

impl ScanTarget {
    pub fn file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }

    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
    }
}

// ============================================================================
// Match Types
// ============================================================================

/// One line of one searched file that mentions a scan target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceMatch {
    /// File the reference was found in (project-relative)
    pub source_file: String,
    /// File being referenced (project-relative)
    pub target_file: String,
    /// 1-based line number
    pub line_number: usize,
    /// Trimmed line content
    pub matched_text: String,
    /// Reference key that hit
    pub matched_key: String,
}

// ============================================================================
// Report Types
// ============================================================================

/// Findings for one scanned file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub path: String,
    pub last_modified: DateTime<Utc>,
    pub reference_count: usize,
    /// No incoming references were found
    pub orphan: bool,
    pub references: Vec<ReferenceMatch>,
}

impl FileReport {
    pub fn new(target: &ScanTarget, references: Vec<ReferenceMatch>) -> Self {
        Self {
            path: target.relative_path.clone(),
            last_modified: whole_seconds(target.modified),
            reference_count: references.len(),
            orphan: references.is_empty(),
            references,
        }
    }
}

/// Summary counts for a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub files_scanned: usize,
    pub files_referenced: usize,
    pub orphans: usize,
    pub references_found: usize,
    pub warnings: usize,
    pub errors: usize,
}

impl RunSummary {
    pub fn from_files(files: &[FileReport], warnings: usize) -> Self {
        let files_referenced = files.iter().filter(|f| !f.orphan).count();
        Self {
            files_scanned: files.len(),
            files_referenced,
            orphans: files.len() - files_referenced,
            references_found: files.iter().map(|f| f.reference_count).sum(),
            warnings,
            errors: 0,
        }
    }

    /// Final line printed after every run.
    pub fn summary_line(&self) -> String {
        format!(
            "refcheck: scanned={} referenced={} orphans={} references={} warnings={} errors={}",
            self.files_scanned,
            self.files_referenced,
            self.orphans,
            self.references_found,
            self.warnings,
            self.errors
        )
    }
}

/// Root aggregate written to the archive as Markdown and JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub project_base_path: String,
    pub time_window_hours: u64,
    pub scan_paths: Vec<String>,
    pub reference_search_paths: Vec<String>,
    pub summary: RunSummary,
    pub files: Vec<FileReport>,
    pub warnings: Vec<RunWarning>,
}

// ============================================================================
// Warnings
// ============================================================================

/// A scan base or entry that could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWarning {
    pub path: String,
    pub reason: String,
}

/// Non-fatal condition raised while matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchWarning {
    /// Scanned file with no incoming references
    Orphan { file: String },
    /// Configured search location that does not exist
    SearchPathMissing { path: String },
    /// Search file left out of the corpus
    SearchFileSkipped { path: String, reason: String },
}

/// Report file that could not be deleted during a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionWarning {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum RunWarning {
    Scan(ScanWarning),
    Match(MatchWarning),
    Retention(RetentionWarning),
}

impl RunWarning {
    pub fn category(&self) -> &'static str {
        match self {
            RunWarning::Scan(_) => "scan",
            RunWarning::Match(_) => "match",
            RunWarning::Retention(_) => "retention",
        }
    }
}

impl fmt::Display for RunWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunWarning::Scan(w) => write!(f, "{}: {}", w.path, w.reason),
            RunWarning::Match(MatchWarning::Orphan { file }) => {
                write!(f, "{}: no references found", file)
            }
            RunWarning::Match(MatchWarning::SearchPathMissing { path }) => {
                write!(f, "{}: search location does not exist", path)
            }
            RunWarning::Match(MatchWarning::SearchFileSkipped { path, reason }) => {
                write!(f, "{}: {}", path, reason)
            }
            RunWarning::Retention(w) => write!(f, "{}: {}", w.path, w.reason),
        }
    }
}
