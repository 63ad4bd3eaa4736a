//! Filesystem scanner for recently modified files
//!
//! # Design
//!
//! - Walk each base path with `walkdir`, sorted by file name so output is
//!   reproducible
//! - Prune excluded directories before descending
//! - Keep regular files whose suffix and mtime pass the filters
//! - Missing or unreadable bases become warnings, never errors

use crate::config::{has_extension, RefcheckConfig};
use crate::error::{RefcheckError, Result};
use crate::patterns::ExcludeSet;
use crate::scan_path::{canonicalize_scan_path, relative_display, validate_scan_path};
use crate::types::{ScanTarget, ScanWarning};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Half-open modification window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// The `hours` before `now`. Zero hours is an empty window.
    pub fn ending_at(now: DateTime<Utc>, hours: u64) -> Self {
        let hours = i64::try_from(hours).unwrap_or(i64::MAX / 3600);
        Self {
            start: now - Duration::hours(hours),
            end: now,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

/// Scan statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub bases_scanned: usize,
    pub dirs_scanned: usize,
    pub files_seen: usize,
    pub files_matched: usize,
    pub duration_ms: u64,
}

/// Result of a scan operation
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Sorted, de-duplicated candidates
    pub targets: Vec<ScanTarget>,
    pub warnings: Vec<ScanWarning>,
    pub stats: ScanStats,
}

/// Something met while walking a tree.
pub(crate) enum WalkItem<'a> {
    Dir,
    File(&'a DirEntry),
    Error { path: String, message: String },
}

/// Exclusion-aware directory walk shared by the scanner and the corpus loader.
#[derive(Debug, Clone)]
pub(crate) struct TreeWalker {
    project_base: PathBuf,
    excludes: ExcludeSet,
    /// Output directories (archive, logs) that must never be read back
    skip_dirs: Vec<PathBuf>,
}

impl TreeWalker {
    pub(crate) fn from_config(config: &RefcheckConfig) -> Result<Self> {
        let excludes = config.exclude_set().map_err(RefcheckError::Pattern)?;
        let mut skip_dirs = vec![canonicalize_scan_path(&config.archive_dir)];
        if let Some(dir) = &config.log_dir {
            skip_dirs.push(canonicalize_scan_path(dir));
        }
        Ok(Self {
            project_base: config.project_base_path.clone(),
            excludes,
            skip_dirs,
        })
    }

    pub(crate) fn project_base(&self) -> &Path {
        &self.project_base
    }

    pub(crate) fn is_skipped(&self, path: &Path) -> bool {
        if self.skip_dirs.iter().any(|dir| path.starts_with(dir)) {
            return true;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        self.excludes
            .is_excluded(&name, &relative_display(&self.project_base, path))
    }

    /// [`Self::is_skipped`] applied to `path` and to every directory between
    /// it and the project base, for paths that were not reached by a walk.
    pub(crate) fn is_pruned(&self, path: &Path) -> bool {
        self.is_skipped(path)
            || path
                .ancestors()
                .skip(1)
                .take_while(|dir| {
                    dir.starts_with(&self.project_base) && *dir != self.project_base.as_path()
                })
                .any(|dir| self.is_skipped(dir))
    }

    pub(crate) fn walk(&self, base: &Path, mut visit: impl FnMut(WalkItem<'_>)) {
        let walker = WalkDir::new(base)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_skipped(entry.path()));

        for entry in walker {
            match entry {
                Ok(entry) => {
                    let ft = entry.file_type();
                    if ft.is_dir() {
                        visit(WalkItem::Dir);
                    } else if ft.is_file() {
                        visit(WalkItem::File(&entry));
                    }
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| base.display().to_string());
                    visit(WalkItem::Error {
                        path,
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}

/// Filesystem scanner
pub struct Scanner {
    walker: TreeWalker,
    extensions: Vec<String>,
}

impl Scanner {
    pub fn new(config: &RefcheckConfig) -> Result<Self> {
        Ok(Self {
            walker: TreeWalker::from_config(config)?,
            extensions: config.include_file_extensions.clone(),
        })
    }

    /// Scan `bases` for files modified inside `window`.
    pub fn scan(&self, bases: &[PathBuf], window: TimeWindow) -> ScanResult {
        let start = Instant::now();
        let mut result = ScanResult::default();
        let mut found: BTreeMap<PathBuf, ScanTarget> = BTreeMap::new();
        let mut seen_bases: Vec<PathBuf> = Vec::new();

        info!(
            bases = bases.len(),
            from = %window.start,
            to = %window.end,
            "Scanning for recently modified files"
        );

        for base in bases {
            let base = canonicalize_scan_path(base);
            if let Err(e) = validate_scan_path(&base) {
                warn!(path = %base.display(), "Skipping scan path: {}", e);
                result.warnings.push(ScanWarning {
                    path: base.display().to_string(),
                    reason: e.to_string(),
                });
                continue;
            }
            if seen_bases.contains(&base) {
                debug!(path = %base.display(), "Skipping already scanned path");
                continue;
            }
            seen_bases.push(base.clone());
            result.stats.bases_scanned += 1;

            self.walker.walk(&base, |item| match item {
                WalkItem::Dir => result.stats.dirs_scanned += 1,
                WalkItem::Error { path, message } => {
                    warn!(path = %path, error = %message, "Unreadable entry during scan");
                    result.warnings.push(ScanWarning {
                        path,
                        reason: message,
                    });
                }
                WalkItem::File(entry) => {
                    result.stats.files_seen += 1;
                    if let Some(target) = self.candidate(entry, &window, &mut result.warnings) {
                        found.entry(target.path.clone()).or_insert(target);
                    }
                }
            });
        }

        result.targets = found.into_values().collect();
        result.stats.files_matched = result.targets.len();
        result.stats.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            files = result.targets.len(),
            seen = result.stats.files_seen,
            bases = result.stats.bases_scanned,
            dirs = result.stats.dirs_scanned,
            warnings = result.warnings.len(),
            elapsed_ms = result.stats.duration_ms,
            "Scan complete"
        );
        for target in &result.targets {
            debug!(file = %target.relative_path, modified = %target.modified, "Candidate");
        }
        result
    }

    fn candidate(
        &self,
        entry: &DirEntry,
        window: &TimeWindow,
        warnings: &mut Vec<ScanWarning>,
    ) -> Option<ScanTarget> {
        let name = entry.file_name().to_string_lossy();
        if !has_extension(&name, &self.extensions) {
            return None;
        }

        let modified = match entry.metadata().map_err(|e| e.to_string()).and_then(|m| {
            m.modified().map_err(|e| e.to_string())
        }) {
            Ok(modified) => DateTime::<Utc>::from(modified),
            Err(message) => {
                warn!(path = %entry.path().display(), error = %message, "Cannot read mtime");
                warnings.push(ScanWarning {
                    path: entry.path().display().to_string(),
                    reason: message,
                });
                return None;
            }
        };

        if !window.contains(modified) {
            return None;
        }

        Some(ScanTarget {
            path: entry.path().to_path_buf(),
            relative_path: relative_display(self.walker.project_base(), entry.path()),
            modified,
        })
    }
}
