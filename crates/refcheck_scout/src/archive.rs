//! Timestamped report archive
//!
//! Layout: `<dir>/<basename>_<YYYYMMDD_HHMMSS>[-N].{md,json}`. Files are
//! written under a hidden `.tmp` name and renamed into place, so a run that
//! dies mid-write never leaves something that looks like a report.

use crate::error::{RefcheckError, Result};
use crate::report::{render_json, render_markdown};
use crate::types::RunReport;
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const MAX_SEQUENCE: u32 = 1000;

/// One archived Markdown/JSON pair (or what is left of it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchivedReport {
    pub stem: String,
    pub timestamp: DateTime<Utc>,
    /// 1 for the first report of a given second
    pub sequence: u32,
    pub files: Vec<PathBuf>,
}

impl ArchivedReport {
    pub fn markdown_path(&self) -> Option<&Path> {
        self.file_with_extension("md")
    }

    pub fn json_path(&self) -> Option<&Path> {
        self.file_with_extension("json")
    }

    /// Both the Markdown and the JSON rendering are on disk.
    pub fn is_complete(&self) -> bool {
        self.markdown_path().is_some() && self.json_path().is_some()
    }

    fn file_with_extension(&self, ext: &str) -> Option<&Path> {
        self.files
            .iter()
            .map(PathBuf::as_path)
            .find(|p| p.extension().and_then(|e| e.to_str()) == Some(ext))
    }
}

/// Report stems found in the archive directory.
#[derive(Debug, Clone, Default)]
pub struct ArchiveInventory {
    /// Stems with both renderings
    pub reports: Vec<ArchivedReport>,
    /// Stems missing one rendering, left behind by an aborted write
    pub incomplete: Vec<ArchivedReport>,
}

/// Writes and lists report pairs in one directory.
#[derive(Debug, Clone)]
pub struct ReportArchiver {
    dir: PathBuf,
    basename: String,
    name_pattern: Regex,
}

impl ReportArchiver {
    pub fn new(dir: impl Into<PathBuf>, basename: &str) -> Result<Self> {
        let name_pattern = Regex::new(&format!(
            r"^{}_(\d{{8}}_\d{{6}})(?:-(\d+))?\.(md|json)$",
            regex::escape(basename)
        ))
        .map_err(|e| RefcheckError::Pattern(e.to_string()))?;
        Ok(Self {
            dir: dir.into(),
            basename: basename.to_string(),
            name_pattern,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write both renderings of `report`; returns the archived pair.
    pub fn write(&self, report: &RunReport) -> Result<ArchivedReport> {
        fs::create_dir_all(&self.dir).map_err(|e| RefcheckError::ArchiveDir {
            path: self.dir.clone(),
            message: e.to_string(),
        })?;

        let (stem, sequence) = self.free_stem(&report.generated_at)?;
        let markdown = render_markdown(report);
        let json = render_json(report)?;

        let json_path = self.dir.join(format!("{stem}.json"));
        let md_path = self.dir.join(format!("{stem}.md"));
        write_atomic(&json_path, json.as_bytes())?;
        if let Err(e) = write_atomic(&md_path, markdown.as_bytes()) {
            // A lone JSON file is not a report; take it back out.
            if let Err(cleanup) = fs::remove_file(&json_path) {
                warn!(
                    file = %json_path.display(),
                    error = %cleanup,
                    "Failed to remove half-written report"
                );
            }
            return Err(e);
        }

        info!(markdown = %md_path.display(), json = %json_path.display(), "Report archived");
        Ok(ArchivedReport {
            stem,
            timestamp: report.generated_at,
            sequence,
            files: vec![md_path, json_path],
        })
    }

    fn free_stem(&self, ts: &DateTime<Utc>) -> Result<(String, u32)> {
        let base = format!("{}_{}", self.basename, ts.format(STAMP_FORMAT));
        for sequence in 1..=MAX_SEQUENCE {
            let stem = if sequence == 1 {
                base.clone()
            } else {
                format!("{base}-{sequence}")
            };
            let taken = ["md", "json"]
                .iter()
                .any(|ext| self.dir.join(format!("{stem}.{ext}")).exists());
            if !taken {
                return Ok((stem, sequence));
            }
        }
        Err(RefcheckError::ArchiveDir {
            path: self.dir.clone(),
            message: format!("more than {MAX_SEQUENCE} reports share timestamp {base}"),
        })
    }

    /// Complete archived reports, newest first. A missing directory is an
    /// empty archive.
    pub fn list(&self) -> Result<Vec<ArchivedReport>> {
        Ok(self.inventory()?.reports)
    }

    /// Every report-named stem in the directory, split by whether both
    /// renderings are present. Both lists are ordered newest first.
    pub fn inventory(&self) -> Result<ArchiveInventory> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(ArchiveInventory::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut by_stem: BTreeMap<String, ArchivedReport> = BTreeMap::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(caps) = self.name_pattern.captures(name) else {
                continue;
            };

            let Ok(naive) = NaiveDateTime::parse_from_str(&caps[1], STAMP_FORMAT) else {
                debug!(file = name, "Skipping report with unparseable timestamp");
                continue;
            };
            let sequence = caps
                .get(2)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(1);
            let stem = name
                .rsplit_once('.')
                .map(|(stem, _)| stem.to_string())
                .unwrap_or_else(|| name.to_string());

            by_stem
                .entry(stem.clone())
                .or_insert_with(|| ArchivedReport {
                    stem,
                    timestamp: naive.and_utc(),
                    sequence,
                    files: Vec::new(),
                })
                .files
                .push(entry.path());
        }

        let mut inventory = ArchiveInventory::default();
        for mut report in by_stem.into_values() {
            report.files.sort();
            if report.is_complete() {
                inventory.reports.push(report);
            } else {
                inventory.incomplete.push(report);
            }
        }
        for group in [&mut inventory.reports, &mut inventory.incomplete] {
            group.sort_by(|a, b| {
                (b.timestamp, b.sequence, &b.stem).cmp(&(a.timestamp, a.sequence, &a.stem))
            });
        }
        Ok(inventory)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

/// Write via a hidden temp file and rename into place.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = temp_path(path);
    let result = (|| -> io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    result.map_err(|source| {
        let _ = fs::remove_file(&tmp);
        RefcheckError::Archive {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RunSummary;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn report_at(ts: DateTime<Utc>) -> RunReport {
        RunReport {
            generated_at: ts,
            project_base_path: "/project".to_string(),
            time_window_hours: 48,
            scan_paths: vec![".".to_string()],
            reference_search_paths: vec![".".to_string()],
            summary: RunSummary::default(),
            files: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn ts(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, h, m, s).unwrap()
    }

    #[test]
    fn test_write_creates_timestamped_pair() {
        let temp = TempDir::new().unwrap();
        let archiver =
            ReportArchiver::new(temp.path().join("reports"), "file_reference_report").unwrap();

        let archived = archiver.write(&report_at(ts(9, 5, 7))).unwrap();
        assert_eq!(archived.stem, "file_reference_report_20261016_090507");
        assert!(archived.markdown_path().unwrap().exists());
        assert!(archived.json_path().unwrap().exists());

        let leftovers: Vec<_> = fs::read_dir(archiver.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_same_second_runs_do_not_collide() {
        let temp = TempDir::new().unwrap();
        let archiver = ReportArchiver::new(temp.path(), "r").unwrap();

        let first = archiver.write(&report_at(ts(10, 0, 0))).unwrap();
        let second = archiver.write(&report_at(ts(10, 0, 0))).unwrap();
        assert_eq!(first.stem, "r_20261016_100000");
        assert_eq!(second.stem, "r_20261016_100000-2");

        let listed = archiver.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].stem, second.stem);
        assert_eq!(listed[0].files.len(), 2);
    }

    #[test]
    fn test_list_orders_newest_first_and_ignores_foreign_files() {
        let temp = TempDir::new().unwrap();
        let archiver = ReportArchiver::new(temp.path(), "r").unwrap();
        archiver.write(&report_at(ts(8, 0, 0))).unwrap();
        archiver.write(&report_at(ts(12, 0, 0))).unwrap();
        archiver.write(&report_at(ts(10, 0, 0))).unwrap();

        fs::write(temp.path().join("notes.md"), "x").unwrap();
        fs::write(temp.path().join(".r_20261016_110000.md.tmp"), "partial").unwrap();
        fs::write(temp.path().join("r_20261399_000000.md"), "bad stamp").unwrap();
        fs::write(temp.path().join("other_20261016_110000.md"), "x").unwrap();

        let stems: Vec<String> = archiver.list().unwrap().into_iter().map(|r| r.stem).collect();
        assert_eq!(
            stems,
            vec!["r_20261016_120000", "r_20261016_100000", "r_20261016_080000"]
        );
    }

    #[test]
    fn test_failed_markdown_write_leaves_no_report() {
        let temp = TempDir::new().unwrap();
        let archiver = ReportArchiver::new(temp.path(), "r").unwrap();
        archiver.write(&report_at(ts(8, 0, 0))).unwrap();

        // A directory squatting on the temp name makes the Markdown write fail.
        fs::create_dir(temp.path().join(".r_20261016_090000.md.tmp")).unwrap();
        let err = archiver.write(&report_at(ts(9, 0, 0))).unwrap_err();
        assert!(matches!(err, RefcheckError::Archive { .. }), "got {err:?}");

        assert!(!temp.path().join("r_20261016_090000.json").exists());
        assert!(!temp.path().join("r_20261016_090000.md").exists());
        let stems: Vec<String> = archiver.list().unwrap().into_iter().map(|r| r.stem).collect();
        assert_eq!(stems, vec!["r_20261016_080000"]);
    }

    #[test]
    fn test_lone_rendering_is_not_a_report() {
        let temp = TempDir::new().unwrap();
        let archiver = ReportArchiver::new(temp.path(), "r").unwrap();
        archiver.write(&report_at(ts(8, 0, 0))).unwrap();
        fs::write(temp.path().join("r_20261016_090000.json"), "{}").unwrap();

        let listed = archiver.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].is_complete());

        let inventory = archiver.inventory().unwrap();
        assert_eq!(inventory.reports.len(), 1);
        assert_eq!(inventory.incomplete.len(), 1);
        assert_eq!(inventory.incomplete[0].stem, "r_20261016_090000");
        assert!(!inventory.incomplete[0].is_complete());
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let temp = TempDir::new().unwrap();
        let archiver = ReportArchiver::new(temp.path().join("nope"), "r").unwrap();
        assert!(archiver.list().unwrap().is_empty());
    }

    #[test]
    fn test_archive_dir_blocked_by_file() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("reports");
        fs::write(&blocker, "not a dir").unwrap();
        let archiver = ReportArchiver::new(&blocker, "r").unwrap();
        let err = archiver.write(&report_at(ts(1, 0, 0))).unwrap_err();
        assert!(matches!(err, RefcheckError::ArchiveDir { .. }), "got {err:?}");
    }

    #[test]
    fn test_temp_path_is_hidden() {
        assert_eq!(
            temp_path(Path::new("/a/r_1.md")),
            PathBuf::from("/a/.r_1.md.tmp")
        );
    }
}
