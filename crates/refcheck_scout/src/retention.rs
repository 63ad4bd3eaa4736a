//! Retention sweep over archived report pairs
//!
//! Deletion is fail-soft: a file that cannot be removed becomes a
//! [`RetentionWarning`] and the sweep moves on.

use crate::archive::{ArchivedReport, ReportArchiver};
use crate::types::RetentionWarning;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// How many / how old archived reports may be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionPolicy {
    /// Delete reports older than this many days (0 disables)
    #[serde(default)]
    pub max_age_days: Option<u64>,
    /// Keep at most this many of the newest reports
    #[serde(default)]
    pub max_reports: Option<usize>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_age_days: Some(30),
            max_reports: None,
        }
    }
}

impl RetentionPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_reports == Some(0) {
            return Err("max_reports must be at least 1".to_string());
        }
        if let Some(days) = self.max_age_days {
            if days > 365 * 100 {
                return Err(format!("max_age_days {} is out of range", days));
            }
        }
        Ok(())
    }

    pub fn is_disabled(&self) -> bool {
        self.max_age_days.unwrap_or(0) == 0 && self.max_reports.is_none()
    }

    fn age_cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.max_age_days {
            Some(days) if days > 0 => Some(now - Duration::days(days as i64)),
            _ => None,
        }
    }
}

/// What a sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetentionOutcome {
    /// Complete report stems found before the sweep
    pub examined: usize,
    /// Stems whose files were all removed
    pub deleted: Vec<String>,
    /// Complete stems still present after the sweep
    pub kept: usize,
    /// Leftovers of aborted writes that were cleared out
    pub incomplete_removed: Vec<String>,
    pub warnings: Vec<RetentionWarning>,
}

/// Pick the reports a policy expires.
///
/// `reports` must be ordered newest first, as [`ReportArchiver::list`]
/// returns them. The `protect` stem is never selected but does take up one
/// of the `max_reports` slots, so at most `max_reports` reports survive even
/// when an archived report claims to be newer than the protected one.
pub fn select_expired<'a>(
    reports: &'a [ArchivedReport],
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
    protect: Option<&str>,
) -> Vec<&'a ArchivedReport> {
    let cutoff = policy.age_cutoff(now);
    let is_protected = |report: &ArchivedReport| Some(report.stem.as_str()) == protect;
    let mut slots_used = reports.iter().filter(|r| is_protected(*r)).count();

    let mut expired = Vec::new();
    for report in reports.iter().filter(|r| !is_protected(*r)) {
        let too_old = cutoff.is_some_and(|cutoff| report.timestamp < cutoff);
        let over_count = policy.max_reports.is_some_and(|max| slots_used >= max);
        if too_old || over_count {
            expired.push(report);
        } else {
            slots_used += 1;
        }
    }
    expired
}

/// Remove every file of `report`; failures become warnings.
fn remove_files(report: &ArchivedReport, warnings: &mut Vec<RetentionWarning>) -> bool {
    let mut removed_all = true;
    for file in &report.files {
        match std::fs::remove_file(file) {
            Ok(()) => debug!(file = %file.display(), "Deleted report file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                removed_all = false;
                warn!(file = %file.display(), error = %e, "Failed to delete report file");
                warnings.push(RetentionWarning {
                    path: file.display().to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }
    removed_all
}

/// Apply `policy` to the archive.
///
/// Half-written stems older than `now` are cleared as well; they never count
/// toward `max_reports`.
pub fn sweep(
    archiver: &ReportArchiver,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
    protect: Option<&str>,
) -> RetentionOutcome {
    let mut outcome = RetentionOutcome::default();

    if policy.is_disabled() {
        info!("Report retention is disabled");
        return outcome;
    }

    let inventory = match archiver.inventory() {
        Ok(inventory) => inventory,
        Err(e) => {
            warn!(dir = %archiver.dir().display(), error = %e, "Failed to list archived reports");
            outcome.warnings.push(RetentionWarning {
                path: archiver.dir().display().to_string(),
                reason: e.to_string(),
            });
            return outcome;
        }
    };
    outcome.examined = inventory.reports.len();

    for report in select_expired(&inventory.reports, policy, now, protect) {
        if remove_files(report, &mut outcome.warnings) {
            outcome.deleted.push(report.stem.clone());
        }
    }
    outcome.kept = outcome.examined - outcome.deleted.len();

    for partial in &inventory.incomplete {
        if Some(partial.stem.as_str()) == protect || partial.timestamp >= now {
            continue;
        }
        if remove_files(partial, &mut outcome.warnings) {
            outcome.incomplete_removed.push(partial.stem.clone());
        }
    }

    if outcome.deleted.is_empty() {
        info!(kept = outcome.kept, "No old reports to delete");
    } else {
        info!(
            deleted = outcome.deleted.len(),
            kept = outcome.kept,
            incomplete = outcome.incomplete_removed.len(),
            "Retention sweep complete"
        );
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn report(stem: &str, ts: DateTime<Utc>) -> ArchivedReport {
        ArchivedReport {
            stem: stem.to_string(),
            timestamp: ts,
            sequence: 1,
            files: vec![PathBuf::from(format!("{stem}.md"))],
        }
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, d, 12, 0, 0).unwrap()
    }

    fn stems(selected: Vec<&ArchivedReport>) -> Vec<String> {
        selected.into_iter().map(|r| r.stem.clone()).collect()
    }

    #[test]
    fn test_count_policy_keeps_newest() {
        let reports = vec![
            report("r4", day(4)),
            report("r3", day(3)),
            report("r2", day(2)),
            report("r1", day(1)),
        ];
        let policy = RetentionPolicy {
            max_age_days: None,
            max_reports: Some(2),
        };
        assert_eq!(stems(select_expired(&reports, &policy, day(5), None)), vec!["r2", "r1"]);
    }

    #[test]
    fn test_age_policy() {
        let reports = vec![report("new", day(14)), report("old", day(1))];
        let policy = RetentionPolicy {
            max_age_days: Some(7),
            max_reports: None,
        };
        assert_eq!(stems(select_expired(&reports, &policy, day(15), None)), vec!["old"]);
    }

    #[test]
    fn test_policies_combine() {
        let reports = vec![report("a", day(10)), report("b", day(9)), report("c", day(1))];
        let policy = RetentionPolicy {
            max_age_days: Some(5),
            max_reports: Some(1),
        };
        assert_eq!(stems(select_expired(&reports, &policy, day(10), None)), vec!["b", "c"]);
    }

    #[test]
    fn test_protected_stem_survives() {
        let reports = vec![report("old", day(1))];
        let policy = RetentionPolicy {
            max_age_days: Some(1),
            max_reports: None,
        };
        assert!(select_expired(&reports, &policy, day(20), Some("old")).is_empty());
    }

    #[test]
    fn test_zero_age_disables() {
        let policy = RetentionPolicy {
            max_age_days: Some(0),
            max_reports: None,
        };
        assert!(policy.is_disabled());
        let reports = vec![report("old", day(1))];
        assert!(select_expired(&reports, &policy, day(30), None).is_empty());
    }

    #[test]
    fn test_validate() {
        assert!(RetentionPolicy::default().validate().is_ok());
        assert!(RetentionPolicy {
            max_age_days: None,
            max_reports: Some(0)
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_protected_stem_takes_a_slot() {
        // An archived report stamped after the current run
        let reports = vec![
            report("future", day(12)),
            report("current", day(10)),
            report("older", day(9)),
        ];
        let policy = RetentionPolicy {
            max_age_days: None,
            max_reports: Some(1),
        };
        assert_eq!(
            stems(select_expired(&reports, &policy, day(10), Some("current"))),
            vec!["future", "older"]
        );
    }

    fn stamp(d: u32) -> String {
        format!("r_202610{:02}_120000", d)
    }

    fn write_pair(dir: &Path, d: u32) {
        fs::write(dir.join(format!("{}.md", stamp(d))), "# report").unwrap();
        fs::write(dir.join(format!("{}.json", stamp(d))), "{}").unwrap();
    }

    #[test]
    fn test_sweep_continues_past_undeletable_report() {
        let temp = TempDir::new().unwrap();
        for d in [1, 2, 3, 20] {
            write_pair(temp.path(), d);
        }
        // Swap day 2's Markdown file for a non-empty directory.
        let stuck = temp.path().join(format!("{}.md", stamp(2)));
        fs::remove_file(&stuck).unwrap();
        fs::create_dir(&stuck).unwrap();
        fs::write(stuck.join("keep"), "x").unwrap();

        let archiver = ReportArchiver::new(temp.path(), "r").unwrap();
        let policy = RetentionPolicy {
            max_age_days: Some(7),
            max_reports: None,
        };
        let outcome = sweep(&archiver, &policy, day(20), None);

        assert_eq!(outcome.examined, 4);
        assert_eq!(outcome.deleted, vec![stamp(3), stamp(1)]);
        assert_eq!(outcome.kept, 2);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].path, stuck.display().to_string());
        assert!(stuck.is_dir());
        assert!(!temp.path().join(format!("{}.json", stamp(2))).exists());
        assert!(temp.path().join(format!("{}.md", stamp(20))).exists());
    }

    #[test]
    fn test_sweep_warns_when_archive_unreadable() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("reports");
        fs::write(&blocker, "not a dir").unwrap();

        let archiver = ReportArchiver::new(&blocker, "r").unwrap();
        let outcome = sweep(&archiver, &RetentionPolicy::default(), day(20), None);
        assert_eq!(outcome.examined, 0);
        assert!(outcome.deleted.is_empty());
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].path, blocker.display().to_string());
    }

    #[test]
    fn test_sweep_ignores_and_clears_half_written_stems() {
        let temp = TempDir::new().unwrap();
        for d in [1, 2, 3] {
            write_pair(temp.path(), d);
        }
        let lone = temp.path().join(format!("{}.json", stamp(4)));
        fs::write(&lone, "{}").unwrap();

        let archiver = ReportArchiver::new(temp.path(), "r").unwrap();
        let policy = RetentionPolicy {
            max_age_days: None,
            max_reports: Some(2),
        };
        let outcome = sweep(&archiver, &policy, day(10), None);

        assert_eq!(outcome.deleted, vec![stamp(1)]);
        assert_eq!(outcome.incomplete_removed, vec![stamp(4)]);
        assert!(!lone.exists());
        let remaining: Vec<String> =
            archiver.list().unwrap().into_iter().map(|r| r.stem).collect();
        assert_eq!(remaining, vec![stamp(3), stamp(2)]);
    }
}
