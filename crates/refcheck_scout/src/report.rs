//! Report assembly and rendering
//!
//! The Markdown and JSON renderings carry the same facts. JSON is the
//! serde form of [`RunReport`]; Markdown prints every field of it.

use crate::config::RefcheckConfig;
use crate::scan_path::relative_display;
use crate::types::{whole_seconds, FileReport, RunReport, RunSummary, RunWarning};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt::Write as _;

/// Assemble a report from per-file findings and collected warnings.
pub fn build_report(
    config: &RefcheckConfig,
    generated_at: DateTime<Utc>,
    scan_paths: &[std::path::PathBuf],
    files: Vec<FileReport>,
    warnings: Vec<RunWarning>,
) -> RunReport {
    let base = &config.project_base_path;
    let display = |paths: &[std::path::PathBuf]| -> Vec<String> {
        paths
            .iter()
            .map(|p| match relative_display(base, p) {
                rel if rel.is_empty() => ".".to_string(),
                rel => rel,
            })
            .collect()
    };

    RunReport {
        generated_at: whole_seconds(generated_at),
        project_base_path: base.display().to_string(),
        time_window_hours: config.time_window_hours,
        scan_paths: display(scan_paths),
        reference_search_paths: display(&config.reference_search_paths),
        summary: RunSummary::from_files(&files, warnings.len()),
        files,
        warnings,
    }
}

fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Inline code span that survives backticks in `text`.
fn code(text: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for ch in text.chars() {
        if ch == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    let fence = "`".repeat(longest + 1);
    if longest > 0 {
        format!("{fence} {text} {fence}")
    } else {
        format!("{fence}{text}{fence}")
    }
}

fn code_list(items: &[String]) -> String {
    if items.is_empty() {
        return "(none)".to_string();
    }
    items.iter().map(|i| code(i)).collect::<Vec<_>>().join(", ")
}

/// Render the human-readable report.
pub fn render_markdown(report: &RunReport) -> String {
    let mut out = String::new();
    let s = &report.summary;

    // Writing to a String cannot fail.
    let _ = writeln!(out, "# File Reference Report");
    let _ = writeln!(out);
    let _ = writeln!(out, "- **Generated At:** {}", timestamp(&report.generated_at));
    let _ = writeln!(out, "- **Project Base Path:** {}", code(&report.project_base_path));
    let _ = writeln!(out, "- **Time Window (Hours):** {}", report.time_window_hours);
    let _ = writeln!(out, "- **Scan Paths:** {}", code_list(&report.scan_paths));
    let _ = writeln!(
        out,
        "- **Reference Search Paths:** {}",
        code_list(&report.reference_search_paths)
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "## Summary");
    let _ = writeln!(out);
    let _ = writeln!(out, "| Metric | Count |");
    let _ = writeln!(out, "|---|---|");
    let _ = writeln!(out, "| Files scanned | {} |", s.files_scanned);
    let _ = writeln!(out, "| Files referenced | {} |", s.files_referenced);
    let _ = writeln!(out, "| Orphans | {} |", s.orphans);
    let _ = writeln!(out, "| References found | {} |", s.references_found);
    let _ = writeln!(out, "| Warnings | {} |", s.warnings);
    let _ = writeln!(out, "| Errors | {} |", s.errors);
    let _ = writeln!(out);

    let _ = writeln!(out, "## Files");
    let _ = writeln!(out);
    if report.files.is_empty() {
        let _ = writeln!(out, "No recently modified files matched the scan criteria.");
        let _ = writeln!(out);
    }
    for file in &report.files {
        let _ = writeln!(out, "### {}", code(&file.path));
        let _ = writeln!(out);
        let _ = writeln!(out, "- **Last Modified:** {}", timestamp(&file.last_modified));
        if file.orphan {
            let _ = writeln!(
                out,
                "- **WARNING:** No references found (0). File may be undocumented or orphaned."
            );
        } else {
            let _ = writeln!(out, "- **References ({}):**", file.reference_count);
            for hit in &file.references {
                let _ = writeln!(
                    out,
                    "  - {} line {} (key {}): {}",
                    code(&hit.source_file),
                    hit.line_number,
                    code(&hit.matched_key),
                    code(&hit.matched_text)
                );
            }
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "## Warnings");
    let _ = writeln!(out);
    if report.warnings.is_empty() {
        let _ = writeln!(out, "None.");
    }
    for warning in &report.warnings {
        let _ = writeln!(out, "- [{}] {}", warning.category(), warning);
    }

    out
}

/// Render the machine-readable report.
pub fn render_json(report: &RunReport) -> serde_json::Result<String> {
    let mut json = serde_json::to_string_pretty(report)?;
    json.push('\n');
    Ok(json)
}
