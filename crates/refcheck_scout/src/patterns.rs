//! Glob-based exclusion matching shared by the scanner and the matcher.

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Paths excluded from both scanning and reference searching.
///
/// A pattern matches either an entry name (`node_modules`, `*.log`) or a
/// project-relative path (`docs/build`, `reports/**`). A directory match
/// prunes everything below it.
#[derive(Debug, Clone)]
pub struct ExcludeSet {
    names: GlobSet,
    paths: GlobSet,
}

impl ExcludeSet {
    pub fn new(patterns: &[String]) -> Result<Self, String> {
        let mut names = GlobSetBuilder::new();
        let mut paths = GlobSetBuilder::new();
        for raw in patterns {
            let trimmed = raw.trim().trim_end_matches('/');
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.contains('/') {
                paths.add(build_glob(trimmed.trim_start_matches('/'))?);
            } else {
                names.add(build_glob(trimmed)?);
            }
        }
        Ok(Self {
            names: names.build().map_err(|e| e.to_string())?,
            paths: paths.build().map_err(|e| e.to_string())?,
        })
    }

    /// `rel_path` uses forward slashes and is relative to the project base.
    pub fn is_excluded(&self, name: &str, rel_path: &str) -> bool {
        if self.names.is_match(name) {
            return true;
        }
        let rel = rel_path.trim_start_matches('/');
        !rel.is_empty() && self.paths.is_match(Path::new(rel))
    }
}

fn build_glob(pattern: &str) -> Result<Glob, String> {
    GlobBuilder::new(pattern)
        .case_insensitive(true)
        .literal_separator(true)
        .build()
        .map_err(|e| format!("Invalid pattern '{}': {}", pattern, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclude_by_name_and_relative_path() {
        let set = ExcludeSet::new(&[
            "node_modules".to_string(),
            "*.log".to_string(),
            "docs/build".to_string(),
            "reports/**".to_string(),
        ])
        .unwrap();

        assert!(set.is_excluded("node_modules", "web/node_modules"));
        assert!(set.is_excluded("debug.log", "debug.log"));
        assert!(set.is_excluded("build", "docs/build"));
        assert!(set.is_excluded("x.md", "reports/2026/x.md"));
        assert!(!set.is_excluded("build", "src/build"));
        assert!(!set.is_excluded("readme.md", "docs/readme.md"));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = ExcludeSet::new(&["[".to_string()]).unwrap_err();
        assert!(err.contains("Invalid pattern"));
    }

    #[test]
    fn empty_set_excludes_nothing() {
        let set = ExcludeSet::new(&[]).unwrap();
        assert!(!set.is_excluded(".git", ".git"));
    }
}
