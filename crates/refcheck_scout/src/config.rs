//! Configuration for refcheck
//!
//! Loaded once from YAML. Relative paths are anchored at
//! `project_base_path`, which itself is anchored at the config file's
//! directory, so a config behaves the same regardless of the working
//! directory it is invoked from.

use crate::error::ConfigError;
use crate::patterns::ExcludeSet;
use crate::retention::RetentionPolicy;
use crate::rules::MatcherRule;
use crate::scan_path::{anchor, canonicalize_scan_path};
use refcheck_logging::LogLevel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "refcheck.yaml";

/// Directory names never worth scanning or searching.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] =
    &[".git", "node_modules", "__pycache__", "target", ".venv"];

/// Text formats searched for references.
pub const DEFAULT_REFERENCE_EXTENSIONS: &[&str] = &[
    ".md", ".txt", ".rst", ".py", ".rs", ".toml", ".yaml", ".yml", ".json", ".html",
];

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefcheckConfig {
    /// Root every relative path is resolved against
    #[serde(default = "default_project_base")]
    pub project_base_path: PathBuf,

    /// Directories scanned for recently modified files
    #[serde(default = "default_current_dir", alias = "scan_directories")]
    pub scan_paths: Vec<PathBuf>,

    /// Suffixes of files to scan; empty means any
    #[serde(default, alias = "target_file_extensions")]
    pub include_file_extensions: Vec<String>,

    /// Files or directories searched for references
    #[serde(default = "default_current_dir", alias = "reference_search_directories")]
    pub reference_search_paths: Vec<PathBuf>,

    /// Suffixes of text files searched for references
    #[serde(default = "default_reference_extensions")]
    pub reference_file_extensions: Vec<String>,

    /// Typed rules deriving reference keys
    #[serde(default)]
    pub reference_rules: Option<Vec<MatcherRule>>,

    /// Legacy `{filename}`-style templates, folded into template rules
    #[serde(default)]
    pub reference_patterns: Option<Vec<String>>,

    /// Glob patterns (names or project-relative paths) to skip
    #[serde(default = "default_exclude_patterns", alias = "excluded_directories")]
    pub exclude_patterns: Vec<String>,

    /// Modification window in hours, counted back from the run time
    #[serde(default = "default_time_window_hours")]
    pub time_window_hours: u64,

    /// Search files larger than this are skipped
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    #[serde(default = "default_true")]
    pub skip_self_references: bool,

    /// Matcher threads (0 = auto-detect CPU count)
    #[serde(default)]
    pub match_workers: usize,

    /// Where report pairs are archived
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,

    /// File name prefix for archived reports
    #[serde(default = "default_report_basename", alias = "output_filename")]
    pub report_basename: String,

    #[serde(default)]
    pub retention: RetentionPolicy,

    /// Older spelling of `retention.max_age_days`; zero or negative disables
    #[serde(default, skip_serializing)]
    pub report_retention_days: Option<i64>,

    /// Dotted module paths for `.py` files; the bare stem when off
    #[serde(default = "default_true")]
    pub resolve_python_modules: bool,

    #[serde(default)]
    pub log_level: LogLevel,

    /// Rolling log file directory; console only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_project_base() -> PathBuf {
    PathBuf::from(".")
}

fn default_current_dir() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}

fn default_reference_extensions() -> Vec<String> {
    DEFAULT_REFERENCE_EXTENSIONS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_exclude_patterns() -> Vec<String> {
    DEFAULT_EXCLUDE_PATTERNS.iter().map(|s| s.to_string()).collect()
}

fn default_time_window_hours() -> u64 {
    48
}

fn default_max_file_size_mb() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("reports")
}

fn default_report_basename() -> String {
    "file_reference_report".to_string()
}

impl Default for RefcheckConfig {
    fn default() -> Self {
        Self {
            project_base_path: default_project_base(),
            scan_paths: default_current_dir(),
            include_file_extensions: Vec::new(),
            reference_search_paths: default_current_dir(),
            reference_file_extensions: default_reference_extensions(),
            reference_rules: None,
            reference_patterns: None,
            exclude_patterns: default_exclude_patterns(),
            time_window_hours: default_time_window_hours(),
            max_file_size_mb: default_max_file_size_mb(),
            skip_self_references: true,
            match_workers: 0,
            archive_dir: default_archive_dir(),
            report_basename: default_report_basename(),
            retention: RetentionPolicy::default(),
            report_retention_days: None,
            resolve_python_modules: true,
            log_level: LogLevel::default(),
            log_dir: None,
        }
    }
}

impl RefcheckConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let config_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::from_yaml(&content, path, &config_dir)
    }

    /// Parse, anchor and validate YAML content.
    ///
    /// `origin` is only used in error messages.
    pub fn from_yaml(content: &str, origin: &Path, config_dir: &Path) -> Result<Self, ConfigError> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
                path: origin.to_path_buf(),
                source,
            })?;
        if !value.is_mapping() {
            return Err(ConfigError::NotMapping(origin.to_path_buf()));
        }

        let mut config: RefcheckConfig =
            serde_yaml::from_value(value).map_err(|source| ConfigError::Yaml {
                path: origin.to_path_buf(),
                source,
            })?;
        config.anchor_paths(config_dir);
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Defaults for a project rooted at `base`.
    pub fn for_project(base: &Path) -> Self {
        let mut config = Self::default();
        config.anchor_paths(base);
        config.normalize();
        config
    }

    fn anchor_paths(&mut self, config_dir: &Path) {
        let base = canonicalize_scan_path(&anchor(config_dir, &self.project_base_path));
        let rebase = |p: &PathBuf| canonicalize_scan_path(&anchor(&base, p));

        self.scan_paths = self.scan_paths.iter().map(rebase).collect();
        self.reference_search_paths = self.reference_search_paths.iter().map(rebase).collect();
        self.archive_dir = anchor(&base, &self.archive_dir);
        self.log_dir = self.log_dir.as_ref().map(|dir| anchor(&base, dir));
        self.project_base_path = base;
    }

    fn normalize(&mut self) {
        self.include_file_extensions = normalize_extensions(&self.include_file_extensions);
        self.reference_file_extensions = normalize_extensions(&self.reference_file_extensions);
        if let Some(days) = self.report_retention_days.take() {
            self.retention.max_age_days = Some(u64::try_from(days).unwrap_or(0));
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.time_window_hours > 24 * 365 * 50 {
            return Err(ConfigError::invalid(
                "time_window_hours",
                format!("{} is out of range (max 50 years)", self.time_window_hours),
            ));
        }
        if self.max_file_size_mb == 0 {
            return Err(ConfigError::invalid("max_file_size_mb", "must be at least 1"));
        }
        if self.report_basename.is_empty()
            || !self
                .report_basename
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::invalid(
                "report_basename",
                format!(
                    "'{}' may only contain letters, digits, '_' and '-'",
                    self.report_basename
                ),
            ));
        }
        self.retention
            .validate()
            .map_err(|message| ConfigError::invalid("retention", message))?;
        for rule in self.matcher_rules() {
            rule.validate().map_err(|message| {
                let message = format!("{} rule: {}", rule.name(), message);
                ConfigError::invalid("reference_rules", message)
            })?;
        }
        self.exclude_set()
            .map_err(|message| ConfigError::invalid("exclude_patterns", message))?;
        Ok(())
    }

    /// Rules in effect: declared rules, then legacy templates.
    pub fn matcher_rules(&self) -> Vec<MatcherRule> {
        let mut rules = match (&self.reference_rules, &self.reference_patterns) {
            (Some(rules), _) => rules.clone(),
            (None, Some(_)) => Vec::new(),
            (None, None) => vec![MatcherRule::Filename],
        };
        if let Some(patterns) = &self.reference_patterns {
            rules.extend(patterns.iter().map(|template| MatcherRule::Template {
                template: template.clone(),
            }));
        }
        rules
    }

    pub fn exclude_set(&self) -> Result<ExcludeSet, String> {
        ExcludeSet::new(&self.exclude_patterns)
    }

    pub fn effective_workers(&self) -> usize {
        if self.match_workers > 0 {
            self.match_workers
        } else {
            std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(4)
        }
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

/// Lowercase, dot-prefixed, de-duplicated suffixes.
pub fn normalize_extensions(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for ext in raw {
        let ext = ext.trim().trim_start_matches('*').to_lowercase();
        if ext.is_empty() || ext == "." {
            continue;
        }
        let ext = if ext.starts_with('.') {
            ext
        } else {
            format!(".{}", ext)
        };
        if !out.contains(&ext) {
            out.push(ext);
        }
    }
    out
}

/// True when `name` ends with one of `extensions` (any name if empty).
pub fn has_extension(name: &str, extensions: &[String]) -> bool {
    if extensions.is_empty() {
        return true;
    }
    let lower = name.to_lowercase();
    extensions.iter().any(|ext| lower.ends_with(ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(yaml: &str, dir: &Path) -> Result<RefcheckConfig, ConfigError> {
        RefcheckConfig::from_yaml(yaml, Path::new("refcheck.yaml"), dir)
    }

    #[test]
    fn test_defaults_from_empty_mapping() {
        let temp = TempDir::new().unwrap();
        let config = parse("{}", temp.path()).unwrap();
        let base = temp.path().canonicalize().unwrap();

        assert_eq!(config.project_base_path, base);
        assert_eq!(config.scan_paths, vec![base.clone()]);
        assert_eq!(config.time_window_hours, 48);
        assert_eq!(config.archive_dir, base.join("reports"));
        assert_eq!(config.retention.max_age_days, Some(30));
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.matcher_rules(), vec![MatcherRule::Filename]);
        assert!(config.include_file_extensions.is_empty());
    }

    #[test]
    fn test_full_config() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("docs")).unwrap();
        let yaml = r#"
scan_paths: [docs, missing]
include_file_extensions: [MD, ".py"]
reference_search_paths: [docs]
time_window_hours: 6
retention:
  max_reports: 3
log_level: DEBUG
reference_rules:
  - kind: filename
  - kind: module_name
"#;
        let config = parse(yaml, temp.path()).unwrap();
        let base = temp.path().canonicalize().unwrap();
        assert_eq!(config.include_file_extensions, vec![".md", ".py"]);
        assert_eq!(config.scan_paths[0], base.join("docs"));
        assert_eq!(config.scan_paths[1], base.join("missing"));
        assert_eq!(config.retention.max_reports, Some(3));
        assert_eq!(config.retention.max_age_days, None);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.matcher_rules().len(), 2);
    }

    #[test]
    fn test_legacy_keys_are_accepted() {
        let temp = TempDir::new().unwrap();
        let yaml = r#"
scan_directories: ["."]
target_file_extensions: [".md"]
reference_search_directories: ["."]
reference_patterns: ["{filename}", "{module_name}"]
output_filename: xref
excluded_directories: [build]
report_retention_days: 7
resolve_python_modules: false
"#;
        let config = parse(yaml, temp.path()).unwrap();
        assert_eq!(config.report_basename, "xref");
        assert_eq!(config.exclude_patterns, vec!["build"]);
        assert_eq!(config.retention.max_age_days, Some(7));
        assert_eq!(config.report_retention_days, None);
        assert!(!config.resolve_python_modules);
        assert_eq!(
            config.matcher_rules(),
            vec![
                MatcherRule::Template {
                    template: "{filename}".to_string()
                },
                MatcherRule::Template {
                    template: "{module_name}".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_legacy_retention_days_disable() {
        let config = parse("report_retention_days: -1", Path::new(".")).unwrap();
        assert_eq!(config.retention.max_age_days, Some(0));
        assert!(config.retention.is_disabled());

        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(!yaml.contains("report_retention_days"));
    }

    #[test]
    fn test_malformed_yaml() {
        let err = parse("scan_paths: [unterminated", Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }), "got {err:?}");
    }

    #[test]
    fn test_non_mapping_root() {
        let err = parse("- a\n- b\n", Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::NotMapping(_)));
        let err = parse("", Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::NotMapping(_)));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = parse("scan_pathz: [.]", Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("scan_pathz"), "got {err}");
    }

    #[test]
    fn test_validation_errors() {
        let dir = Path::new(".");
        let cases = [
            ("retention: {max_reports: 0}", "retention"),
            ("max_file_size_mb: 0", "max_file_size_mb"),
            ("report_basename: 'bad name'", "report_basename"),
            ("reference_rules: [{kind: regex, pattern: '('}]", "reference_rules"),
            ("exclude_patterns: ['[']", "exclude_patterns"),
            ("log_level: chatty", "log level"),
        ];
        for (yaml, key) in cases {
            let err = parse(yaml, dir).unwrap_err();
            assert!(err.to_string().contains(key), "{yaml}: {err}");
        }
    }

    #[test]
    fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let err = RefcheckConfig::load(&temp.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_anchors_at_config_dir() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("refcheck.yaml");
        std::fs::write(&path, "archive_dir: out/reports\n").unwrap();
        let config = RefcheckConfig::load(&path).unwrap();
        assert_eq!(
            config.archive_dir,
            temp.path().canonicalize().unwrap().join("out/reports")
        );
    }

    #[test]
    fn test_normalize_extensions() {
        let raw = vec!["MD".to_string(), "*.py".to_string(), ".md".to_string(), "".to_string()];
        assert_eq!(normalize_extensions(&raw), vec![".md", ".py"]);
        assert!(has_extension("README.MD", &[".md".to_string()]));
        assert!(has_extension("anything", &[]));
        assert!(!has_extension("a.mdx", &[".md".to_string()]));
    }
}
