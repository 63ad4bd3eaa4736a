//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use refcheck_scout::{ConfigError, PipelineError, RefcheckError, Stage};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// An error with helpful context and suggestions
#[derive(Debug, Serialize)]
pub struct HelpfulError {
    /// The main error message
    pub message: String,
    /// Additional context about what was happening
    pub context: Option<String>,
    /// Suggestions for how to fix the error
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    /// Create a new helpful error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Add a suggestion for fixing the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add multiple suggestions
    pub fn with_suggestions(
        mut self,
        suggestions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    /// Configuration could not be loaded or validated
    pub fn config(err: &ConfigError) -> Self {
        match err {
            ConfigError::NotFound(path) => Self::config_not_found(path),
            ConfigError::Read { path, source } => {
                Self::new(format!("Cannot read config: {}", path.display()))
                    .with_context(source.to_string())
                    .with_suggestion(format!(
                        "TRY: Check file permissions: ls -la {}",
                        path.display()
                    ))
            }
            ConfigError::Yaml { path, source } => {
                Self::new(format!("Invalid YAML in {}", path.display()))
                    .with_context(source.to_string())
                    .with_suggestions([
                        "TRY: Check indentation and quoting around the reported line".to_string(),
                        "TRY: Compare key names with `refcheck config` output".to_string(),
                    ])
            }
            ConfigError::NotMapping(path) => {
                Self::new(format!("Config must be a mapping: {}", path.display()))
                    .with_context("The top level of the file is a list, scalar or empty")
                    .with_suggestion("TRY: Start the file with keys such as `scan_paths:`")
            }
            ConfigError::Invalid { key, message } => {
                Self::new(format!("Invalid config value for '{}'", key))
                    .with_context(message.clone())
                    .with_suggestion("TRY: Run `refcheck config` with a minimal file to see defaults")
            }
        }
    }

    /// Explicit config path does not exist
    pub fn config_not_found(path: &Path) -> Self {
        Self::new(format!("Config file not found: {}", path.display()))
            .with_context("The --config path (or REFCHECK_CONFIG) does not exist")
            .with_suggestions([
                format!("TRY: Check that the file exists: ls -la {}", path.display()),
                "TRY: Omit --config to use ./refcheck.yaml or built-in defaults".to_string(),
            ])
    }

    /// A pipeline stage failed
    pub fn stage_failed(err: &PipelineError) -> Self {
        let base = Self::new(format!("Run failed during {}", err.stage))
            .with_context(err.source.to_string());
        match (&err.stage, &err.source) {
            (_, RefcheckError::Interrupted(_)) => {
                base.with_suggestion("TRY: Re-run; reports already archived are untouched")
            }
            (Stage::Archiving, RefcheckError::ArchiveDir { path, .. })
            | (Stage::Archiving, RefcheckError::Archive { path, .. }) => base.with_suggestions([
                format!("TRY: Check write permissions: ls -la {}", path.display()),
                "TRY: Write reports elsewhere with --output-dir DIR".to_string(),
            ]),
            _ => base.with_suggestion("TRY: Re-run with -v for debug logging"),
        }
    }

    /// Logging could not be set up
    pub fn logging_failed(log_dir: Option<&Path>, reason: &str) -> Self {
        let base = Self::new("Failed to initialize logging").with_context(reason.to_string());
        match log_dir {
            Some(dir) => base.with_suggestion(format!(
                "TRY: Check that log_dir is writable: ls -la {}",
                dir.display()
            )),
            None => base,
        }
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

/// Print an error as a single JSON document on stdout.
pub fn print_json_error(err: &anyhow::Error) {
    let body = match err.downcast_ref::<HelpfulError>() {
        Some(helpful) => serde_json::json!({ "error": helpful }),
        None => serde_json::json!({
            "error": {
                "message": format!("{:#}", err),
                "context": null,
                "suggestions": [],
            }
        }),
    };
    match serde_json::to_string_pretty(&body) {
        Ok(text) => println!("{}", text),
        Err(_) => eprintln!("{:?}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refcheck_scout::RunSummary;
    use std::path::PathBuf;

    #[test]
    fn test_helpful_error_display() {
        let err = HelpfulError::new("Something went wrong")
            .with_context("While processing data")
            .with_suggestion("Try again");

        let display = format!("{}", err);
        assert!(display.contains("ERROR: Something went wrong"));
        assert!(display.contains("CONTEXT: While processing data"));
        assert!(display.contains("Try again"));
    }

    #[test]
    fn test_config_not_found() {
        let path = PathBuf::from("/nonexistent/refcheck.yaml");
        let err = HelpfulError::config(&ConfigError::NotFound(path));

        let display = format!("{}", err);
        assert!(display.contains("/nonexistent/refcheck.yaml"));
        assert!(display.contains("TRY:"));
    }

    #[test]
    fn test_invalid_value_names_key() {
        let err =
            HelpfulError::config(&ConfigError::invalid("max_file_size_mb", "must be at least 1"));
        assert!(err.message.contains("max_file_size_mb"));
        assert_eq!(err.context.as_deref(), Some("must be at least 1"));
    }

    #[test]
    fn test_archive_failure_suggests_output_dir() {
        let err = PipelineError {
            stage: Stage::Archiving,
            summary: RunSummary::default(),
            source: RefcheckError::ArchiveDir {
                path: PathBuf::from("/ro/reports"),
                message: "read-only file system".to_string(),
            },
        };
        let helpful = HelpfulError::stage_failed(&err);
        assert_eq!(helpful.message, "Run failed during archiving");
        assert!(helpful.suggestions.iter().any(|s| s.contains("--output-dir")));
    }
}
