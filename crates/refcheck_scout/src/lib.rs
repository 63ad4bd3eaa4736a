//! Refcheck Scout - Recent File & Reference Discovery
//!
//! Scout finds files modified in a recent time window, searches project text
//! for mentions of each one, and archives a Markdown + JSON report of what it
//! found. Files nobody mentions are flagged as orphans.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌───────────────┐
//! │   Scanner   │     │   Matcher   │     │   Report    │     │   Archive     │
//! │ (mtime +    │────▶│ (rules →    │────▶│ (Markdown + │────▶│ (timestamped  │
//! │  suffix)    │     │  keys)      │     │    JSON)    │     │  + retention) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └───────────────┘
//! ```
//!
//! # Core Concepts
//!
//! - **ScanTarget**: A file modified inside the time window
//! - **MatcherRule**: How reference keys are derived for a target
//! - **ReferenceMatch**: One line of one searched file that mentions a target
//! - **RunReport**: Everything a run found, rendered twice and archived
//! - **Pipeline**: Runs the stages in order and names the one that failed

pub mod archive;
pub mod config;
pub mod error;
pub mod matcher;
pub mod patterns;
pub mod pipeline;
pub mod report;
pub mod retention;
pub mod rules;
pub mod scan_path;
pub mod scanner;
pub mod types;

// Re-exports for convenience
pub use archive::{ArchiveInventory, ArchivedReport, ReportArchiver};
pub use config::{RefcheckConfig, DEFAULT_CONFIG_FILE};
pub use error::{ConfigError, RefcheckError, Result};
pub use matcher::{ReferenceMatcher, SearchCorpus};
pub use pipeline::{Pipeline, PipelineError, RunOptions, RunOutcome, Stage};
pub use retention::{RetentionOutcome, RetentionPolicy};
pub use rules::MatcherRule;
pub use scanner::{ScanResult, ScanStats, Scanner, TimeWindow};
pub use types::{
    FileReport, MatchWarning, ReferenceMatch, RetentionWarning, RunReport, RunSummary,
    RunWarning, ScanTarget, ScanWarning,
};
