//! Reference matcher
//!
//! The search corpus is read once per run. Each scan target is then turned
//! into reference keys (see [`crate::rules`]) and every corpus line is tested
//! against them. Targets can be spread over a bounded pool of scoped
//! threads; results are put back in target order, so the output does not
//! depend on the worker count.

use crate::config::{has_extension, RefcheckConfig};
use crate::error::{RefcheckError, Result};
use crate::rules::{keys_for, MatcherRule};
use crate::scan_path::{canonicalize_scan_path, relative_display};
use crate::scanner::{TreeWalker, WalkItem};
use crate::types::{FileReport, MatchWarning, ReferenceMatch, ScanTarget};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Longest `matched_text` kept, in characters.
pub const MAX_MATCHED_TEXT: usize = 250;

/// Bytes inspected when deciding whether a file is binary.
const BINARY_SNIFF_BYTES: usize = 8 * 1024;

/// One readable text file from the search locations.
#[derive(Debug, Clone)]
struct CorpusFile {
    path: PathBuf,
    relative_path: String,
    lines: Vec<String>,
}

/// All searchable text, loaded once.
#[derive(Debug, Clone, Default)]
pub struct SearchCorpus {
    files: Vec<CorpusFile>,
}

impl SearchCorpus {
    /// Load every eligible file under the configured search paths.
    pub fn collect(config: &RefcheckConfig) -> Result<(Self, Vec<MatchWarning>)> {
        let walker = TreeWalker::from_config(config)?;
        let loader = CorpusLoader {
            walker: &walker,
            extensions: &config.reference_file_extensions,
            max_bytes: config.max_file_size_bytes(),
        };

        let start = Instant::now();
        let mut found: BTreeMap<PathBuf, CorpusFile> = BTreeMap::new();
        let mut warnings = Vec::new();

        for location in &config.reference_search_paths {
            let location = canonicalize_scan_path(location);
            if !location.exists() {
                warn!(path = %location.display(), "Reference search location does not exist");
                warnings.push(MatchWarning::SearchPathMissing {
                    path: location.display().to_string(),
                });
                continue;
            }

            if location.is_file() {
                let name = location
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if walker.is_pruned(&location) || !has_extension(&name, loader.extensions) {
                    debug!(path = %location.display(), "Search file excluded by filters");
                    warnings.push(MatchWarning::SearchFileSkipped {
                        path: location.display().to_string(),
                        reason: "excluded or not a searched extension".to_string(),
                    });
                    continue;
                }
                if let Some(file) = loader.load(&location, &mut warnings) {
                    found.entry(file.path.clone()).or_insert(file);
                }
                continue;
            }

            walker.walk(&location, |item| match item {
                WalkItem::Dir => {}
                WalkItem::Error { path, message } => {
                    warn!(path = %path, error = %message, "Unreadable search entry");
                    warnings.push(MatchWarning::SearchFileSkipped {
                        path,
                        reason: message,
                    });
                }
                WalkItem::File(entry) => {
                    if found.contains_key(entry.path()) {
                        return;
                    }
                    let name = entry.file_name().to_string_lossy();
                    if !has_extension(&name, loader.extensions) {
                        return;
                    }
                    if let Some(file) = loader.load(entry.path(), &mut warnings) {
                        found.insert(file.path.clone(), file);
                    }
                }
            });
        }

        let corpus = SearchCorpus {
            files: found.into_values().collect(),
        };
        info!(
            files = corpus.files.len(),
            lines = corpus.line_count(),
            skipped = warnings.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Search corpus loaded"
        );
        Ok((corpus, warnings))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.files.iter().map(|f| f.lines.len()).sum()
    }
}

struct CorpusLoader<'a> {
    walker: &'a TreeWalker,
    extensions: &'a [String],
    max_bytes: u64,
}

impl CorpusLoader<'_> {
    fn load(&self, path: &Path, warnings: &mut Vec<MatchWarning>) -> Option<CorpusFile> {
        let mut skip = |reason: String| {
            debug!(path = %path.display(), reason = %reason, "Skipping search file");
            warnings.push(MatchWarning::SearchFileSkipped {
                path: path.display().to_string(),
                reason,
            });
        };

        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > self.max_bytes => {
                skip(format!(
                    "larger than {} MB",
                    self.max_bytes / (1024 * 1024)
                ));
                return None;
            }
            Ok(_) => {}
            Err(e) => {
                skip(e.to_string());
                return None;
            }
        }

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                skip(e.to_string());
                return None;
            }
        };
        if is_binary(&bytes) {
            skip("binary content".to_string());
            return None;
        }

        let text = String::from_utf8_lossy(&bytes);
        Some(CorpusFile {
            path: path.to_path_buf(),
            relative_path: relative_display(self.walker.project_base(), path),
            lines: text.lines().map(str::to_string).collect(),
        })
    }
}

fn is_binary(bytes: &[u8]) -> bool {
    bytes.iter().take(BINARY_SNIFF_BYTES).any(|b| *b == 0)
}

/// Trim and cap a line for `matched_text`.
fn clip(line: &str) -> String {
    let trimmed = line.trim();
    match trimmed.char_indices().nth(MAX_MATCHED_TEXT) {
        Some((idx, _)) => trimmed[..idx].to_string(),
        None => trimmed.to_string(),
    }
}

/// Findings for a batch of targets.
#[derive(Debug, Default)]
pub struct MatchOutcome {
    /// One entry per target, in target order
    pub files: Vec<FileReport>,
    /// One orphan warning per unreferenced target, in target order
    pub warnings: Vec<MatchWarning>,
}

/// Finds references to scan targets inside a [`SearchCorpus`].
#[derive(Debug)]
pub struct ReferenceMatcher {
    rules: Vec<MatcherRule>,
    corpus: SearchCorpus,
    workers: usize,
    skip_self_references: bool,
    resolve_python_modules: bool,
}

impl ReferenceMatcher {
    pub fn new(config: &RefcheckConfig, corpus: SearchCorpus) -> Self {
        Self {
            rules: config.matcher_rules(),
            corpus,
            workers: config.effective_workers(),
            skip_self_references: config.skip_self_references,
            resolve_python_modules: config.resolve_python_modules,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Every corpus line that references `target`, ordered by source file then line.
    pub fn find_references(&self, target: &ScanTarget) -> Result<Vec<ReferenceMatch>> {
        let keys = keys_for(&self.rules, target, self.resolve_python_modules)?;
        if keys.is_empty() {
            debug!(file = %target.relative_path, "No reference keys for target");
            return Ok(Vec::new());
        }

        let mut matches = Vec::new();
        for file in &self.corpus.files {
            if self.skip_self_references && file.path == target.path {
                continue;
            }
            for (idx, line) in file.lines.iter().enumerate() {
                if let Some(key) = keys.iter().find(|k| k.is_match(line)) {
                    matches.push(ReferenceMatch {
                        source_file: file.relative_path.clone(),
                        target_file: target.relative_path.clone(),
                        line_number: idx + 1,
                        matched_text: clip(line),
                        matched_key: key.label().to_string(),
                    });
                }
            }
        }
        Ok(matches)
    }

    /// Match every target. `interrupt` is polled between targets.
    pub fn match_all(
        &self,
        targets: &[ScanTarget],
        interrupt: Option<&AtomicBool>,
    ) -> Result<MatchOutcome> {
        let start = Instant::now();
        let interrupted = || interrupt.is_some_and(|flag| flag.load(Ordering::SeqCst));
        let workers = self.workers.clamp(1, targets.len().max(1));

        info!(
            targets = targets.len(),
            corpus_files = self.corpus.len(),
            workers,
            "Matching references"
        );

        let mut results: Vec<(usize, Result<Vec<ReferenceMatch>>)> = if workers == 1 {
            let mut results = Vec::with_capacity(targets.len());
            for (idx, target) in targets.iter().enumerate() {
                if interrupted() {
                    break;
                }
                results.push((idx, self.find_references(target)));
            }
            results
        } else {
            let next = AtomicUsize::new(0);
            let next = &next;
            let interrupted = &interrupted;
            std::thread::scope(|scope| {
                let handles: Vec<_> = (0..workers)
                    .map(|_| {
                        scope.spawn(move || {
                            let mut local = Vec::new();
                            while !interrupted() {
                                let idx = next.fetch_add(1, Ordering::Relaxed);
                                let Some(target) = targets.get(idx) else {
                                    break;
                                };
                                local.push((idx, self.find_references(target)));
                            }
                            local
                        })
                    })
                    .collect();

                let mut all = Vec::with_capacity(targets.len());
                for handle in handles {
                    let local = handle.join().map_err(|_| RefcheckError::WorkerPanic)?;
                    all.extend(local);
                }
                Ok::<_, RefcheckError>(all)
            })?
        };

        if interrupted() {
            warn!(done = results.len(), total = targets.len(), "Matching interrupted");
            return Err(RefcheckError::Interrupted("matching"));
        }
        results.sort_by_key(|(idx, _)| *idx);

        let mut outcome = MatchOutcome::default();
        for (idx, found) in results {
            let target = &targets[idx];
            let report = FileReport::new(target, found?);
            if report.orphan {
                debug!(file = %target.relative_path, "Orphan");
                outcome.warnings.push(MatchWarning::Orphan {
                    file: target.relative_path.clone(),
                });
            }
            outcome.files.push(report);
        }

        info!(
            files = outcome.files.len(),
            orphans = outcome.warnings.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Matching complete"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::fs;
    use tempfile::TempDir;

    struct Project {
        _temp: TempDir,
        root: PathBuf,
    }

    impl Project {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let root = temp.path().canonicalize().unwrap();
            Self { _temp: temp, root }
        }

        fn write(&self, rel: &str, content: impl AsRef<[u8]>) -> PathBuf {
            let path = self.root.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            path
        }

        fn target(&self, rel: &str) -> ScanTarget {
            ScanTarget {
                path: self.root.join(rel),
                relative_path: rel.to_string(),
                modified: Utc::now(),
            }
        }

        fn config(&self) -> RefcheckConfig {
            RefcheckConfig::for_project(&self.root)
        }

        fn matcher(&self, config: &RefcheckConfig) -> ReferenceMatcher {
            let (corpus, _) = SearchCorpus::collect(config).unwrap();
            ReferenceMatcher::new(config, corpus)
        }
    }

    #[test]
    fn test_finds_reference_with_line_number() {
        let project = Project::new();
        project.write("a.md", "nothing points here\n");
        project.write("b.py", "print('hi')\n");
        project.write("docs/readme.md", "# Readme\n\nRun b.py nightly.\n");

        let config = project.config();
        let matcher = project.matcher(&config);
        let outcome = matcher
            .match_all(&[project.target("a.md"), project.target("b.py")], None)
            .unwrap();

        assert!(outcome.files[0].orphan);
        let hits = &outcome.files[1].references;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source_file, "docs/readme.md");
        assert_eq!(hits[0].line_number, 3);
        assert_eq!(hits[0].matched_text, "Run b.py nightly.");
        assert_eq!(hits[0].matched_key, "b.py");
        assert_eq!(
            outcome.warnings,
            vec![MatchWarning::Orphan {
                file: "a.md".to_string()
            }]
        );
    }

    #[test]
    fn test_self_reference_is_skipped() {
        let project = Project::new();
        project.write("notes.md", "see notes.md\n");

        let mut config = project.config();
        let matcher = project.matcher(&config);
        assert!(matcher.find_references(&project.target("notes.md")).unwrap().is_empty());

        config.skip_self_references = false;
        let matcher = project.matcher(&config);
        assert_eq!(matcher.find_references(&project.target("notes.md")).unwrap().len(), 1);
    }

    #[test]
    fn test_one_match_per_line_first_rule_wins() {
        let project = Project::new();
        project.write("tools/b.py", "");
        project.write("index.md", "tools/b.py and b.py on one line\n");

        let mut config = project.config();
        config.reference_rules = Some(vec![MatcherRule::RelativePath, MatcherRule::Filename]);
        let matcher = project.matcher(&config);
        let hits = matcher.find_references(&project.target("tools/b.py")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].matched_key, "tools/b.py");
    }

    #[test]
    fn test_corpus_skips_binary_large_and_foreign_files() {
        let project = Project::new();
        project.write("docs/ok.md", "mentions a.md\n");
        project.write("docs/blob.md", b"a.md\0\x01\x02".to_vec());
        project.write("docs/big.md", vec![b'x'; 1024 * 1024 + 10]);
        project.write("docs/image.png", "a.md");

        let mut config = project.config();
        config.max_file_size_mb = 1;
        let (corpus, warnings) = SearchCorpus::collect(&config).unwrap();

        assert_eq!(corpus.len(), 1);
        let reasons: Vec<String> = warnings
            .iter()
            .map(|w| match w {
                MatchWarning::SearchFileSkipped { reason, .. } => reason.clone(),
                other => panic!("unexpected warning {other:?}"),
            })
            .collect();
        assert_eq!(reasons, vec!["larger than 1 MB", "binary content"]);
    }

    #[test]
    fn test_missing_search_location_warns() {
        let project = Project::new();
        project.write("docs/index.md", "x\n");
        let single = project.write("CHANGELOG.txt", "a.md changed\n");

        let mut config = project.config();
        config.reference_search_paths = vec![project.root.join("gone"), single];
        let (corpus, warnings) = SearchCorpus::collect(&config).unwrap();
        assert_eq!(corpus.len(), 1);
        assert!(matches!(warnings[0], MatchWarning::SearchPathMissing { .. }));
    }

    #[test]
    fn test_single_file_location_obeys_filters() {
        let project = Project::new();
        project.write("a.md", "");
        let log = project.write("build.log", "mentions a.md here\n");
        let notes = project.write("notes.txt", "mentions a.md too\n");
        let vendored = project.write("vendor/list.md", "a.md\n");

        let mut config = project.config();
        config.exclude_patterns.push("vendor".to_string());
        config.reference_search_paths = vec![log.clone(), notes, vendored];
        let (corpus, warnings) = SearchCorpus::collect(&config).unwrap();
        assert_eq!(corpus.len(), 1);
        let skipped: Vec<&str> = warnings
            .iter()
            .filter_map(|w| match w {
                MatchWarning::SearchFileSkipped { path, .. } => Some(path.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(skipped.len(), 2);
        assert_eq!(skipped[0], log.display().to_string());

        let matcher = ReferenceMatcher::new(&config, corpus);
        let hits = matcher.find_references(&project.target("a.md")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].source_file, "notes.txt");
    }

    #[test]
    fn test_long_lines_are_clipped() {
        let line = format!("   {}   ", "é".repeat(400));
        let clipped = clip(&line);
        assert_eq!(clipped.chars().count(), MAX_MATCHED_TEXT);
        assert!(!clipped.starts_with(' '));
    }

    #[test]
    fn test_worker_count_does_not_change_output() {
        let project = Project::new();
        let mut targets = Vec::new();
        for i in 0..25 {
            let rel = format!("src/mod_{i:02}.py");
            project.write(&rel, "");
            targets.push(project.target(&rel));
        }
        for i in 0..10 {
            let body: String = (0..25)
                .filter(|n| n < &20 && (n + i) % 3 == 0)
                .map(|n| format!("uses mod_{n:02}.py\n"))
                .collect();
            project.write(&format!("docs/page_{i}.md"), body);
        }

        let config = project.config();
        let sequential = project.matcher(&config).with_workers(1);
        let parallel = project.matcher(&config).with_workers(6);

        let a = sequential.match_all(&targets, None).unwrap();
        let b = parallel.match_all(&targets, None).unwrap();
        assert_eq!(a.files, b.files);
        assert_eq!(a.warnings, b.warnings);
        assert!(a.files.iter().any(|f| f.orphan));
        assert!(a.files.iter().any(|f| f.reference_count > 1));
    }

    #[test]
    fn test_interrupt_aborts_matching() {
        let project = Project::new();
        project.write("a.md", "");
        let config = project.config();
        let matcher = project.matcher(&config);

        let flag = AtomicBool::new(true);
        let err = matcher
            .match_all(&[project.target("a.md")], Some(&flag))
            .unwrap_err();
        assert!(matches!(err, RefcheckError::Interrupted("matching")));
    }
}
