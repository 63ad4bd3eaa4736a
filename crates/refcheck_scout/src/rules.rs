//! Typed reference rules
//!
//! Each rule turns a scan target into zero or more [`ReferenceKey`]s. Keys
//! are what the matcher looks for in searched files.

use crate::error::{RefcheckError, Result};
use crate::types::ScanTarget;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How to derive reference keys for a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatcherRule {
    /// Bare file name, e.g. `b.py`
    Filename,
    /// Project-relative path, e.g. `src/tools/b.py`
    RelativePath,
    /// Dotted Python module path, e.g. `src.tools.b` (Python files only)
    ModuleName,
    /// Literal with `{filename}`, `{stem}`, `{filepath}`, `{module_name}` placeholders
    Template { template: String },
    /// Regex with the same placeholders, substituted escaped
    Regex { pattern: String },
    /// Extra names that refer to one specific file
    Alias { target: String, names: Vec<String> },
}

impl MatcherRule {
    pub fn name(&self) -> &'static str {
        match self {
            MatcherRule::Filename => "filename",
            MatcherRule::RelativePath => "relative_path",
            MatcherRule::ModuleName => "module_name",
            MatcherRule::Template { .. } => "template",
            MatcherRule::Regex { .. } => "regex",
            MatcherRule::Alias { .. } => "alias",
        }
    }

    /// Check the rule compiles against a representative target.
    pub fn validate(&self) -> std::result::Result<(), String> {
        match self {
            MatcherRule::Template { template } if template.trim().is_empty() => {
                Err("template must not be empty".to_string())
            }
            MatcherRule::Regex { pattern } => {
                let sample = KeyContext {
                    filename: "sample.py".to_string(),
                    stem: "sample".to_string(),
                    filepath: "pkg/sample.py".to_string(),
                    module_name: "pkg.sample".to_string(),
                };
                Regex::new(&sample.substitute(pattern, true))
                    .map(|_| ())
                    .map_err(|e| format!("invalid regex '{}': {}", pattern, e))
            }
            MatcherRule::Alias { target, names } => {
                if target.trim().is_empty() {
                    Err("alias target must not be empty".to_string())
                } else if names.iter().all(|n| n.trim().is_empty()) {
                    Err(format!("alias for '{}' declares no names", target))
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }
}

/// Something to search for.
#[derive(Debug, Clone)]
pub enum ReferenceKey {
    Literal(String),
    Pattern { source: String, regex: Regex },
}

impl ReferenceKey {
    pub fn label(&self) -> &str {
        match self {
            ReferenceKey::Literal(s) => s,
            ReferenceKey::Pattern { source, .. } => source,
        }
    }

    pub fn is_match(&self, line: &str) -> bool {
        match self {
            ReferenceKey::Literal(s) => line.contains(s.as_str()),
            ReferenceKey::Pattern { regex, .. } => regex.is_match(line),
        }
    }
}

struct KeyContext {
    filename: String,
    stem: String,
    filepath: String,
    module_name: String,
}

impl KeyContext {
    fn for_target(target: &ScanTarget, resolve_modules: bool) -> Self {
        let filename = target.file_name().to_string();
        let stem = match filename.rfind('.') {
            Some(idx) if idx > 0 => filename[..idx].to_string(),
            _ => filename.clone(),
        };
        let module_name = if resolve_modules {
            python_module_name(target).unwrap_or_else(|| filename.clone())
        } else {
            stem.clone()
        };
        Self {
            filename,
            stem,
            filepath: target.relative_path.clone(),
            module_name,
        }
    }

    fn substitute(&self, template: &str, escape: bool) -> String {
        let value = |v: &str| {
            if escape {
                regex::escape(v)
            } else {
                v.to_string()
            }
        };
        template
            .replace("{filename}", &value(&self.filename))
            .replace("{stem}", &value(&self.stem))
            .replace("{filepath}", &value(&self.filepath))
            .replace("{module_name}", &value(&self.module_name))
    }
}

fn python_module_name(target: &ScanTarget) -> Option<String> {
    if target.extension().as_deref() != Some(".py") {
        return None;
    }
    let rel = target.relative_path.strip_suffix(".py").or_else(|| {
        // Extension check is case-insensitive; strip whatever case was used.
        let cut = target.relative_path.len().checked_sub(3)?;
        target.relative_path.get(..cut)
    })?;
    Some(rel.trim_start_matches('/').replace('/', "."))
}

/// Derive the reference keys for `target`, in rule order, without duplicates.
///
/// With `resolve_modules` off, a Python file's module name is its bare stem.
pub fn keys_for(
    rules: &[MatcherRule],
    target: &ScanTarget,
    resolve_modules: bool,
) -> Result<Vec<ReferenceKey>> {
    let ctx = KeyContext::for_target(target, resolve_modules);
    let mut seen = HashSet::new();
    let mut keys = Vec::new();

    let mut push = |key: ReferenceKey| {
        if !key.label().is_empty() && seen.insert(key.label().to_string()) {
            keys.push(key);
        }
    };

    for rule in rules {
        match rule {
            MatcherRule::Filename => push(ReferenceKey::Literal(ctx.filename.clone())),
            MatcherRule::RelativePath => push(ReferenceKey::Literal(ctx.filepath.clone())),
            MatcherRule::ModuleName => {
                if python_module_name(target).is_some() {
                    push(ReferenceKey::Literal(ctx.module_name.clone()));
                }
            }
            MatcherRule::Template { template } => {
                push(ReferenceKey::Literal(ctx.substitute(template, false)));
            }
            MatcherRule::Regex { pattern } => {
                let source = ctx.substitute(pattern, true);
                let regex = Regex::new(&source)
                    .map_err(|e| RefcheckError::Pattern(format!("{}: {}", source, e)))?;
                push(ReferenceKey::Pattern { source, regex });
            }
            MatcherRule::Alias { target: alias_target, names } => {
                if alias_target.trim_start_matches("./") == ctx.filepath {
                    for name in names {
                        push(ReferenceKey::Literal(name.trim().to_string()));
                    }
                }
            }
        }
    }

    Ok(keys)
}
