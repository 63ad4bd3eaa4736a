//! Config command - show the resolved configuration

use crate::cli::context::ConfigSource;
use crate::cli::output::print_json;
use anyhow::Result;
use refcheck_scout::RefcheckConfig;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ResolvedConfig<'a> {
    source: String,
    config: &'a RefcheckConfig,
    effective_workers: usize,
}

fn describe(source: &ConfigSource) -> String {
    match source {
        ConfigSource::Explicit(path) | ConfigSource::WorkingDir(path) => {
            path.display().to_string()
        }
        ConfigSource::Defaults => "(built-in defaults)".to_string(),
    }
}

/// Execute the config command
pub fn run(config: &RefcheckConfig, source: &ConfigSource, json: bool) -> Result<()> {
    if json {
        return print_json(&ResolvedConfig {
            source: describe(source),
            config,
            effective_workers: config.effective_workers(),
        });
    }

    println!("# Source: {}", describe(source));
    print!("{}", serde_yaml::to_string(config)?);
    Ok(())
}
