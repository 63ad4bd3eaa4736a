//! Shared command setup: config resolution, CLI overrides, interrupts

use crate::cli::error::HelpfulError;
use anyhow::{Context, Result};
use refcheck_scout::scan_path::anchor;
use refcheck_scout::{RefcheckConfig, DEFAULT_CONFIG_FILE};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Where the effective configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// `--config` or `REFCHECK_CONFIG`
    Explicit(PathBuf),
    /// `refcheck.yaml` in the working directory
    WorkingDir(PathBuf),
    /// No file; defaults rooted at the working directory
    Defaults,
}

/// Resolve and load the configuration. Reads nothing but the config file.
pub fn load_config(explicit: Option<&Path>) -> Result<(RefcheckConfig, ConfigSource)> {
    let cwd = std::env::current_dir().context("Cannot determine the working directory")?;

    if let Some(path) = explicit {
        let path = anchor(&cwd, path);
        let config = RefcheckConfig::load(&path).map_err(|e| HelpfulError::config(&e))?;
        return Ok((config, ConfigSource::Explicit(path)));
    }

    let default_path = cwd.join(DEFAULT_CONFIG_FILE);
    if default_path.is_file() {
        let config = RefcheckConfig::load(&default_path).map_err(|e| HelpfulError::config(&e))?;
        return Ok((config, ConfigSource::WorkingDir(default_path)));
    }

    Ok((RefcheckConfig::for_project(&cwd), ConfigSource::Defaults))
}

/// Resolve a command-line path against the working directory.
pub fn cli_path(path: &Path) -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("Cannot determine the working directory")?;
    Ok(anchor(&cwd, path))
}

/// Apply `--output-dir` to a loaded config.
pub fn override_archive_dir(config: &mut RefcheckConfig, output_dir: Option<&Path>) -> Result<()> {
    if let Some(dir) = output_dir {
        config.archive_dir = cli_path(dir)?;
        debug!(dir = %config.archive_dir.display(), "Archive directory overridden");
    }
    Ok(())
}

/// Install SIGINT/SIGTERM (Ctrl+C on Windows) handlers that raise the returned flag.
pub fn install_interrupt_handler() -> Result<Arc<AtomicBool>> {
    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_flag_handler = shutdown_flag.clone();

    #[cfg(unix)]
    {
        use signal_hook::consts::{SIGINT, SIGTERM};
        use signal_hook::iterator::Signals;

        let mut signals =
            Signals::new([SIGINT, SIGTERM]).context("Failed to install signal handlers")?;
        std::thread::spawn(move || {
            if let Some(sig) = signals.forever().next() {
                info!("Received signal {}, stopping after the current step...", sig);
                shutdown_flag_handler.store(true, Ordering::SeqCst);
            }
        });
    }

    #[cfg(windows)]
    {
        ctrlc::set_handler(move || {
            info!("Received Ctrl+C, stopping after the current step...");
            shutdown_flag_handler.store(true, Ordering::SeqCst);
        })
        .context("Failed to install Ctrl+C handler")?;
    }

    Ok(shutdown_flag)
}
