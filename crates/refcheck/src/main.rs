//! Refcheck launcher
//!
//! - **check**: scan for recently modified files, find references, archive a report
//! - **reports**: list or prune archived reports
//! - **config**: show the resolved configuration
//!
//! Configuration is loaded before logging is set up, so a broken config file
//! fails fast without creating log or report directories.

use anyhow::Result;
use clap::{Parser, Subcommand};
use refcheck_logging::{init_logging, LogConfig};
use refcheck_scout::RunSummary;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

mod cli;

use cli::check::CheckArgs;
use cli::context::{install_interrupt_handler, load_config, override_archive_dir};
use cli::error::{print_json_error, HelpfulError};
use cli::reports::ReportsAction;

/// Upper bound accepted for --hours (50 years)
const MAX_WINDOW_HOURS: u64 = 24 * 365 * 50;

#[derive(Parser, Debug)]
#[command(
    name = "refcheck",
    version,
    about = "Find recently modified files and where they are referenced"
)]
struct Cli {
    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Path to the YAML config (default: ./refcheck.yaml)
    #[arg(short, long, global = true, env = "REFCHECK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan, match references and archive a report (default)
    Check {
        /// Look back this many hours (overrides time_window_hours)
        #[arg(long, value_parser = clap::value_parser!(u64).range(0..=MAX_WINDOW_HOURS))]
        hours: Option<u64>,

        /// Scan this directory instead of scan_paths (repeatable)
        #[arg(short, long = "path")]
        paths: Vec<PathBuf>,

        /// Archive directory (overrides archive_dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Matcher threads (1 = sequential)
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..=256))]
        workers: Option<u64>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage archived reports
    Reports {
        #[command(subcommand)]
        action: ReportsAction,
    },

    /// Show the resolved configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    fn wants_json(&self) -> bool {
        match self {
            Commands::Check { json, .. } => *json,
            Commands::Reports { action } => action.json(),
            Commands::Config { json } => *json,
        }
    }

    fn is_check(&self) -> bool {
        matches!(self, Commands::Check { .. })
    }
}

fn default_command() -> Commands {
    Commands::Check {
        hours: None,
        paths: Vec::new(),
        output_dir: None,
        workers: None,
        json: false,
    }
}

fn run_command(
    verbose: bool,
    config_path: Option<PathBuf>,
    command: Commands,
    summary: &mut RunSummary,
) -> Result<()> {
    let (mut config, source) = load_config(config_path.as_deref())?;

    let check_args = match &command {
        Commands::Check {
            hours,
            paths,
            output_dir,
            workers,
            json,
        } => {
            let args = CheckArgs {
                hours: *hours,
                paths: paths.clone(),
                output_dir: output_dir.clone(),
                workers: workers.map(|w| w as usize),
                json: *json,
            };
            args.apply(&mut config)?;
            Some(args)
        }
        Commands::Reports { action } => {
            override_archive_dir(&mut config, action.output_dir())?;
            None
        }
        Commands::Config { .. } => None,
    };

    init_logging(LogConfig {
        app_name: "refcheck",
        level: config.log_level,
        log_dir: config.log_dir.clone(),
        verbose,
    })
    .map_err(|e| HelpfulError::logging_failed(config.log_dir.as_deref(), &format!("{:#}", e)))?;
    info!(config = ?source, "Configuration loaded");

    match command {
        Commands::Check { .. } => {
            let args = check_args.unwrap_or_default();
            let interrupt = install_interrupt_handler().unwrap_or_else(|e| {
                warn!("Interrupts will not stop the run: {:#}", e);
                Arc::new(AtomicBool::new(false))
            });
            cli::check::run(&args, config, interrupt, summary)
        }
        Commands::Reports { action } => cli::reports::run(&action, &config),
        Commands::Config { json } => cli::config::run(&config, &source, json),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or_else(default_command);
    let json_mode = command.wants_json();
    let is_check = command.is_check();

    let mut summary = RunSummary::default();
    let result = run_command(cli.verbose, cli.config, command, &mut summary);

    let code = match &result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if json_mode {
                print_json_error(err);
            } else {
                eprintln!("{:?}", err);
            }
            if summary.errors == 0 {
                summary.errors = 1;
            }
            ExitCode::from(1)
        }
    };

    if is_check {
        eprintln!("{}", summary.summary_line());
    }
    code
}
