//! PathFingerprint - incremental directory tree fingerprints
//!
//! Computes one deterministic digest for a whole directory tree and keeps a
//! SQLite catalog of per-file digests, so later runs only read files whose
//! modification time changed and can report exactly what was created,
//! updated or deleted in between.

pub mod catalog;
pub mod changes;
pub mod cli;
pub mod config;
pub mod digest;
pub mod engine;
pub mod error;
pub mod logging;
pub mod progress;
pub mod scanner;

use std::sync::Arc;

use crate::changes::ReportDestination;
use crate::cli::{Cli, Commands, RecallArgs, ScanArgs};
use crate::config::Config;
use crate::engine::ScanOptions;
use crate::error::ExitCode;
use crate::progress::{Progress, ProgressCallback};

/// Run the application logic for parsed arguments.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded or the scan or recall
/// fails. Engine failures carry an [`engine::EngineError`] that selects the
/// exit code.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let config = Config::load(cli.config.as_deref())?;
    log::debug!("Configuration: {config:?}");

    match cli.command {
        Commands::Scan(args) => run_scan(args, &config, cli.quiet),
        Commands::Recall(args) => run_recall(&args),
    }
}

fn run_scan(args: ScanArgs, config: &Config, quiet: bool) -> anyhow::Result<ExitCode> {
    let catalog_path = match args.catalog {
        Some(path) => path,
        None => {
            let dir = match args.catalog_dir {
                Some(dir) => dir,
                None => config.resolved_catalog_dir()?,
            };
            engine::default_catalog_path(&dir, &args.scan_path)?
        }
    };
    log::debug!("Using catalog {}", catalog_path.display());

    let mut options = ScanOptions::new(&args.scan_path, catalog_path)
        .with_algorithm(args.algorithm.unwrap_or(config.algorithm))
        .with_updates(!args.no_updates);
    options.report_queue_depth = config.report_queue_depth;
    options.read_buffer_size = config.read_buffer_size;

    // Change lines on stderr would interleave with the spinner.
    let report_on_stderr = args.report == Some(ReportDestination::Stderr);
    if let Some(destination) = args.report {
        options = options.with_report(destination);
    }

    if config.progress && !args.no_progress && !quiet && !report_on_stderr {
        let progress: Arc<dyn ProgressCallback> = Arc::new(Progress::new(false));
        options = options.with_progress_callback(progress);
    }

    let outcome = engine::scan(&options)?;
    println!("{}", outcome.digest);
    Ok(ExitCode::Success)
}

fn run_recall(args: &RecallArgs) -> anyhow::Result<ExitCode> {
    let rel_path = args.rel_path.as_deref().unwrap_or("");
    let resolved = engine::recall(&args.catalog, args.algorithm, rel_path)?;

    if args.extended {
        println!("hash:     {}", resolved.hash);
        println!(
            "path:     {}",
            if resolved.rel_path.is_empty() {
                "."
            } else {
                resolved.rel_path.as_str()
            }
        );
        println!("path id:  {}", resolved.path_id);
        if let (Some(filename), Some(file_id)) = (&resolved.filename, resolved.file_id) {
            println!("filename: {filename}");
            println!("file id:  {file_id}");
        }
    } else {
        println!("{}", resolved.hash);
    }

    Ok(ExitCode::Success)
}
