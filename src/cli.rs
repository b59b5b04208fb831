//! Command-line interface definitions.
//!
//! # Example
//!
//! ```bash
//! # Fingerprint a tree, using the default per-tree catalog
//! pathfingerprint scan ~/photos
//!
//! # Report what changed since the last run, without touching the catalog
//! pathfingerprint scan ~/photos --no-updates --report -
//!
//! # Read a stored digest back without rescanning
//! pathfingerprint recall --catalog photos.sqlite --rel-path 2024/summer
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::changes::ReportDestination;
use crate::digest::DigestAlgorithm;

/// Incremental, content-addressed fingerprints for directory trees.
///
/// Computes one digest for a whole tree and keeps a catalog of file digests
/// so unchanged files are not read again on the next run.
#[derive(Debug, Parser)]
#[command(name = "pathfingerprint")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print failures as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (TOML)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Hash a directory tree and print its digest
    Scan(ScanArgs),
    /// Print a digest stored in a catalog without rescanning
    Recall(RecallArgs),
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Root of the tree to fingerprint
    #[arg(value_name = "SCAN_PATH")]
    pub scan_path: PathBuf,

    /// Catalog file to use
    ///
    /// If not specified, a file named after the scan path is used inside the
    /// catalog directory.
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Directory for default catalog files
    #[arg(long, value_name = "DIR", conflicts_with = "catalog")]
    pub catalog_dir: Option<PathBuf>,

    /// Digest algorithm
    #[arg(short, long, value_enum)]
    pub algorithm: Option<DigestAlgorithm>,

    /// Do not write to the catalog; report what would change
    #[arg(long)]
    pub no_updates: bool,

    /// Write change lines to FILE, or to stderr with `-`
    #[arg(long, value_name = "FILE|-")]
    pub report: Option<ReportDestination>,

    /// Do not show the progress spinner
    #[arg(long)]
    pub no_progress: bool,
}

/// Arguments for the recall subcommand.
#[derive(Debug, Args)]
pub struct RecallArgs {
    /// Catalog file to read
    #[arg(long, value_name = "FILE")]
    pub catalog: PathBuf,

    /// Digest algorithm the catalog was built with
    #[arg(short, long, value_enum)]
    pub algorithm: Option<DigestAlgorithm>,

    /// Directory or file path relative to the scan root (default: the root)
    #[arg(long, value_name = "PATH")]
    pub rel_path: Option<String>,

    /// Also print the resolved record
    #[arg(long)]
    pub extended: bool,
}
