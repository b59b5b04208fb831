//! Top-level scan and recall invocations.
//!
//! [`scan`] owns one run: it opens the catalog store, starts the change
//! reporter, walks the tree through a root [`Catalog`], prunes what the walk
//! did not touch and closes the store. [`recall`] reads a stored digest back
//! without touching the filesystem tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::catalog::{
    recorded_algorithm, Catalog, CatalogError, CatalogStore, PruneSummary, Resolved, RunEpoch,
};
use crate::changes::{ChangeReporter, ReportDestination, ReportSummary, DEFAULT_QUEUE_DEPTH};
use crate::digest::DigestAlgorithm;
use crate::error::ExitCode;
use crate::progress::ProgressCallback;
use crate::scanner::{PathHasher, ScanError, ScanSummary, DEFAULT_READ_BUFFER_SIZE};

/// Failures of a scan or recall, one variant per exit class.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// The directory holding the catalog could not be created.
    #[error("Could not create catalog directory {path}: {source}")]
    CatalogDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The catalog could not be opened.
    #[error("Could not open catalog {path}: {source}")]
    CatalogOpen {
        path: PathBuf,
        #[source]
        source: CatalogError,
    },

    /// The change report destination could not be opened.
    #[error("Could not open change report {destination}: {source}")]
    Report {
        destination: String,
        #[source]
        source: std::io::Error,
    },

    /// The tree could not be hashed.
    #[error("Could not hash {path}: {source}")]
    Hash {
        path: PathBuf,
        #[source]
        source: ScanError,
    },

    /// Stale records could not be pruned or the catalog not closed.
    #[error("Could not prune catalog {path}: {source}")]
    Prune {
        path: PathBuf,
        #[source]
        source: CatalogError,
    },

    /// Recall could not resolve the requested path.
    #[error("Could not recall from {path}: {source}")]
    Recall {
        path: PathBuf,
        #[source]
        source: CatalogError,
    },
}

impl EngineError {
    /// Process exit code for this failure.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::CatalogDirectory { .. } => ExitCode::CatalogDirectory,
            Self::CatalogOpen { .. } => ExitCode::CatalogOpen,
            Self::Report { .. } => ExitCode::ReportFailed,
            Self::Hash { .. } => ExitCode::HashFailed,
            Self::Prune { .. } => ExitCode::PruneFailed,
            Self::Recall {
                source: CatalogError::NotFound(_),
                ..
            } => ExitCode::NotFound,
            Self::Recall { .. } => ExitCode::CatalogOpen,
        }
    }
}

/// Inputs of one scan.
#[derive(Clone)]
pub struct ScanOptions {
    pub scan_path: PathBuf,
    pub catalog_path: PathBuf,
    pub algorithm: DigestAlgorithm,
    pub allow_updates: bool,
    /// Where change lines go; `None` disables change events entirely.
    pub report: Option<ReportDestination>,
    pub report_queue_depth: usize,
    pub read_buffer_size: usize,
    /// Fixed run epoch; picked from the clock (and the catalog) when `None`.
    pub epoch: Option<RunEpoch>,
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl ScanOptions {
    #[must_use]
    pub fn new(scan_path: impl Into<PathBuf>, catalog_path: impl Into<PathBuf>) -> Self {
        Self {
            scan_path: scan_path.into(),
            catalog_path: catalog_path.into(),
            algorithm: DigestAlgorithm::default(),
            allow_updates: true,
            report: None,
            report_queue_depth: DEFAULT_QUEUE_DEPTH,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            epoch: None,
            progress_callback: None,
        }
    }

    #[must_use]
    pub fn with_algorithm(mut self, algorithm: DigestAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    #[must_use]
    pub fn with_updates(mut self, allow_updates: bool) -> Self {
        self.allow_updates = allow_updates;
        self
    }

    #[must_use]
    pub fn with_report(mut self, destination: ReportDestination) -> Self {
        self.report = Some(destination);
        self
    }

    #[must_use]
    pub fn with_epoch(mut self, epoch: RunEpoch) -> Self {
        self.epoch = Some(epoch);
        self
    }

    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }
}

impl std::fmt::Debug for ScanOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanOptions")
            .field("scan_path", &self.scan_path)
            .field("catalog_path", &self.catalog_path)
            .field("algorithm", &self.algorithm)
            .field("allow_updates", &self.allow_updates)
            .field("report", &self.report)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

/// Result of a successful scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Hex digest of the scan root.
    pub digest: String,
    pub epoch: RunEpoch,
    pub summary: ScanSummary,
    pub pruned: PruneSummary,
    /// Present when a report destination was given.
    pub report: Option<ReportSummary>,
}

/// Default catalog location for a tree: a file named after the SHA-1 of the
/// canonical scan path, inside `catalog_dir`.
///
/// # Errors
///
/// [`EngineError::Hash`] if the scan path cannot be canonicalized.
pub fn default_catalog_path(catalog_dir: &Path, scan_path: &Path) -> Result<PathBuf, EngineError> {
    let canonical = scan_path
        .canonicalize()
        .map_err(|e| EngineError::Hash {
            path: scan_path.to_path_buf(),
            source: ScanError::from_io(scan_path, e),
        })?;

    let key = DigestAlgorithm::Sha1.digest(canonical.to_string_lossy().as_bytes());
    Ok(catalog_dir.join(format!("{key}.sqlite")))
}

/// Run one scan.
///
/// # Errors
///
/// See [`EngineError`]; nothing is printed and no digest is returned on
/// failure.
pub fn scan(options: &ScanOptions) -> Result<ScanOutcome, EngineError> {
    let scan_path = &options.scan_path;
    check_root(scan_path)?;

    if options.allow_updates {
        if let Some(parent) = options
            .catalog_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent).map_err(|source| EngineError::CatalogDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    let open_error = |source| EngineError::CatalogOpen {
        path: options.catalog_path.clone(),
        source,
    };

    let mut store = CatalogStore::new(&options.catalog_path, options.algorithm)
        .with_updates(options.allow_updates);
    store.open().map_err(open_error)?;

    let epoch = match options.epoch {
        Some(epoch) => epoch,
        None => RunEpoch::now().after(store.latest_epoch().map_err(open_error)?),
    };
    log::debug!(
        "Run epoch {} for {} (updates {})",
        epoch,
        scan_path.display(),
        if options.allow_updates { "allowed" } else { "disallowed" }
    );

    let reporter = match &options.report {
        Some(destination) => Some(
            ChangeReporter::spawn(destination, options.report_queue_depth).map_err(|source| {
                EngineError::Report {
                    destination: destination.to_string(),
                    source,
                }
            })?,
        ),
        None => None,
    };

    let walked = walk(&store, options, epoch, reporter.as_ref());
    let report = reporter.map(ChangeReporter::finish);
    let (digest, summary, pruned) = walked?;

    store.close_at(epoch).map_err(|source| EngineError::Prune {
        path: options.catalog_path.clone(),
        source,
    })?;

    log::info!(
        "Scanned {} directories and {} files ({} hashed, {} from catalog, {} bytes read)",
        summary.directories,
        summary.files(),
        summary.files_hashed,
        summary.files_reused,
        summary.bytes_read
    );
    if let Some(report) = &report {
        if report.failed > 0 {
            log::warn!("{} change line(s) could not be written", report.failed);
        }
    }

    Ok(ScanOutcome {
        digest,
        epoch,
        summary,
        pruned,
        report,
    })
}

fn check_root(scan_path: &Path) -> Result<(), EngineError> {
    let hash_error = |source| EngineError::Hash {
        path: scan_path.to_path_buf(),
        source,
    };

    let meta = std::fs::metadata(scan_path).map_err(|e| hash_error(ScanError::from_io(scan_path, e)))?;
    if !meta.is_dir() {
        return Err(hash_error(ScanError::NotADirectory(scan_path.to_path_buf())));
    }
    Ok(())
}

/// Walk and prune; the façades and their sinks are dropped on return.
fn walk(
    store: &CatalogStore,
    options: &ScanOptions,
    epoch: RunEpoch,
    reporter: Option<&ChangeReporter>,
) -> Result<(String, ScanSummary, PruneSummary), EngineError> {
    let scan_path = &options.scan_path;
    let hash_error = |source| EngineError::Hash {
        path: scan_path.clone(),
        source,
    };

    let catalog = Catalog::new(
        store,
        scan_path,
        options.allow_updates,
        epoch,
        reporter.map(ChangeReporter::sink),
    )
    .map_err(|e| hash_error(ScanError::catalog(scan_path)(e)))?;

    let mut hasher = PathHasher::new(options.algorithm).with_read_buffer_size(options.read_buffer_size);
    if let Some(cb) = &options.progress_callback {
        hasher = hasher.with_progress_callback(Arc::clone(cb));
    }

    let digest = hasher.hash_tree(&catalog).map_err(hash_error)?;

    let pruned = catalog.close().map_err(|source| EngineError::Prune {
        path: options.catalog_path.clone(),
        source,
    })?;
    if pruned.files + pruned.paths > 0 {
        log::debug!(
            "Pruned {} file and {} path record(s)",
            pruned.files,
            pruned.paths
        );
    }

    Ok((digest, hasher.summary(), pruned))
}

/// Read the digest stored for `rel_path` (the root when empty).
///
/// Without an explicit algorithm the one recorded in the catalog is used.
/// The catalog is opened read-only and never created.
///
/// # Errors
///
/// [`EngineError::Recall`] wrapping [`CatalogError::NotFound`] when neither a
/// directory nor a file record matches.
pub fn recall(
    catalog_path: &Path,
    algorithm: Option<DigestAlgorithm>,
    rel_path: &str,
) -> Result<Resolved, EngineError> {
    let recall_error = |source| EngineError::Recall {
        path: catalog_path.to_path_buf(),
        source,
    };

    let algorithm = match algorithm {
        Some(algorithm) => algorithm,
        None => recorded_algorithm(catalog_path)
            .map_err(recall_error)?
            .unwrap_or_default(),
    };

    let mut store = CatalogStore::new(catalog_path, algorithm).with_updates(false);
    store.open().map_err(|source| EngineError::CatalogOpen {
        path: catalog_path.to_path_buf(),
        source,
    })?;

    let resolved = store.resolve(rel_path).map_err(recall_error)?;
    store.close().map_err(recall_error)?;

    log::debug!(
        "Recalled [{}] (path id {}, file id {:?})",
        rel_path,
        resolved.path_id,
        resolved.file_id
    );
    Ok(resolved)
}
