//! Persistent catalog of previously computed digests.
//!
//! The catalog lets a scan skip rehashing files whose modification time has
//! not changed since the last run, and tells the caller exactly what changed.
//!
//! # Architecture
//!
//! * [`store`]: the SQLite resource owning the `paths` and `files` tables.
//! * [`handle`]: the per-directory [`Catalog`] façade used during the walk.
//! * [`records`]: record and lookup value types.
//!
//! # Mark and sweep
//!
//! Every record confirmed present during a run gets its `last_check_epoch`
//! set to the run epoch. When the walk completes, records still carrying an
//! older epoch belong to files or directories that disappeared; they are
//! reported as deletions and removed.

pub mod handle;
pub mod records;
pub mod store;

use std::path::PathBuf;

use crate::digest::DigestError;

pub use handle::{Catalog, PathState, PruneSummary};
pub use records::{
    EntityKind, FileLookup, FileRecord, PathDescriptor, PathLookup, PathRecord, Resolved,
    RunEpoch, StaleRecord, UNKNOWN_PATH_ID,
};
pub use store::{recorded_algorithm, CatalogStore};

/// Errors raised by the catalog.
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    /// The underlying SQLite operation failed.
    #[error("Catalog storage error ({context}): {source}")]
    Storage {
        /// Operation that failed
        context: &'static str,
        /// The underlying SQLite error
        #[source]
        source: rusqlite::Error,
    },

    /// `open` was called on an open store.
    #[error("Catalog connection already opened")]
    AlreadyOpen,

    /// The store is not open.
    #[error("Catalog connection not open")]
    NotOpen,

    /// An update or touch matched no row.
    #[error("No {table} record with id {id}")]
    NoSuchRecord {
        /// Table that was updated
        table: &'static str,
        /// Record id
        id: i64,
    },

    /// An update or touch matched more than one row.
    #[error("Update of {table} record {id} affected {affected} rows")]
    MultipleRecordsAffected {
        /// Table that was updated
        table: &'static str,
        /// Record id
        id: i64,
        /// Number of rows affected
        affected: usize,
    },

    /// A path record already exists for this relative path.
    #[error("Path already recorded: [{0}]")]
    RecordConflict(String),

    /// A file insert was attempted under a directory without a record.
    #[error("Can't record file [{filename}] without a valid path id")]
    UnknownPath {
        /// Relative path of the file
        filename: String,
    },

    /// The catalog was built with another digest algorithm.
    #[error("Catalog was built with {recorded}, not {requested}")]
    AlgorithmMismatch {
        /// Algorithm stored in the catalog
        recorded: String,
        /// Algorithm requested for this run
        requested: String,
    },

    /// The catalog records an algorithm this build does not know.
    #[error(transparent)]
    Digest(#[from] DigestError),

    /// The catalog's schema version is not supported.
    #[error("Unsupported catalog schema version: {0}")]
    UnsupportedSchema(i64),

    /// Recall found neither a directory nor a file for the path.
    #[error("Not found in catalog as path or file: [{0}]")]
    NotFound(String),

    /// A filesystem operation on the catalog file failed.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Catalog file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl CatalogError {
    /// Whether the error signals broken lookup-before-mutate discipline
    /// rather than an environmental failure.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::NoSuchRecord { .. }
                | Self::MultipleRecordsAffected { .. }
                | Self::RecordConflict(_)
                | Self::UnknownPath { .. }
        )
    }
}

/// Result type for catalog operations.
pub type CatalogResult<T> = Result<T, CatalogError>;
