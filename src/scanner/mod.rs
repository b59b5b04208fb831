//! Scanner module for directory listing and tree hashing.
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`listing`]: sorted, single-level directory listings
//! - [`hasher`]: the recursive [`PathHasher`] and streaming file digests
//!
//! # Example
//!
//! ```no_run
//! use pathfingerprint::catalog::{Catalog, CatalogStore, RunEpoch};
//! use pathfingerprint::digest::DigestAlgorithm;
//! use pathfingerprint::scanner::PathHasher;
//! use std::path::Path;
//!
//! let mut store = CatalogStore::new(Path::new("catalog.sqlite"), DigestAlgorithm::Sha1);
//! store.open().unwrap();
//!
//! let root = Path::new(".");
//! let catalog = Catalog::new(&store, root, true, RunEpoch::now(), None).unwrap();
//! let mut hasher = PathHasher::new(DigestAlgorithm::Sha1);
//! let digest = hasher.hash_tree(&catalog).unwrap();
//! println!("{digest}");
//! ```

pub mod hasher;
pub mod listing;

use std::path::{Path, PathBuf};

use crate::catalog::CatalogError;

// Re-export main types
pub use hasher::{PathHasher, ScanSummary, DEFAULT_READ_BUFFER_SIZE};
pub use listing::{list_children, ChildEntry};

/// Errors that can occur while scanning a tree.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A file name is not valid UTF-8 and cannot be recorded.
    #[error("File name is not valid UTF-8: {0}")]
    NonUtf8Name(PathBuf),

    /// A catalog operation failed while visiting a path.
    #[error("Catalog failure at {path}: {source}")]
    Catalog {
        /// Directory or file being processed
        path: PathBuf,
        /// The underlying catalog error
        #[source]
        source: CatalogError,
    },
}

impl ScanError {
    /// Map an I/O error to the matching variant.
    pub(crate) fn from_io(path: &Path, error: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::PermissionDenied => {
                log::warn!("Permission denied: {}", path.display());
                Self::PermissionDenied(path.to_path_buf())
            }
            ErrorKind::NotFound => {
                log::debug!("Not found (may have been deleted): {}", path.display());
                Self::NotFound(path.to_path_buf())
            }
            _ => {
                log::warn!("I/O error for {}: {}", path.display(), error);
                Self::Io {
                    path: path.to_path_buf(),
                    source: error,
                }
            }
        }
    }

    /// Wrap a catalog error with the path being processed.
    pub(crate) fn catalog(path: &Path) -> impl FnOnce(CatalogError) -> Self + '_ {
        move |source| Self::Catalog {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for scanner operations.
pub type ScanResult<T> = Result<T, ScanError>;
