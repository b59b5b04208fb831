//! Recursive tree hasher with streaming file digests.
//!
//! # Overview
//!
//! [`PathHasher::hash_tree`] walks a directory depth-first. Each child in
//! name order contributes its relative path, a NUL byte, its digest and a
//! NUL byte to the directory's accumulator. Subdirectories recurse through a
//! branched [`Catalog`]; files reuse the catalog digest when the stored
//! mtime matches and are streamed through the digest otherwise.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::sync::Arc;

use super::listing::{list_children, ChildEntry};
use super::{ScanError, ScanResult};
use crate::catalog::records::join_rel;
use crate::catalog::Catalog;
use crate::digest::DigestAlgorithm;
use crate::progress::ProgressCallback;

/// Default size of the read buffer used when streaming file contents (64 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Name of the walk phase reported to the progress callback.
const PHASE: &str = "hashing";

/// Counters collected over one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Directories visited, the root included
    pub directories: usize,
    /// Files whose content was read and digested
    pub files_hashed: usize,
    /// Files whose digest came from the catalog
    pub files_reused: usize,
    /// Bytes read from file contents
    pub bytes_read: u64,
}

impl ScanSummary {
    /// Files visited, hashed or reused.
    #[must_use]
    pub fn files(&self) -> usize {
        self.files_hashed + self.files_reused
    }
}

/// Computes directory digests, consulting and updating the catalog.
pub struct PathHasher {
    algorithm: DigestAlgorithm,
    read_buffer_size: usize,
    progress_callback: Option<Arc<dyn ProgressCallback>>,
    summary: ScanSummary,
}

impl PathHasher {
    #[must_use]
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self {
            algorithm,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            progress_callback: None,
            summary: ScanSummary::default(),
        }
    }

    /// Set the chunk size used when streaming file contents.
    #[must_use]
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Attach an observer for the walk.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    #[must_use]
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn summary(&self) -> ScanSummary {
        self.summary
    }

    /// Digest of the tree rooted at the catalog's directory.
    ///
    /// The composed digest of every directory is written back through its
    /// catalog façade.
    ///
    /// # Errors
    ///
    /// Any filesystem or catalog failure aborts the walk; no partial digest
    /// is returned.
    pub fn hash_tree(&mut self, catalog: &Catalog<'_>) -> ScanResult<String> {
        if let Some(cb) = &self.progress_callback {
            cb.on_phase_start(PHASE, 0);
        }

        let result = self.hash_dir(catalog);

        if let Some(cb) = &self.progress_callback {
            cb.on_phase_end(PHASE);
        }
        result
    }

    fn hash_dir(&mut self, catalog: &Catalog<'_>) -> ScanResult<String> {
        let dir = catalog.scan_path();
        let children = list_children(dir)?;

        self.summary.directories += 1;
        if let Some(cb) = &self.progress_callback {
            cb.on_message(catalog.rel_path());
        }

        let mut acc = self.algorithm.accumulator();
        for child in &children {
            let rel_path = join_rel(catalog.rel_path(), &child.name);

            let digest = if child.is_dir {
                let sub = catalog
                    .branch(&child.name)
                    .map_err(ScanError::catalog(&child.path))?;
                self.hash_dir(&sub)?
            } else {
                self.file_digest(catalog, child, &rel_path)?
            };

            acc.write(rel_path.as_bytes());
            acc.write(&[0]);
            acc.write(digest.as_bytes());
            acc.write(&[0]);
        }

        let digest = acc.finalize();
        log::debug!("Directory [{}] digest: {}", catalog.rel_path(), digest);

        catalog
            .set_path_hash(&digest)
            .map_err(ScanError::catalog(dir))?;
        Ok(digest)
    }

    /// Digest of one file: the catalog's when the mtime still matches,
    /// otherwise computed afresh and recorded.
    fn file_digest(
        &mut self,
        catalog: &Catalog<'_>,
        child: &ChildEntry,
        rel_path: &str,
    ) -> ScanResult<String> {
        // Follows a symlink to its target.
        let meta = std::fs::metadata(&child.path).map_err(|e| ScanError::from_io(&child.path, e))?;
        if meta.is_dir() {
            return Err(ScanError::Io {
                path: child.path.clone(),
                source: std::io::Error::other("symbolic link to a directory is not followed"),
            });
        }
        if !meta.is_file() {
            return Err(ScanError::Io {
                path: child.path.clone(),
                source: std::io::Error::other("not a regular file"),
            });
        }
        let mtime = filetime::FileTime::from_last_modification_time(&meta).unix_seconds();

        if let Some(cb) = &self.progress_callback {
            cb.on_progress(self.summary.files() + 1, rel_path);
        }

        let lookup = catalog
            .lookup_file(&child.name)
            .map_err(ScanError::catalog(&child.path))?;

        if let Some(hash) = lookup.cached_hash(mtime) {
            log::trace!("Reusing cached digest for [{rel_path}]");
            self.summary.files_reused += 1;
            return Ok(hash.to_string());
        }

        let hash = self.hash_file(&child.path)?;

        match &lookup.record {
            Some(record) if record.hash == hash => {
                log::trace!("Only the mtime of [{rel_path}] changed");
                catalog
                    .refresh_file_mtime(&lookup, mtime)
                    .map_err(ScanError::catalog(&child.path))?;
            }
            _ => {
                catalog
                    .set_file(&lookup, mtime, &hash)
                    .map_err(ScanError::catalog(&child.path))?;
            }
        }

        Ok(hash)
    }

    /// Stream a file's contents through a fresh accumulator.
    ///
    /// # Errors
    ///
    /// Returns a [`ScanError`] if the file cannot be opened or read.
    pub fn hash_file(&mut self, path: &Path) -> ScanResult<String> {
        let mut file = File::open(path).map_err(|e| ScanError::from_io(path, e))?;
        let mut acc = self.algorithm.accumulator();
        let mut buffer = vec![0u8; self.read_buffer_size];
        let mut total: u64 = 0;

        loop {
            let n = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(ScanError::from_io(path, e)),
            };
            acc.write(&buffer[..n]);
            total += n as u64;
        }

        self.summary.files_hashed += 1;
        self.summary.bytes_read += total;
        if let Some(cb) = &self.progress_callback {
            cb.on_item_completed(total);
        }

        Ok(acc.finalize())
    }
}
