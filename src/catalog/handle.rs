//! Per-directory catalog façade.
//!
//! A [`Catalog`] is bound to one directory of the scanned tree. It knows the
//! directory's relative path and record id, branches into child façades for
//! subdirectories, and turns lookups and updates into change events. All
//! façades of a run borrow the same [`CatalogStore`], which outlives them.

use std::path::{Path, PathBuf};

use super::records::{
    join_rel, EntityKind, FileLookup, PathDescriptor, PathRecord, RunEpoch,
};
use super::store::CatalogStore;
use super::CatalogResult;
use crate::changes::{ChangeEvent, ChangeKind, ChangeSink};

/// How a directory's composed digest compares with the recorded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathState {
    /// The directory had no record before this run.
    New,
    /// The recorded digest differed (or was never set).
    Updated,
    /// The recorded digest matched.
    Unaffected,
}

/// Records pruned when the root façade is closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneSummary {
    pub files: usize,
    pub paths: usize,
}

/// Catalog view scoped to one directory.
#[derive(Debug)]
pub struct Catalog<'a> {
    store: &'a CatalogStore,
    scan_path: PathBuf,
    descriptor: PathDescriptor,
    allow_updates: bool,
    epoch: RunEpoch,
    sink: Option<ChangeSink>,
    prior: Option<PathRecord>,
}

impl<'a> Catalog<'a> {
    /// Create the root façade for `scan_path` (relative path `""`).
    ///
    /// # Errors
    ///
    /// Fails if the root path record cannot be looked up, touched or created.
    pub fn new(
        store: &'a CatalogStore,
        scan_path: &Path,
        allow_updates: bool,
        epoch: RunEpoch,
        sink: Option<ChangeSink>,
    ) -> CatalogResult<Self> {
        Self::bind(
            store,
            scan_path.to_path_buf(),
            String::new(),
            allow_updates,
            epoch,
            sink,
        )
    }

    /// Make sure a record exists for `rel_path` and bind to it.
    fn bind(
        store: &'a CatalogStore,
        scan_path: PathBuf,
        rel_path: String,
        allow_updates: bool,
        epoch: RunEpoch,
        sink: Option<ChangeSink>,
    ) -> CatalogResult<Self> {
        let lookup = store.lookup_path(&rel_path)?;

        let (descriptor, prior) = match lookup.record {
            Some(record) => {
                if allow_updates {
                    store.touch_path(record.path_id, epoch)?;
                }
                (
                    PathDescriptor::recorded(rel_path, record.path_id),
                    Some(record),
                )
            }
            None => {
                // Reported before the insert, and in no-update mode too.
                if let Some(sink) = &sink {
                    sink.emit(ChangeEvent::new(
                        EntityKind::Path,
                        ChangeKind::Create,
                        rel_path.clone(),
                    ));
                }

                if allow_updates {
                    let path_id = store.create_path(&rel_path, epoch)?;
                    (PathDescriptor::recorded(rel_path, path_id), None)
                } else {
                    (PathDescriptor::unknown(rel_path), None)
                }
            }
        };

        Ok(Self {
            store,
            scan_path,
            descriptor,
            allow_updates,
            epoch,
            sink,
            prior,
        })
    }

    /// Façade for the subdirectory `child_name`.
    pub fn branch(&self, child_name: &str) -> CatalogResult<Catalog<'a>> {
        Self::bind(
            self.store,
            self.scan_path.join(child_name),
            join_rel(self.descriptor.rel_path(), child_name),
            self.allow_updates,
            self.epoch,
            self.sink.clone(),
        )
    }

    /// Filesystem path of this directory.
    #[must_use]
    pub fn scan_path(&self) -> &Path {
        &self.scan_path
    }

    /// Path relative to the scan root (`""` for the root).
    #[must_use]
    pub fn rel_path(&self) -> &str {
        self.descriptor.rel_path()
    }

    #[must_use]
    pub fn descriptor(&self) -> &PathDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub fn allow_updates(&self) -> bool {
        self.allow_updates
    }

    #[must_use]
    pub fn epoch(&self) -> RunEpoch {
        self.epoch
    }

    /// Digest recorded for this directory before the run, if any.
    #[must_use]
    pub fn last_hash(&self) -> Option<&str> {
        self.prior.as_ref().and_then(|r| r.hash.as_deref())
    }

    /// Look a file of this directory up.
    ///
    /// A found record is also touched, so the lookup marks the file as alive
    /// for the sweep.
    pub fn lookup_file(&self, filename: &str) -> CatalogResult<FileLookup> {
        let lookup = self.store.lookup_file(&self.descriptor, filename)?;

        if self.allow_updates {
            if let Some(record) = &lookup.record {
                self.store.touch_file(record.file_id, self.epoch)?;
            }
        }

        Ok(lookup)
    }

    /// Record a new digest for a file.
    ///
    /// The change is reported even when updates are disallowed, so a dry run
    /// shows what would change.
    pub fn set_file(&self, lookup: &FileLookup, mtime: i64, hash: &str) -> CatalogResult<()> {
        if let Some(sink) = &self.sink {
            let change = if lookup.was_found() {
                ChangeKind::Update
            } else {
                ChangeKind::Create
            };
            sink.emit(ChangeEvent::new(EntityKind::File, change, lookup.rel_path()));
        }

        if !self.allow_updates {
            return Ok(());
        }

        self.store.upsert_file(lookup, hash, mtime, self.epoch)
    }

    /// Store a new mtime for a file whose content digest did not change.
    ///
    /// No change is reported.
    pub fn refresh_file_mtime(&self, lookup: &FileLookup, mtime: i64) -> CatalogResult<()> {
        match &lookup.record {
            Some(record) if self.allow_updates => {
                self.store.upsert_file(lookup, &record.hash, mtime, self.epoch)
            }
            _ => Ok(()),
        }
    }

    /// Compare the composed digest with the recorded one and persist it.
    pub fn set_path_hash(&self, hash: &str) -> CatalogResult<PathState> {
        let state = match &self.prior {
            None => PathState::New,
            Some(record) if record.hash.as_deref() == Some(hash) => PathState::Unaffected,
            Some(_) => PathState::Updated,
        };

        if state == PathState::Unaffected {
            return Ok(state);
        }

        if state == PathState::Updated {
            if let Some(sink) = &self.sink {
                sink.emit(ChangeEvent::new(
                    EntityKind::Path,
                    ChangeKind::Update,
                    self.rel_path(),
                ));
            }
        }

        if self.allow_updates {
            self.store.update_path(self.descriptor.path_id(), hash)?;
        }

        Ok(state)
    }

    /// Report and delete file records not touched in this run.
    pub fn prune_old_files(&self) -> CatalogResult<usize> {
        self.prune(EntityKind::File)
    }

    /// Report and delete path records not touched in this run.
    pub fn prune_old_paths(&self) -> CatalogResult<usize> {
        self.prune(EntityKind::Path)
    }

    fn prune(&self, kind: EntityKind) -> CatalogResult<usize> {
        if !self.allow_updates {
            return Ok(0);
        }

        if let Some(sink) = &self.sink {
            self.store.sweep_stale(kind, self.epoch, |stale| {
                sink.emit(ChangeEvent::new(
                    stale.kind,
                    ChangeKind::Delete,
                    stale.rel_path,
                ));
            })?;
        }

        self.store.prune_stale(kind, self.epoch)
    }

    /// Finish the run on this façade: prune files, then paths.
    ///
    /// The store itself is closed by its owner once every façade is gone.
    pub fn close(self) -> CatalogResult<PruneSummary> {
        if !self.allow_updates {
            return Ok(PruneSummary::default());
        }

        let files = self.prune_old_files()?;
        let paths = self.prune_old_paths()?;
        Ok(PruneSummary { files, paths })
    }
}
