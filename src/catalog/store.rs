//! SQLite-backed catalog store.
//!
//! Owns the single connection and the `paths`/`files` tables. Every statement
//! is auto-committed; a crash mid-run leaves some records untouched, which the
//! next run's sweep converges.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, ErrorCode, OpenFlags, OptionalExtension};

use super::records::{
    join_rel, split_rel, EntityKind, FileId, FileLookup, FileRecord, PathDescriptor, PathId,
    PathLookup, PathRecord, Resolved, RunEpoch, StaleRecord,
};
use super::{CatalogError, CatalogResult};
use crate::digest::DigestAlgorithm;

/// Current on-disk schema version.
pub const CURRENT_SCHEMA_VERSION: i64 = 2;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS catalog_info (
    catalog_info_id INTEGER NOT NULL PRIMARY KEY,
    key VARCHAR(50) NOT NULL UNIQUE,
    value VARCHAR(200) NULL
);

CREATE TABLE IF NOT EXISTS paths (
    path_id INTEGER NOT NULL PRIMARY KEY,
    rel_path VARCHAR(1000) NOT NULL,
    hash VARCHAR(64) NULL,
    last_check_epoch INTEGER NULL DEFAULT 0,
    CONSTRAINT paths_rel_path_idx UNIQUE (rel_path)
);

CREATE INDEX IF NOT EXISTS paths_last_check_epoch_idx ON paths(last_check_epoch ASC);

CREATE TABLE IF NOT EXISTS files (
    file_id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
    path_id INTEGER NOT NULL,
    filename VARCHAR(255) NOT NULL,
    hash VARCHAR(64) NOT NULL,
    mtime_epoch INTEGER NOT NULL,
    last_check_epoch INTEGER NULL DEFAULT 0,
    CONSTRAINT files_filename_idx UNIQUE (filename, path_id),
    CONSTRAINT files_path_id_fk FOREIGN KEY (path_id) REFERENCES paths (path_id)
);

CREATE INDEX IF NOT EXISTS files_last_check_epoch_idx ON files(last_check_epoch ASC);
";

fn storage(context: &'static str) -> impl FnOnce(rusqlite::Error) -> CatalogError {
    move |source| CatalogError::Storage { context, source }
}

/// Map a row-count to the single-record contract of updates and touches.
fn expect_single(table: &'static str, id: i64, affected: usize) -> CatalogResult<()> {
    match affected {
        0 => Err(CatalogError::NoSuchRecord { table, id }),
        1 => Ok(()),
        n => Err(CatalogError::MultipleRecordsAffected {
            table,
            id,
            affected: n,
        }),
    }
}

/// Normalize a user-supplied relative path: `.`/`./x`/`x/` forms map onto
/// the stored representation.
#[must_use]
pub fn normalize_rel_path(rel_path: &str) -> String {
    let parts: Vec<&str> = rel_path
        .split(['/', '\\'])
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    parts.join("/")
}

/// Persistent catalog of path and file records.
///
/// # Example
///
/// ```no_run
/// use pathfingerprint::catalog::CatalogStore;
/// use pathfingerprint::digest::DigestAlgorithm;
/// use std::path::Path;
///
/// let mut store = CatalogStore::new(Path::new("catalog.sqlite"), DigestAlgorithm::Sha1);
/// store.open().unwrap();
/// let root = store.lookup_path("").unwrap();
/// println!("root recorded: {}", root.was_found());
/// store.close().unwrap();
/// ```
#[derive(Debug)]
pub struct CatalogStore {
    path: PathBuf,
    algorithm: DigestAlgorithm,
    allow_updates: bool,
    conn: Option<Connection>,
    scratch: bool,
}

impl CatalogStore {
    /// Create a store bound to a catalog file. Nothing is opened yet.
    #[must_use]
    pub fn new(path: &Path, algorithm: DigestAlgorithm) -> Self {
        Self {
            path: path.to_path_buf(),
            algorithm,
            allow_updates: true,
            conn: None,
            scratch: false,
        }
    }

    /// Whether the catalog file may be written.
    ///
    /// With updates disallowed an existing catalog is opened read-only and a
    /// missing one is replaced by an in-memory scratch store.
    #[must_use]
    pub fn with_updates(mut self, allow_updates: bool) -> Self {
        self.allow_updates = allow_updates;
        self
    }

    /// Path of the catalog file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Digest algorithm the catalog is pinned to.
    #[must_use]
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    /// Whether the store is currently open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Whether the open connection is an in-memory scratch store.
    #[must_use]
    pub fn is_scratch(&self) -> bool {
        self.scratch
    }

    fn conn(&self) -> CatalogResult<&Connection> {
        self.conn.as_ref().ok_or(CatalogError::NotOpen)
    }

    /// Open the connection and make sure the schema exists.
    ///
    /// # Errors
    ///
    /// [`CatalogError::AlreadyOpen`] if already open, [`CatalogError::Storage`]
    /// on SQLite failures, [`CatalogError::AlgorithmMismatch`] or
    /// [`CatalogError::UnsupportedSchema`] if the catalog was written by an
    /// incompatible run.
    pub fn open(&mut self) -> CatalogResult<()> {
        if self.conn.is_some() {
            return Err(CatalogError::AlreadyOpen);
        }

        log::debug!("Opening catalog: {}", self.path.display());

        let conn = if self.allow_updates {
            let conn = Connection::open(&self.path).map_err(storage("open catalog"))?;
            conn.pragma_update(None, "foreign_keys", "ON")
                .map_err(storage("enable foreign keys"))?;
            conn.execute_batch(SCHEMA)
                .map_err(storage("create schema"))?;
            self.scratch = false;
            conn
        } else {
            match self.open_read_only()? {
                Some(conn) => {
                    self.scratch = false;
                    conn
                }
                None => {
                    log::debug!(
                        "No usable catalog at {}; using an in-memory scratch catalog",
                        self.path.display()
                    );
                    let conn = Connection::open_in_memory().map_err(storage("open scratch"))?;
                    conn.execute_batch(SCHEMA)
                        .map_err(storage("create schema"))?;
                    self.scratch = true;
                    conn
                }
            }
        };

        self.check_info(&conn)?;
        self.conn = Some(conn);
        Ok(())
    }

    /// Open an existing catalog read-only; `None` if there is nothing to open.
    fn open_read_only(&self) -> CatalogResult<Option<Connection>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(storage("open catalog read-only"))?;

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'table' AND name IN ('catalog_info', 'paths', 'files')",
                [],
                |row| row.get(0),
            )
            .map_err(storage("inspect schema"))?;

        if tables == 3 {
            Ok(Some(conn))
        } else {
            Ok(None)
        }
    }

    /// Record or verify the schema version and digest algorithm.
    fn check_info(&self, conn: &Connection) -> CatalogResult<()> {
        let read = |key: &str| -> CatalogResult<Option<String>> {
            conn.query_row(
                "SELECT value FROM catalog_info WHERE key = ?1",
                [key],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .map(Option::flatten)
            .map_err(storage("read catalog info"))
        };

        let writable = self.allow_updates || self.scratch;

        match read("schema_version")? {
            Some(value) => {
                let version = value.parse::<i64>().unwrap_or(-1);
                if version != CURRENT_SCHEMA_VERSION {
                    return Err(CatalogError::UnsupportedSchema(version));
                }
            }
            None if writable => {
                conn.execute(
                    "INSERT INTO catalog_info (key, value) VALUES ('schema_version', ?1)",
                    [CURRENT_SCHEMA_VERSION.to_string()],
                )
                .map_err(storage("record schema version"))?;
            }
            None => return Err(CatalogError::UnsupportedSchema(0)),
        }

        match read("hash_algorithm")? {
            Some(recorded) => {
                if recorded != self.algorithm.name() {
                    return Err(CatalogError::AlgorithmMismatch {
                        recorded,
                        requested: self.algorithm.name().to_string(),
                    });
                }
            }
            None if writable => {
                conn.execute(
                    "INSERT INTO catalog_info (key, value) VALUES ('hash_algorithm', ?1)",
                    [self.algorithm.name()],
                )
                .map_err(storage("record hash algorithm"))?;
            }
            // Catalogs from before the algorithm was pinned are trusted as-is.
            None => {}
        }

        Ok(())
    }

    /// Release the connection.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NotOpen`] if the store is not open.
    pub fn close(&mut self) -> CatalogResult<()> {
        let conn = self.conn.take().ok_or(CatalogError::NotOpen)?;
        log::debug!("Closing catalog: {}", self.path.display());

        conn.close()
            .map_err(|(_conn, source)| CatalogError::Storage {
                context: "close catalog",
                source,
            })
    }

    /// Close the root store and stamp the catalog file's mtime with the run
    /// epoch, so a catalog living inside another scanned tree reads as fresh.
    ///
    /// Read-only and scratch stores are closed without touching the file.
    ///
    /// # Errors
    ///
    /// As [`CatalogStore::close`], plus [`CatalogError::Io`] if the stamp fails.
    pub fn close_at(&mut self, epoch: RunEpoch) -> CatalogResult<()> {
        let stamp = self.allow_updates && !self.scratch;
        self.close()?;

        if stamp {
            let mtime = filetime::FileTime::from_unix_time(epoch.as_unix(), 0);
            filetime::set_file_mtime(&self.path, mtime).map_err(|source| CatalogError::Io {
                path: self.path.clone(),
                source,
            })?;
            log::trace!("Stamped {} with epoch {}", self.path.display(), epoch);
        }

        Ok(())
    }

    /// Exact match on `rel_path`.
    pub fn lookup_path(&self, rel_path: &str) -> CatalogResult<PathLookup> {
        let record = self
            .conn()?
            .query_row(
                "SELECT path_id, rel_path, hash, last_check_epoch
                 FROM paths
                 WHERE rel_path = ?1",
                [rel_path],
                |row| {
                    Ok(PathRecord {
                        path_id: row.get(0)?,
                        rel_path: row.get(1)?,
                        hash: row.get(2)?,
                        last_check_epoch: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                    })
                },
            )
            .optional()
            .map_err(storage("lookup path"))?;

        if record.is_some() {
            log::trace!("Path IS ALREADY in catalog: [{rel_path}]");
        } else {
            log::trace!("Path not yet in catalog: [{rel_path}]");
        }

        Ok(PathLookup {
            rel_path: rel_path.to_string(),
            record,
        })
    }

    /// Exact match on `(path_id, filename)`.
    ///
    /// An unrecorded descriptor short-circuits to "not found".
    pub fn lookup_file(
        &self,
        descriptor: &PathDescriptor,
        filename: &str,
    ) -> CatalogResult<FileLookup> {
        let record = if descriptor.is_recorded() {
            self.conn()?
                .query_row(
                    "SELECT file_id, path_id, filename, hash, mtime_epoch, last_check_epoch
                     FROM files
                     WHERE filename = ?1 AND path_id = ?2",
                    params![filename, descriptor.path_id()],
                    |row| {
                        Ok(FileRecord {
                            file_id: row.get(0)?,
                            path_id: row.get(1)?,
                            filename: row.get(2)?,
                            hash: row.get(3)?,
                            mtime_epoch: row.get(4)?,
                            last_check_epoch: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
                        })
                    },
                )
                .optional()
                .map_err(storage("lookup file"))?
        } else {
            None
        };

        Ok(FileLookup {
            descriptor: descriptor.clone(),
            filename: filename.to_string(),
            record,
        })
    }

    /// Insert a new path record with no digest.
    ///
    /// # Errors
    ///
    /// [`CatalogError::RecordConflict`] if `rel_path` is already recorded.
    pub fn create_path(&self, rel_path: &str, epoch: RunEpoch) -> CatalogResult<PathId> {
        let conn = self.conn()?;
        log::debug!("Inserting path record: [{rel_path}] at epoch {epoch}");

        match conn.execute(
            "INSERT INTO paths (rel_path, last_check_epoch) VALUES (?1, ?2)",
            params![rel_path, epoch.as_unix()],
        ) {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(CatalogError::RecordConflict(rel_path.to_string()))
            }
            Err(e) => Err(CatalogError::Storage {
                context: "create path",
                source: e,
            }),
        }
    }

    /// Set the composed digest of a path record.
    pub fn update_path(&self, path_id: PathId, hash: &str) -> CatalogResult<()> {
        let affected = self
            .conn()?
            .execute(
                "UPDATE paths SET hash = ?1 WHERE path_id = ?2",
                params![hash, path_id],
            )
            .map_err(storage("update path"))?;
        expect_single("paths", path_id, affected)
    }

    /// Mark a path record as seen in this run.
    pub fn touch_path(&self, path_id: PathId, epoch: RunEpoch) -> CatalogResult<()> {
        let affected = self
            .conn()?
            .execute(
                "UPDATE paths SET last_check_epoch = ?1 WHERE path_id = ?2",
                params![epoch.as_unix(), path_id],
            )
            .map_err(storage("touch path"))?;
        expect_single("paths", path_id, affected)
    }

    /// Mark a file record as seen in this run.
    pub fn touch_file(&self, file_id: FileId, epoch: RunEpoch) -> CatalogResult<()> {
        let affected = self
            .conn()?
            .execute(
                "UPDATE files SET last_check_epoch = ?1 WHERE file_id = ?2",
                params![epoch.as_unix(), file_id],
            )
            .map_err(storage("touch file"))?;
        expect_single("files", file_id, affected)
    }

    /// Update the matched file record, or insert a new one.
    ///
    /// # Errors
    ///
    /// [`CatalogError::UnknownPath`] when inserting under an unrecorded
    /// directory.
    pub fn upsert_file(
        &self,
        lookup: &FileLookup,
        hash: &str,
        mtime: i64,
        epoch: RunEpoch,
    ) -> CatalogResult<()> {
        let conn = self.conn()?;

        if let Some(record) = &lookup.record {
            log::debug!(
                "Updating file record {} ({}): mtime {} hash {}",
                record.file_id,
                lookup.rel_path(),
                mtime,
                hash
            );
            let affected = conn
                .execute(
                    "UPDATE files SET hash = ?1, mtime_epoch = ?2 WHERE file_id = ?3",
                    params![hash, mtime, record.file_id],
                )
                .map_err(storage("update file"))?;
            return expect_single("files", record.file_id, affected);
        }

        if !lookup.descriptor.is_recorded() {
            return Err(CatalogError::UnknownPath {
                filename: lookup.rel_path(),
            });
        }

        log::debug!(
            "Inserting file record ({}): mtime {} hash {}",
            lookup.rel_path(),
            mtime,
            hash
        );
        conn.execute(
            "INSERT INTO files (path_id, filename, hash, mtime_epoch, last_check_epoch)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                lookup.descriptor.path_id(),
                lookup.filename,
                hash,
                mtime,
                epoch.as_unix()
            ],
        )
        .map_err(storage("insert file"))?;
        Ok(())
    }

    /// Visit every record of `kind` not touched since `epoch`.
    ///
    /// Nothing is deleted; call [`CatalogStore::prune_stale`] afterwards.
    pub fn sweep_stale<F>(&self, kind: EntityKind, epoch: RunEpoch, mut visit: F) -> CatalogResult<usize>
    where
        F: FnMut(StaleRecord),
    {
        let conn = self.conn()?;
        let query = match kind {
            EntityKind::File => {
                "SELECT p.rel_path, f.filename
                 FROM files f
                 JOIN paths p ON p.path_id = f.path_id
                 WHERE f.last_check_epoch < ?1
                 ORDER BY p.rel_path, f.filename"
            }
            EntityKind::Path => {
                "SELECT p.rel_path, NULL
                 FROM paths p
                 WHERE p.last_check_epoch < ?1
                 ORDER BY p.rel_path"
            }
        };

        let mut stmt = conn.prepare(query).map_err(storage("prepare sweep"))?;
        let mut rows = stmt
            .query([epoch.as_unix()])
            .map_err(storage("sweep stale records"))?;

        let mut n = 0;
        while let Some(row) = rows.next().map_err(storage("sweep stale records"))? {
            let rel_path: String = row.get(0).map_err(storage("read stale record"))?;
            let filename: Option<String> = row.get(1).map_err(storage("read stale record"))?;
            let rel_path = match filename {
                Some(name) => join_rel(&rel_path, &name),
                None => rel_path,
            };
            visit(StaleRecord { kind, rel_path });
            n += 1;
        }

        log::debug!("Swept {n} stale {kind} record(s)");
        Ok(n)
    }

    /// Delete every record of `kind` not touched since `epoch`.
    pub fn prune_stale(&self, kind: EntityKind, epoch: RunEpoch) -> CatalogResult<usize> {
        let query = format!(
            "DELETE FROM {} WHERE last_check_epoch < ?1",
            kind.table()
        );
        let affected = self
            .conn()?
            .execute(&query, [epoch.as_unix()])
            .map_err(storage("prune stale records"))?;

        log::debug!("Pruned {affected} old {kind} record(s)");
        Ok(affected)
    }

    /// Resolve a relative path first as a directory, then as
    /// `(parent directory, filename)`.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NotFound`] if neither interpretation has a digest.
    pub fn resolve(&self, rel_path: &str) -> CatalogResult<Resolved> {
        let rel_path = normalize_rel_path(rel_path);
        let lookup = self.lookup_path(&rel_path)?;

        if let Some(record) = lookup.record {
            let hash = record
                .hash
                .ok_or_else(|| CatalogError::NotFound(display_rel(&rel_path)))?;
            return Ok(Resolved {
                rel_path,
                path_id: record.path_id,
                filename: None,
                file_id: None,
                hash,
            });
        }

        if rel_path.is_empty() {
            return Err(CatalogError::NotFound(display_rel(&rel_path)));
        }

        let (parent, filename) = split_rel(&rel_path);
        let parent_record = self
            .lookup_path(parent)?
            .record
            .ok_or_else(|| CatalogError::NotFound(rel_path.clone()))?;

        let descriptor = PathDescriptor::recorded(parent, parent_record.path_id);
        let file = self
            .lookup_file(&descriptor, filename)?
            .record
            .ok_or_else(|| CatalogError::NotFound(rel_path.clone()))?;

        Ok(Resolved {
            rel_path: parent.to_string(),
            path_id: parent_record.path_id,
            filename: Some(file.filename),
            file_id: Some(file.file_id),
            hash: file.hash,
        })
    }

    /// Most recent `last_check_epoch` across both tables.
    pub fn latest_epoch(&self) -> CatalogResult<Option<RunEpoch>> {
        let latest: Option<i64> = self
            .conn()?
            .query_row(
                "SELECT MAX(e) FROM (
                     SELECT MAX(last_check_epoch) AS e FROM paths
                     UNION ALL
                     SELECT MAX(last_check_epoch) AS e FROM files
                 )",
                [],
                |row| row.get(0),
            )
            .map_err(storage("read latest epoch"))?;
        Ok(latest.map(RunEpoch::from_unix))
    }

    /// Number of records of `kind`.
    pub fn count(&self, kind: EntityKind) -> CatalogResult<usize> {
        let query = format!("SELECT COUNT(*) FROM {}", kind.table());
        let n: i64 = self
            .conn()?
            .query_row(&query, [], |row| row.get(0))
            .map_err(storage("count records"))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }
}

/// Digest algorithm recorded in an existing catalog file.
///
/// `None` when the file does not exist or predates algorithm pinning. The
/// file is opened read-only and never created.
///
/// # Errors
///
/// [`CatalogError::Storage`] if the file cannot be read, or
/// [`CatalogError::Digest`] if it names an unknown algorithm.
pub fn recorded_algorithm(path: &Path) -> CatalogResult<Option<DigestAlgorithm>> {
    if !path.is_file() {
        return Ok(None);
    }

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(storage("open catalog read-only"))?;

    let has_info: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'catalog_info'",
            [],
            |row| row.get(0),
        )
        .map_err(storage("inspect schema"))?;
    if has_info == 0 {
        return Ok(None);
    }

    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM catalog_info WHERE key = 'hash_algorithm'",
            [],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()
        .map(Option::flatten)
        .map_err(storage("read catalog info"))?;

    Ok(value.map(|v| v.parse::<DigestAlgorithm>()).transpose()?)
}

fn display_rel(rel_path: &str) -> String {
    if rel_path.is_empty() {
        ".".to_string()
    } else {
        rel_path.to_string()
    }
}
