//! Record and value types exchanged with the catalog store.

use std::fmt;

/// Identifier of a path record. `0` is reserved for "not recorded".
pub type PathId = i64;

/// Identifier of a file record.
pub type FileId = i64;

/// Sentinel path id for a directory whose record could not be created
/// because updates are disallowed.
pub const UNKNOWN_PATH_ID: PathId = 0;

/// Timestamp fixed at the start of a run.
///
/// Every touch and prune decision in one run compares against the same epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunEpoch(i64);

impl RunEpoch {
    /// Capture the current wall-clock time (Unix seconds).
    #[must_use]
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp())
    }

    /// Build an epoch from Unix seconds.
    #[must_use]
    pub fn from_unix(secs: i64) -> Self {
        Self(secs)
    }

    /// Unix seconds.
    #[must_use]
    pub fn as_unix(self) -> i64 {
        self.0
    }

    /// The later of `self` and one second past `latest`.
    ///
    /// Two runs landing in the same second would otherwise share an epoch,
    /// and records untouched by the second run would escape the sweep.
    #[must_use]
    pub fn after(self, latest: Option<RunEpoch>) -> Self {
        match latest {
            Some(latest) if latest.0 >= self.0 => Self(latest.0 + 1),
            _ => self,
        }
    }
}

impl fmt::Display for RunEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of catalog record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A file record.
    File,
    /// A directory (path) record.
    Path,
}

impl EntityKind {
    /// Lowercase name used in change reports.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Path => "path",
        }
    }

    pub(crate) fn table(self) -> &'static str {
        match self {
            Self::File => "files",
            Self::Path => "paths",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One scanned directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRecord {
    pub path_id: PathId,
    pub rel_path: String,
    /// Composed subtree digest; `None` until the first completed scan.
    pub hash: Option<String>,
    pub last_check_epoch: i64,
}

/// One scanned file under a [`PathRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub file_id: FileId,
    pub path_id: PathId,
    pub filename: String,
    pub hash: String,
    pub mtime_epoch: i64,
    pub last_check_epoch: i64,
}

/// A relative path paired with its record id, or [`UNKNOWN_PATH_ID`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathDescriptor {
    rel_path: String,
    path_id: PathId,
}

impl PathDescriptor {
    /// Descriptor for a directory that has a record.
    #[must_use]
    pub fn recorded(rel_path: impl Into<String>, path_id: PathId) -> Self {
        Self {
            rel_path: rel_path.into(),
            path_id,
        }
    }

    /// Descriptor for a directory without a record.
    #[must_use]
    pub fn unknown(rel_path: impl Into<String>) -> Self {
        Self {
            rel_path: rel_path.into(),
            path_id: UNKNOWN_PATH_ID,
        }
    }

    #[must_use]
    pub fn rel_path(&self) -> &str {
        &self.rel_path
    }

    #[must_use]
    pub fn path_id(&self) -> PathId {
        self.path_id
    }

    #[must_use]
    pub fn is_recorded(&self) -> bool {
        self.path_id != UNKNOWN_PATH_ID
    }
}

/// Result of looking a directory up by relative path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathLookup {
    pub rel_path: String,
    pub record: Option<PathRecord>,
}

impl PathLookup {
    #[must_use]
    pub fn was_found(&self) -> bool {
        self.record.is_some()
    }
}

/// Result of looking a file up under a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLookup {
    pub descriptor: PathDescriptor,
    pub filename: String,
    pub record: Option<FileRecord>,
}

impl FileLookup {
    #[must_use]
    pub fn was_found(&self) -> bool {
        self.record.is_some()
    }

    /// Stored digest, if the stored mtime equals `mtime`.
    #[must_use]
    pub fn cached_hash(&self, mtime: i64) -> Option<&str> {
        self.record
            .as_ref()
            .filter(|r| r.mtime_epoch == mtime)
            .map(|r| r.hash.as_str())
    }

    /// Relative path of the file (directory path joined with the filename).
    #[must_use]
    pub fn rel_path(&self) -> String {
        join_rel(self.descriptor.rel_path(), &self.filename)
    }
}

/// A record that was not touched during the current run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleRecord {
    pub kind: EntityKind,
    /// Relative path of the directory or file.
    pub rel_path: String,
}

/// Outcome of resolving a relative path for recall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Relative path of the directory (the parent, for files).
    pub rel_path: String,
    pub path_id: PathId,
    pub filename: Option<String>,
    pub file_id: Option<FileId>,
    pub hash: String,
}

/// Join a relative directory path and a child name with `/`.
///
/// The root is the empty string, so joining onto it yields the bare name.
#[must_use]
pub fn join_rel(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Split a relative path into `(parent, filename)`.
#[must_use]
pub fn split_rel(rel_path: &str) -> (&str, &str) {
    match rel_path.rfind('/') {
        Some(idx) => (&rel_path[..idx], &rel_path[idx + 1..]),
        None => ("", rel_path),
    }
}
