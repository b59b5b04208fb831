//! Single-level directory listing.
//!
//! Children come back sorted byte-wise by file name; that order is part of
//! the digest contract. Symlinks are never followed for recursion: a link
//! is listed as a non-directory entry.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{ScanError, ScanResult};

/// One immediate child of a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildEntry {
    /// File name (UTF-8).
    pub name: String,
    /// Full filesystem path.
    pub path: PathBuf,
    /// Whether the child is a real directory (not a link to one).
    pub is_dir: bool,
}

/// List the immediate children of `dir`, sorted by name.
///
/// # Errors
///
/// - [`ScanError::NotFound`] / [`ScanError::NotADirectory`] if `dir` is not
///   an existing directory.
/// - [`ScanError::NonUtf8Name`] if a child's name is not valid UTF-8.
/// - Any other I/O failure while reading the directory.
pub fn list_children(dir: &Path) -> ScanResult<Vec<ChildEntry>> {
    let meta = std::fs::metadata(dir).map_err(|e| ScanError::from_io(dir, e))?;
    if !meta.is_dir() {
        return Err(ScanError::NotADirectory(dir.to_path_buf()));
    }

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    let mut children = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| walk_error(dir, e))?;

        let name = entry
            .file_name()
            .to_str()
            .ok_or_else(|| ScanError::NonUtf8Name(entry.path().to_path_buf()))?
            .to_string();

        children.push(ChildEntry {
            name,
            is_dir: entry.file_type().is_dir(),
            path: entry.into_path(),
        });
    }

    log::trace!("Listed {} child(ren) of {}", children.len(), dir.display());
    Ok(children)
}

fn walk_error(dir: &Path, error: walkdir::Error) -> ScanError {
    let path = error.path().unwrap_or(dir).to_path_buf();
    match error.into_io_error() {
        Some(io) => ScanError::from_io(&path, io),
        None => ScanError::Io {
            path,
            source: std::io::Error::other("directory walk failed"),
        },
    }
}
