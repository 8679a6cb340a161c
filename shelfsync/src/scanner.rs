//! Local collection scanning and index construction
//!
//! Scans the books and downloads directories for publication packages and
//! builds a mapping from identifier to local file. A file that cannot be
//! parsed is skipped with a warning; only a directory that cannot be walked
//! at all aborts the scan.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Result, SyncError};
use crate::package::{self, Revision};

/// Which configured directory a local file was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirectoryRole {
    /// The authoritative collection
    Books,
    /// The inbox for new, unreviewed acquisitions
    Downloads,
}

impl fmt::Display for DirectoryRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Books => write!(f, "books"),
            Self::Downloads => write!(f, "downloads"),
        }
    }
}

/// A publication package found on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalFile {
    pub path: PathBuf,
    pub identifier: String,
    pub title: String,
    pub revision: Revision,
    pub role: DirectoryRole,
}

/// A file the scan recognized but could not use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanWarning {
    pub path: PathBuf,
    pub message: String,
}

/// Identifier-keyed snapshot of the local collection
///
/// Read-only once built; reconciliation and execution never mutate it.
#[derive(Debug, Default)]
pub struct LocalIndex {
    files: HashMap<String, LocalFile>,
    warnings: Vec<ScanWarning>,
}

impl LocalIndex {
    pub fn get(&self, identifier: &str) -> Option<&LocalFile> {
        self.files.get(identifier)
    }

    pub fn files(&self) -> impl Iterator<Item = &LocalFile> {
        self.files.values()
    }

    pub fn warnings(&self) -> &[ScanWarning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Insert a scanned file, resolving identifier collisions
    ///
    /// Books is authoritative once a title graduates out of downloads: a
    /// books copy replaces a downloads copy of the same identifier. Within
    /// one role the first file in scan order wins. The losing file is kept
    /// out of the index and recorded as a warning.
    fn insert(&mut self, file: LocalFile) {
        let Some(existing) = self.files.get(&file.identifier) else {
            self.files.insert(file.identifier.clone(), file);
            return;
        };

        let graduates =
            existing.role == DirectoryRole::Downloads && file.role == DirectoryRole::Books;
        let (path, message) = if graduates {
            (
                existing.path.clone(),
                format!(
                    "shadowed by books copy '{}' for identifier '{}'",
                    file.path.display(),
                    file.identifier
                ),
            )
        } else {
            (
                file.path.clone(),
                format!(
                    "duplicate of '{}' for identifier '{}'",
                    existing.path.display(),
                    file.identifier
                ),
            )
        };

        self.push_warning(path, message);
        if graduates {
            self.files.insert(file.identifier.clone(), file);
        }
    }

    fn push_warning(&mut self, path: PathBuf, message: String) {
        warn!(path = %path.display(), "{message}");
        self.warnings.push(ScanWarning { path, message });
    }
}

/// Scanner over the two configured collection directories
pub struct LibraryScanner {
    books_dir: PathBuf,
    downloads_dir: PathBuf,
}

impl LibraryScanner {
    pub fn new(books_dir: impl Into<PathBuf>, downloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            books_dir: books_dir.into(),
            downloads_dir: downloads_dir.into(),
        }
    }

    /// Scan both directories and build the local index
    ///
    /// Downloads is scanned first so that a books copy of the same
    /// identifier takes precedence.
    pub async fn build_index(&self) -> Result<LocalIndex> {
        let mut index = LocalIndex::default();
        self.scan_role(&self.downloads_dir, DirectoryRole::Downloads, &mut index)
            .await?;
        self.scan_role(&self.books_dir, DirectoryRole::Books, &mut index)
            .await?;
        Ok(index)
    }

    async fn scan_role(
        &self,
        root: &Path,
        role: DirectoryRole,
        index: &mut LocalIndex,
    ) -> Result<()> {
        if !root.is_dir() {
            return Err(SyncError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{role} directory '{}' does not exist", root.display()),
            )));
        }

        // Sorted walk, symlinks never followed, for a deterministic index
        let mut paths = Vec::new();
        for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_file() && package::is_package(entry.path()) {
                paths.push(entry.into_path());
            }
        }

        debug!(root = %root.display(), %role, count = paths.len(), "scanning packages");

        for path in paths {
            match package::read_metadata(&path).await {
                Ok(metadata) => index.insert(LocalFile {
                    path,
                    identifier: metadata.identifier,
                    title: metadata.title,
                    revision: metadata.revision,
                    role,
                }),
                Err(e) => index.push_warning(path, format!("skipped: {e}")),
            }
        }

        Ok(())
    }
}
