//! Publication package format: embedded metadata and filename derivation
//!
//! A package is a self-describing JSON document whose top-level `metadata`
//! object carries the identifier, title, and revision of the publication.
//! No external index file exists; the scan reads each package directly.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::catalog::CatalogEntry;
use crate::error::{Result, SyncError};

/// File extension for publication packages
pub const PACKAGE_EXTENSION: &str = "pub";

/// Opaque revision marker, ordered by publication time
///
/// Revisions are RFC 3339 timestamps in the feed and in local packages.
/// Ordering is chronological, never lexical.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Revision(DateTime<Utc>);

impl Revision {
    pub fn new(timestamp: DateTime<Utc>) -> Self {
        Self(timestamp)
    }

    /// Parse an RFC 3339 timestamp into a revision
    pub fn parse(text: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|t| Self(t.with_timezone(&Utc)))
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// Metadata embedded in a publication package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub identifier: String,
    pub title: String,
    pub revision: Revision,
}

/// On-disk shape of a package; fields other than `metadata` are ignored
#[derive(Debug, Deserialize)]
struct PackageDocument {
    metadata: PackageMetadata,
}

/// Read the embedded metadata of a package file
pub async fn read_metadata(path: impl AsRef<Path>) -> Result<PackageMetadata> {
    let path = path.as_ref();

    let raw = fs::read(path)
        .await
        .map_err(|e| SyncError::package_error(path, format!("failed to read: {e}")))?;

    let document: PackageDocument = serde_json::from_slice(&raw)
        .map_err(|e| SyncError::package_error(path, format!("invalid metadata: {e}")))?;

    Ok(document.metadata)
}

/// Whether a path looks like a publication package
pub fn is_package(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(PACKAGE_EXTENSION))
}

const FILENAME_REPLACEMENTS: [(&str, &str); 6] = [
    ("/", "-"),
    ("\u{2018}", "'"),
    ("\u{2019}", "'"),
    ("\"", "'"),
    ("\u{201c}", "'"),
    ("\u{201d}", "'"),
];

/// Derive the on-disk file name for a catalog entry
///
/// Multi-word authors are flipped to "Family, Given" so files group by
/// family name when sorted.
pub fn filename_for(entry: &CatalogEntry) -> String {
    let names: Vec<&str> = entry.author.split_whitespace().collect();
    let author = match names.split_last() {
        Some((family, given)) if !given.is_empty() => format!("{family}, {}", given.join(" ")),
        _ => entry.author.trim().to_string(),
    };

    let stem = if author.is_empty() {
        entry.title.clone()
    } else {
        format!("{author} - {}", entry.title)
    };

    let mut name = format!("{stem}.{PACKAGE_EXTENSION}");
    for (from, to) in FILENAME_REPLACEMENTS {
        name = name.replace(from, to);
    }
    name
}
