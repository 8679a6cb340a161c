//! Shelf Synchronization Library
//!
//! Reconciles a remote publication catalog with a local collection:
//! - Catalog feed fetching with pagination and per-identifier dedup
//! - Local scanning of the books and downloads directories
//! - Reconciliation into New / Update / Extraneous actions
//! - Downloads with collision checks and atomic in-place replacement
//! - Dry-run capability and a per-run report

pub mod catalog;
pub mod error;
pub mod executor;
pub mod package;
pub mod reconcile;
pub mod report;
pub mod scanner;

// Re-export main types and functions
pub use catalog::{CatalogEntry, CatalogSource, HttpCatalog};
pub use error::{Result, SyncError};
pub use executor::{Executor, Fetcher, HttpFetcher};
pub use package::{PackageMetadata, Revision};
pub use reconcile::{build_plan, PlanSummary, SyncAction, SyncPlan};
pub use report::{RunReport, Status, StatusLine};
pub use scanner::{DirectoryRole, LibraryScanner, LocalFile, LocalIndex, ScanWarning};

use std::path::PathBuf;

use tracing::info;

/// Configuration for one reconciliation run
///
/// Everything the run needs is passed in here; nothing is ambient, so the
/// core can be driven with in-memory stand-ins for the feed and filesystem.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Account identifier used to authenticate with the catalog
    pub account: String,
    /// URL of the catalog feed
    pub feed_url: String,
    /// Authoritative collection directory
    pub books_dir: PathBuf,
    /// Inbox directory for new acquisitions
    pub downloads_dir: PathBuf,
    /// Report actions without performing them
    pub dry_run: bool,
}

/// Run one full reconciliation pass against the remote catalog
pub async fn sync_shelf(config: &SyncConfig) -> Result<RunReport> {
    let catalog = HttpCatalog::new(&config.feed_url, &config.account)?;
    let fetcher = HttpFetcher::new(catalog.client().clone(), &config.account);
    sync_with(&catalog, fetcher, config).await
}

/// Like [`sync_shelf`], but over caller-supplied catalog source and fetcher
pub async fn sync_with<S, F>(source: &S, fetcher: F, config: &SyncConfig) -> Result<RunReport>
where
    S: CatalogSource + ?Sized,
    F: Fetcher,
{
    let entries = source.fetch_entries().await?;
    info!(count = entries.len(), "fetched catalog entries");

    let scanner = LibraryScanner::new(&config.books_dir, &config.downloads_dir);
    let index = scanner.build_index().await?;
    info!(count = index.len(), "indexed local collection");

    let plan = reconcile::build_plan(&entries, &index);
    info!(
        new = plan.summary.new,
        updates = plan.summary.updates,
        unchanged = plan.summary.unchanged,
        extraneous = plan.summary.extraneous,
        anomalies = plan.summary.anomalies,
        "reconciliation plan ready"
    );

    let executor = Executor::new(fetcher, &config.downloads_dir).dry_run(config.dry_run);
    let mut report = executor.execute(plan).await;
    report.add_warnings(index.warnings());
    Ok(report)
}

#[cfg(test)]
mod integration_tests;
