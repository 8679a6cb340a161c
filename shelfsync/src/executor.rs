//! Carries out a reconciliation plan: downloads, in-place updates, and
//! extraneous reports
//!
//! Each action is isolated: a failure is recorded in the report and the run
//! continues with the remaining actions.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tokio::fs;
use tracing::{debug, info};

use crate::catalog::CatalogEntry;
use crate::error::{Result, SyncError};
use crate::package;
use crate::reconcile::{SyncAction, SyncPlan};
use crate::report::{RunReport, Status};

/// Fetches the full byte content behind a download reference
///
/// The production implementation is [`HttpFetcher`]; tests substitute
/// in-memory maps.
#[async_trait]
pub trait Fetcher {
    async fn fetch(&self, href: &str) -> Result<Bytes>;
}

/// Fetcher over authenticated HTTP, sharing the catalog's client
pub struct HttpFetcher {
    client: Client,
    account: String,
}

impl HttpFetcher {
    pub fn new(client: Client, account: impl Into<String>) -> Self {
        Self {
            client,
            account: account.into(),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, href: &str) -> Result<Bytes> {
        let response = self
            .client
            .get(href)
            .basic_auth(&self.account, None::<&str>)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?)
    }
}

/// Executes the actions of a reconciliation plan
pub struct Executor<F: Fetcher> {
    fetcher: F,
    downloads_dir: PathBuf,
    dry_run: bool,
}

impl<F: Fetcher> Executor<F> {
    pub fn new(fetcher: F, downloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            downloads_dir: downloads_dir.into(),
            dry_run: false,
        }
    }

    /// When set, classify and report every action but perform no fetch and
    /// no filesystem mutation
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Execute every action in the plan, isolating per-action failures
    pub async fn execute(&self, plan: SyncPlan) -> RunReport {
        let mut report = RunReport::new();

        info!(
            actions = plan.actions.len(),
            dry_run = self.dry_run,
            "executing reconciliation plan"
        );

        for action in plan.actions {
            if let Err(e) = self.execute_action(&action, &mut report).await {
                report.record_failure(describe(&action), &e);
            }
        }

        report.complete();
        report
    }

    async fn execute_action(&self, action: &SyncAction, report: &mut RunReport) -> Result<()> {
        match action {
            SyncAction::DownloadNew { entry } => {
                let destination = self.downloads_dir.join(package::filename_for(entry));
                self.download_new(entry, &destination).await?;
                report.record(Status::New, destination);
            }
            SyncAction::DownloadUpdate { entry, target } => {
                self.download_update(entry, &target.path).await?;
                report.record(Status::Update, target.path.clone());
            }
            SyncAction::ReportExtraneous { file } => {
                report.record(Status::Extraneous, file.path.clone());
            }
        }
        Ok(())
    }

    /// Place a never-seen publication into the downloads inbox
    ///
    /// An occupied destination means the local index and the plan disagree
    /// about what exists; the file is never overwritten.
    async fn download_new(&self, entry: &CatalogEntry, destination: &Path) -> Result<()> {
        if fs::try_exists(destination).await? {
            return Err(SyncError::collision(destination));
        }

        if self.dry_run {
            debug!(path = %destination.display(), "dry run: would download");
            return Ok(());
        }

        let body = self.fetcher.fetch(&entry.href).await?;
        write_replace(destination, &body).await
    }

    /// Replace a known local file with the catalog's newer revision
    async fn download_update(&self, entry: &CatalogEntry, target: &Path) -> Result<()> {
        if self.dry_run {
            debug!(path = %target.display(), "dry run: would update");
            return Ok(());
        }

        // The fetch completes before the target is touched; a failure at
        // any point leaves the existing file byte-identical.
        let body = self.fetcher.fetch(&entry.href).await?;
        write_replace(target, &body).await
    }
}

/// Write bytes to a staging file beside `destination`, then rename into place
async fn write_replace(destination: &Path, body: &[u8]) -> Result<()> {
    let staging = staging_path(destination);

    if let Err(e) = fs::write(&staging, body).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&staging, destination).await {
        let _ = fs::remove_file(&staging).await;
        return Err(e.into());
    }

    Ok(())
}

fn staging_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

fn describe(action: &SyncAction) -> String {
    match action {
        SyncAction::DownloadNew { entry } => format!("download '{}'", entry.title),
        SyncAction::DownloadUpdate { target, .. } => {
            format!("update '{}'", target.path.display())
        }
        SyncAction::ReportExtraneous { file } => {
            format!("report '{}'", file.path.display())
        }
    }
}
