//! End-to-end tests over in-memory catalog and fetcher stand-ins

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::TempDir;
use tokio::fs;

use crate::catalog::{CatalogEntry, CatalogSource};
use crate::error::Result;
use crate::executor::Fetcher;
use crate::package::Revision;
use crate::report::Status;
use crate::{sync_with, SyncConfig, SyncError};

struct FixtureCatalog(Vec<CatalogEntry>);

#[async_trait]
impl CatalogSource for FixtureCatalog {
    async fn fetch_entries(&self) -> Result<Vec<CatalogEntry>> {
        Ok(self.0.clone())
    }
}

struct MapFetcher(HashMap<String, Bytes>);

#[async_trait]
impl Fetcher for MapFetcher {
    async fn fetch(&self, href: &str) -> Result<Bytes> {
        self.0.get(href).cloned().ok_or_else(|| {
            SyncError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                format!("no body for '{href}'"),
            ))
        })
    }
}

struct FailingCatalog;

#[async_trait]
impl CatalogSource for FailingCatalog {
    async fn fetch_entries(&self) -> Result<Vec<CatalogEntry>> {
        Err(SyncError::auth("catalog rejected account 'reader@example.org'"))
    }
}

fn entry(id: &str, author: &str, title: &str, updated: &str) -> CatalogEntry {
    CatalogEntry {
        identifier: id.to_string(),
        title: title.to_string(),
        author: author.to_string(),
        revision: Revision::parse(updated).unwrap(),
        href: format!("https://example.org/files/{id}"),
    }
}

async fn write_package(dir: &Path, name: &str, id: &str, updated: &str) -> PathBuf {
    let path = dir.join(name);
    let body = format!(
        r#"{{"metadata": {{"identifier": "{id}", "title": "{name}", "revision": "{updated}"}}}}"#
    );
    fs::write(&path, body).await.unwrap();
    path
}

struct Collection {
    _temp: TempDir,
    books: PathBuf,
    downloads: PathBuf,
}

async fn collection() -> Collection {
    let temp = TempDir::new().unwrap();
    let books = temp.path().join("books");
    let downloads = temp.path().join("downloads");
    fs::create_dir_all(&books).await.unwrap();
    fs::create_dir_all(&downloads).await.unwrap();
    Collection {
        _temp: temp,
        books,
        downloads,
    }
}

fn config(c: &Collection, dry_run: bool) -> SyncConfig {
    SyncConfig {
        account: "reader@example.org".to_string(),
        feed_url: "https://example.org/feed".to_string(),
        books_dir: c.books.clone(),
        downloads_dir: c.downloads.clone(),
        dry_run,
    }
}

#[tokio::test]
async fn full_run_downloads_updates_and_reports() {
    let c = collection().await;

    // known title at an old revision, and one the catalog no longer has
    let stale = write_package(&c.books, "stale.pub", "url:example:stale", "2023-01-01T00:00:00Z").await;
    let orphan =
        write_package(&c.books, "orphan.pub", "url:example:orphan", "2023-01-01T00:00:00Z").await;

    let catalog = FixtureCatalog(vec![
        entry(
            "url:example:fresh",
            "Anne Author",
            "Fresh Arrival",
            "2024-01-01T00:00:00Z",
        ),
        entry(
            "url:example:stale",
            "Old Hand",
            "Stale Title",
            "2024-02-01T00:00:00Z",
        ),
    ]);
    let fetcher = MapFetcher(HashMap::from([
        (
            "https://example.org/files/url:example:fresh".to_string(),
            Bytes::from_static(b"fresh bytes"),
        ),
        (
            "https://example.org/files/url:example:stale".to_string(),
            Bytes::from_static(b"stale replacement"),
        ),
    ]));

    let report = sync_with(&catalog, fetcher, &config(&c, false))
        .await
        .unwrap();

    assert!(report.is_successful(), "failures: {:?}", report.failures);
    assert_eq!(report.count(Status::New), 1);
    assert_eq!(report.count(Status::Update), 1);
    assert_eq!(report.count(Status::Extraneous), 1);

    // the new acquisition landed in the downloads inbox under a derived name
    let inbox = c.downloads.join("Author, Anne - Fresh Arrival.pub");
    assert_eq!(fs::read(&inbox).await.unwrap(), b"fresh bytes".to_vec());

    // the stale title was replaced in place, in books
    assert_eq!(
        fs::read(&stale).await.unwrap(),
        b"stale replacement".to_vec()
    );

    // the orphan was reported but never touched
    assert!(orphan.exists());
    let extraneous: Vec<_> = report
        .lines
        .iter()
        .filter(|l| l.status == Status::Extraneous)
        .collect();
    assert_eq!(extraneous[0].path, orphan);
}

#[tokio::test]
async fn dry_run_changes_nothing_but_reports_everything() {
    let c = collection().await;
    let stale = write_package(&c.books, "stale.pub", "url:example:stale", "2023-01-01T00:00:00Z").await;
    let before = fs::read(&stale).await.unwrap();

    let catalog = FixtureCatalog(vec![
        entry(
            "url:example:fresh",
            "Anne Author",
            "Fresh Arrival",
            "2024-01-01T00:00:00Z",
        ),
        entry(
            "url:example:stale",
            "Old Hand",
            "Stale Title",
            "2024-02-01T00:00:00Z",
        ),
    ]);

    // no bodies: a dry run must never fetch
    let report = sync_with(&catalog, MapFetcher(HashMap::new()), &config(&c, true))
        .await
        .unwrap();

    assert!(report.is_successful());
    assert_eq!(report.count(Status::New), 1);
    assert_eq!(report.count(Status::Update), 1);
    assert_eq!(fs::read(&stale).await.unwrap(), before);

    let mut inbox = fs::read_dir(&c.downloads).await.unwrap();
    assert!(inbox.next_entry().await.unwrap().is_none());
}

#[tokio::test]
async fn unchanged_title_in_downloads_is_left_alone() {
    let c = collection().await;
    let path = write_package(
        &c.downloads,
        "d.pub",
        "url:example:d",
        "2024-01-01T00:00:00Z",
    )
    .await;
    let before = fs::read(&path).await.unwrap();

    let catalog = FixtureCatalog(vec![entry(
        "url:example:d",
        "Anne Author",
        "D",
        "2024-01-01T00:00:00Z",
    )]);

    let report = sync_with(&catalog, MapFetcher(HashMap::new()), &config(&c, false))
        .await
        .unwrap();

    assert!(report.is_successful());
    assert!(report.lines.is_empty());
    assert_eq!(fs::read(&path).await.unwrap(), before);
}

#[tokio::test]
async fn scan_warnings_surface_in_the_report() {
    let c = collection().await;
    fs::write(c.books.join("broken.pub"), b"not json")
        .await
        .unwrap();

    let catalog = FixtureCatalog(Vec::new());
    let report = sync_with(&catalog, MapFetcher(HashMap::new()), &config(&c, false))
        .await
        .unwrap();

    assert!(report.is_successful());
    assert_eq!(report.warnings.len(), 1);
}

#[tokio::test]
async fn failed_download_marks_the_run_unsuccessful_but_continues() {
    let c = collection().await;

    let catalog = FixtureCatalog(vec![
        entry(
            "url:example:lost",
            "Anne Author",
            "Lost",
            "2024-01-01T00:00:00Z",
        ),
        entry(
            "url:example:found",
            "Anne Author",
            "Found",
            "2024-01-01T00:00:00Z",
        ),
    ]);
    let fetcher = MapFetcher(HashMap::from([(
        "https://example.org/files/url:example:found".to_string(),
        Bytes::from_static(b"found bytes"),
    )]));

    let report = sync_with(&catalog, fetcher, &config(&c, false)).await.unwrap();

    assert!(!report.is_successful());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.count(Status::New), 1);
    assert!(c.downloads.join("Author, Anne - Found.pub").exists());
}

#[tokio::test]
async fn fatal_catalog_error_aborts_the_run() {
    let c = collection().await;

    let result = sync_with(&FailingCatalog, MapFetcher(HashMap::new()), &config(&c, false)).await;

    match result {
        Err(e) => assert!(e.is_fatal()),
        Ok(_) => panic!("expected a fatal auth error"),
    }
}
