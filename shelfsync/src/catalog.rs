//! Catalog feed client producing catalog entries
//!
//! The feed is served as JSON pages, each holding a `publications` array and
//! an optional `next` link. Entries are deduplicated by identifier across
//! pages, keeping the instance with the higher revision.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::package::Revision;

/// Upper bound on `next` link traversal; a feed that long is malformed
const MAX_FEED_PAGES: usize = 1000;

/// One publication as described by the remote catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stable identifier, the only join key against local files
    pub identifier: String,
    /// Display title; never used for matching
    pub title: String,
    /// Display author; used for filename derivation
    pub author: String,
    /// Revision marker of the catalog's current version
    pub revision: Revision,
    /// Download reference for the publication's bytes
    pub href: String,
}

/// A finite, restartable producer of catalog entries
///
/// The production implementation is [`HttpCatalog`]; tests substitute
/// in-memory fixtures.
#[async_trait]
pub trait CatalogSource {
    async fn fetch_entries(&self) -> Result<Vec<CatalogEntry>>;
}

/// Wire shape of one feed page
#[derive(Debug, Deserialize)]
struct CatalogPage {
    #[serde(default)]
    publications: Vec<PageEntry>,
    #[serde(default)]
    next: Option<String>,
}

/// Wire shape of one feed entry; all fields optional so that missing
/// ones surface as feed format errors instead of opaque decode failures
#[derive(Debug, Deserialize)]
struct PageEntry {
    id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    author: Option<String>,
    updated: Option<String>,
    href: Option<String>,
}

impl PageEntry {
    fn into_entry(self) -> Result<CatalogEntry> {
        let identifier = self
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SyncError::feed_format("feed entry missing identifier"))?;
        let title = self.title.ok_or_else(|| {
            SyncError::feed_format(format!("feed entry '{identifier}' missing title"))
        })?;
        let updated = self.updated.ok_or_else(|| {
            SyncError::feed_format(format!("feed entry '{identifier}' missing revision"))
        })?;
        let revision = Revision::parse(&updated).ok_or_else(|| {
            SyncError::feed_format(format!(
                "feed entry '{identifier}' has malformed revision '{updated}'"
            ))
        })?;
        let href = self.href.ok_or_else(|| {
            SyncError::feed_format(format!("feed entry '{identifier}' missing download link"))
        })?;

        Ok(CatalogEntry {
            identifier,
            title,
            author: self.author.unwrap_or_default(),
            revision,
            href,
        })
    }
}

/// Catalog reader over authenticated HTTP
pub struct HttpCatalog {
    client: Client,
    feed_url: String,
    account: String,
}

impl HttpCatalog {
    /// Create a catalog client for the given feed URL and account
    pub fn new(feed_url: impl Into<String>, account: impl Into<String>) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("shelfsync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_client(feed_url, account, client))
    }

    /// Create a catalog client over a preconfigured HTTP client
    pub fn with_client(
        feed_url: impl Into<String>,
        account: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            client,
            feed_url: feed_url.into(),
            account: account.into(),
        }
    }

    /// The underlying HTTP client, shared with the download fetcher
    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn fetch_page(&self, url: &str) -> Result<CatalogPage> {
        debug!(%url, "fetching catalog page");

        let response = self
            .client
            .get(url)
            .basic_auth(&self.account, None::<&str>)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SyncError::auth(format!(
                    "catalog rejected account '{}'",
                    self.account
                )));
            }
            status if !status.is_success() => {
                return Err(SyncError::feed_format(format!(
                    "catalog returned HTTP {status} for '{url}'"
                )));
            }
            _ => {}
        }

        response.json::<CatalogPage>().await.map_err(|e| {
            if e.is_decode() {
                SyncError::feed_format(format!("undecodable feed page '{url}': {e}"))
            } else {
                SyncError::Transport(e)
            }
        })
    }
}

#[async_trait]
impl CatalogSource for HttpCatalog {
    async fn fetch_entries(&self) -> Result<Vec<CatalogEntry>> {
        let mut entries = Vec::new();
        let mut next = Some(self.feed_url.clone());
        let mut pages = 0usize;

        while let Some(url) = next {
            pages += 1;
            if pages > MAX_FEED_PAGES {
                return Err(SyncError::feed_format(format!(
                    "feed pagination did not terminate after {MAX_FEED_PAGES} pages"
                )));
            }

            let page = self.fetch_page(&url).await?;
            for raw in page.publications {
                entries.push(raw.into_entry()?);
            }
            next = page.next;
        }

        debug!(count = entries.len(), pages, "fetched catalog feed");
        Ok(dedup_by_identifier(entries))
    }
}

/// Collapse repeated identifiers to one entry each, keeping the higher
/// revision; first-seen feed order is preserved
pub fn dedup_by_identifier(entries: Vec<CatalogEntry>) -> Vec<CatalogEntry> {
    let mut order: Vec<String> = Vec::with_capacity(entries.len());
    let mut best: HashMap<String, CatalogEntry> = HashMap::with_capacity(entries.len());

    for entry in entries {
        let keep = match best.get(&entry.identifier) {
            None => {
                order.push(entry.identifier.clone());
                true
            }
            Some(existing) if existing.revision < entry.revision => {
                debug!(
                    identifier = %entry.identifier,
                    "feed repeats identifier; keeping higher revision"
                );
                true
            }
            Some(_) => false,
        };
        if keep {
            best.insert(entry.identifier.clone(), entry);
        }
    }

    order
        .into_iter()
        .filter_map(|identifier| best.remove(&identifier))
        .collect()
}
