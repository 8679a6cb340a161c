//! Reconciliation planning between catalog entries and the local index

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::CatalogEntry;
use crate::scanner::{LocalFile, LocalIndex};

/// Actions that can come out of a reconciliation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncAction {
    /// Fetch a publication not present locally into the downloads inbox
    DownloadNew { entry: CatalogEntry },
    /// Replace a known local file, in place, with the catalog's newer revision
    DownloadUpdate {
        entry: CatalogEntry,
        target: LocalFile,
    },
    /// A local file whose identifier no longer appears in the catalog
    ReportExtraneous { file: LocalFile },
}

/// Summary of a reconciliation plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub total_actions: usize,
    pub new: usize,
    pub updates: usize,
    pub unchanged: usize,
    pub extraneous: usize,
    /// Local files claiming a newer revision than the catalog
    pub anomalies: usize,
}

/// A complete reconciliation plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPlan {
    pub actions: Vec<SyncAction>,
    pub summary: PlanSummary,
}

/// Build a reconciliation plan from catalog entries and the local index
///
/// Pure and deterministic: actions follow catalog entry order, with one
/// `ReportExtraneous` per unmatched local file appended last, sorted by
/// identifier. Identifiers are the only join key; revisions only separate
/// updated from unchanged. A local revision newer than the catalog's is an
/// anomaly: it is logged and counted but never downgraded.
pub fn build_plan(entries: &[CatalogEntry], index: &LocalIndex) -> SyncPlan {
    let mut actions = Vec::new();
    let mut summary = PlanSummary::default();

    for entry in entries {
        match index.get(&entry.identifier) {
            None => {
                summary.new += 1;
                actions.push(SyncAction::DownloadNew {
                    entry: entry.clone(),
                });
            }
            Some(local) => match local.revision.cmp(&entry.revision) {
                std::cmp::Ordering::Less => {
                    summary.updates += 1;
                    actions.push(SyncAction::DownloadUpdate {
                        entry: entry.clone(),
                        target: local.clone(),
                    });
                }
                std::cmp::Ordering::Equal => {
                    summary.unchanged += 1;
                }
                std::cmp::Ordering::Greater => {
                    summary.anomalies += 1;
                    warn!(
                        identifier = %entry.identifier,
                        path = %local.path.display(),
                        local = %local.revision,
                        catalog = %entry.revision,
                        "local file is newer than the catalog; not downgrading"
                    );
                }
            },
        }
    }

    let catalog_ids: HashSet<&str> = entries.iter().map(|e| e.identifier.as_str()).collect();
    let mut extraneous: Vec<&LocalFile> = index
        .files()
        .filter(|file| !catalog_ids.contains(file.identifier.as_str()))
        .collect();
    extraneous.sort_by(|a, b| a.identifier.cmp(&b.identifier));

    for file in extraneous {
        summary.extraneous += 1;
        actions.push(SyncAction::ReportExtraneous { file: file.clone() });
    }

    summary.total_actions = actions.len();
    SyncPlan { actions, summary }
}
