//! Run reporting: status lines, failures, and the final summary

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::scanner::ScanWarning;

/// Outcome status of one reconciled item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Found in the catalog but not locally
    New,
    /// Newer revision found in the catalog
    Update,
    /// Local file not found in the catalog
    Extraneous,
}

impl Status {
    /// Single-letter marker used in CLI output
    pub fn marker(&self) -> char {
        match self {
            Self::New => 'N',
            Self::Update => 'U',
            Self::Extraneous => 'X',
        }
    }
}

/// One reported item, in execution order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusLine {
    pub status: Status,
    pub path: PathBuf,
}

/// A failed action, isolated from the rest of the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionFailure {
    pub description: String,
    pub error: String,
}

/// Outcome of one full reconciliation run
#[derive(Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub lines: Vec<StatusLine>,
    pub failures: Vec<ActionFailure>,
    pub warnings: Vec<ScanWarning>,
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            lines: Vec::new(),
            failures: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub(crate) fn record(&mut self, status: Status, path: PathBuf) {
        self.lines.push(StatusLine { status, path });
    }

    pub(crate) fn record_failure(&mut self, description: String, error: &SyncError) {
        self.failures.push(ActionFailure {
            description,
            error: error.to_string(),
        });
    }

    pub(crate) fn add_warnings(&mut self, warnings: &[ScanWarning]) {
        self.warnings.extend_from_slice(warnings);
    }

    pub(crate) fn complete(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Count of reported items with the given status
    pub fn count(&self, status: Status) -> usize {
        self.lines.iter().filter(|l| l.status == status).count()
    }

    /// A run succeeds only when its failure set is empty
    pub fn is_successful(&self) -> bool {
        self.failures.is_empty()
    }

    /// One-line human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "{} new, {} updated, {} extraneous, {} failed, {} warnings",
            self.count(Status::New),
            self.count(Status::Update),
            self.count(Status::Extraneous),
            self.failures.len(),
            self.warnings.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_summary() {
        let mut report = RunReport::new();
        report.record(Status::New, PathBuf::from("a.pub"));
        report.record(Status::New, PathBuf::from("b.pub"));
        report.record(Status::Update, PathBuf::from("c.pub"));
        report.record(Status::Extraneous, PathBuf::from("d.pub"));

        assert_eq!(report.count(Status::New), 2);
        assert_eq!(report.count(Status::Update), 1);
        assert_eq!(report.count(Status::Extraneous), 1);
        assert!(report.is_successful());
        assert_eq!(report.summary(), "2 new, 1 updated, 1 extraneous, 0 failed, 0 warnings");
    }

    #[test]
    fn failures_make_the_run_unsuccessful() {
        let mut report = RunReport::new();
        report.record_failure(
            "download 'Alpha'".to_string(),
            &SyncError::collision("/tmp/alpha.pub"),
        );

        assert!(!report.is_successful());
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].error.contains("already exists"));
    }
}
