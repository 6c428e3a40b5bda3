//! Resource reconciliation: compare the resources a deployment expects against
//! what the backend directory currently lists.
//!
//! The reconciler is read-only. It performs exactly one directory fetch per
//! call and never retries; callers that want retries wrap the directory.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::AppError;
use crate::models::NamedResource;

/// A backend directory that can list the names of the resources it holds.
///
/// Implemented by the storage bucket client and the Postgres table catalog.
#[async_trait]
pub trait ResourceDirectory: Send + Sync {
    /// Returns the names currently present in the directory.
    async fn list_names(&self) -> Result<BTreeSet<String>, AppError>;
}

/// Result of comparing expected names against one directory snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub expected: BTreeSet<String>,
    pub observed: BTreeSet<String>,
    /// `expected - observed`
    pub missing: BTreeSet<String>,
}

impl ReconciliationReport {
    /// Builds a report from the two name sets.
    pub fn compute(expected: BTreeSet<String>, observed: BTreeSet<String>) -> Self {
        let missing = expected.difference(&observed).cloned().collect();
        Self {
            expected,
            observed,
            missing,
        }
    }

    /// Names present in the directory that nobody declared.
    pub fn extra(&self) -> BTreeSet<String> {
        self.observed.difference(&self.expected).cloned().collect()
    }

    /// Returns true if every expected name was observed.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Collects the names of a resource list.
pub fn expected_names(resources: &[NamedResource]) -> BTreeSet<String> {
    resources.iter().map(|r| r.name.clone()).collect()
}

/// Fetches the directory once and diffs it against `expected`.
///
/// Names are compared verbatim: `Avatars` and `avatars` are two different
/// resources.
///
/// # Errors
///
/// Returns `AppError::DirectoryUnavailable` carrying the fetch error if the
/// directory cannot be listed. No partial report is produced.
pub async fn reconcile<D>(
    expected: BTreeSet<String>,
    directory: &D,
) -> Result<ReconciliationReport, AppError>
where
    D: ResourceDirectory + ?Sized,
{
    let observed = directory
        .list_names()
        .await
        .map_err(|e| AppError::DirectoryUnavailable(e.to_string()))?;

    debug!(
        expected = expected.len(),
        observed = observed.len(),
        "Fetched directory snapshot"
    );

    let report = ReconciliationReport::compute(expected, observed);
    info!(
        "Reconciled {} expected resources: {} missing",
        report.expected.len(),
        report.missing.len()
    );

    Ok(report)
}
