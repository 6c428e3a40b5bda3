//! Creation of the buckets a reconciliation found missing.

use async_trait::async_trait;
use portalctl_client::StorageClient;
use portalctl_core::{AppError, NamedResource, ReconciliationReport};
use serde::Serialize;
use tracing::error;

/// Something that can create a storage bucket.
#[async_trait]
pub trait BucketCreator: Send + Sync {
    async fn create_bucket(&self, resource: &NamedResource) -> Result<(), AppError>;
}

#[async_trait]
impl BucketCreator for StorageClient {
    async fn create_bucket(&self, resource: &NamedResource) -> Result<(), AppError> {
        StorageClient::create_bucket(self, resource).await
    }
}

/// Outcome of creating one missing bucket.
#[derive(Debug, Clone, Serialize)]
pub struct CreationOutcome {
    pub name: String,
    pub created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Creates every manifest bucket listed in `report.missing`, in manifest order.
///
/// A failed creation is recorded and the remaining buckets are still
/// attempted. With `dry_run` the creator is never called.
pub async fn create_missing<C>(
    buckets: &[NamedResource],
    report: &ReconciliationReport,
    creator: &C,
    dry_run: bool,
) -> Vec<CreationOutcome>
where
    C: BucketCreator + ?Sized,
{
    let mut outcomes = Vec::with_capacity(report.missing.len());

    for resource in buckets.iter().filter(|b| report.missing.contains(&b.name)) {
        if dry_run {
            outcomes.push(CreationOutcome {
                name: resource.name.clone(),
                created: false,
                error: None,
            });
            continue;
        }

        let outcome = match creator.create_bucket(resource).await {
            Ok(()) => CreationOutcome {
                name: resource.name.clone(),
                created: true,
                error: None,
            },
            Err(e) => {
                error!("Failed to create bucket {}: {}", resource.name, e);
                CreationOutcome {
                    name: resource.name.clone(),
                    created: false,
                    error: Some(e.to_string()),
                }
            }
        };
        outcomes.push(outcome);
    }

    outcomes
}

/// Returns true if any creation failed.
pub fn any_failed(outcomes: &[CreationOutcome]) -> bool {
    outcomes.iter().any(|o| o.error.is_some())
}
