use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use portalctl_core::error::AppError;
use portalctl_core::{HttpConfig, ResourceDirectory};
use tokio::time::sleep;
use tracing::warn;

/// Retries a directory listing on transient failures.
///
/// Clients never retry on their own; callers that want retries wrap the
/// directory explicitly. Only errors with [`AppError::is_retryable`] are
/// retried, with a delay of `base_delay * attempt` between attempts (doubled
/// after a rate limit).
///
/// # Examples
///
/// ```no_run
/// use portalctl_client::{RetryingDirectory, StorageClient};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let storage = StorageClient::new("https://abc.supabase.co", "service-role-key")?;
/// let directory = RetryingDirectory::new(storage, 3);
/// # Ok(())
/// # }
/// ```
pub struct RetryingDirectory<D> {
    inner: D,
    max_attempts: u32,
    base_delay: Duration,
}

impl<D> RetryingDirectory<D> {
    /// Wraps `inner`, allowing up to `max_attempts` listings in total.
    pub fn new(inner: D, max_attempts: u32) -> Self {
        Self::with_delay(inner, max_attempts, HttpConfig::default().retry_base_delay)
    }

    pub fn with_delay(inner: D, max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

#[async_trait]
impl<D> ResourceDirectory for RetryingDirectory<D>
where
    D: ResourceDirectory,
{
    async fn list_names(&self) -> Result<BTreeSet<String>, AppError> {
        let mut attempt = 1;
        loop {
            match self.inner.list_names().await {
                Ok(names) => return Ok(names),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = match &e {
                        AppError::RateLimitExceeded => self.base_delay * 2_u32.pow(attempt),
                        _ => self.base_delay * attempt,
                    };
                    warn!(
                        "Listing failed (attempt {}/{}): {}, retrying",
                        attempt, self.max_attempts, e
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
