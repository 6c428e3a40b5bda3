use std::collections::BTreeSet;

use async_trait::async_trait;
use portalctl_core::error::AppError;
use portalctl_core::{HttpConfig, NamedResource, ResourceDirectory};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

/// A bucket as returned by the storage listing endpoint.
///
/// Fields the tool does not use (owner, timestamps) are kept in `extras`.
///
/// # Examples
///
/// ```
/// use portalctl_client::StorageBucket;
///
/// let json = r#"{
///     "id": "avatars",
///     "name": "avatars",
///     "public": true,
///     "file_size_limit": null,
///     "allowed_mime_types": ["image/*"],
///     "created_at": "2024-01-01T00:00:00Z"
/// }"#;
///
/// let bucket: StorageBucket = serde_json::from_str(json).unwrap();
/// assert_eq!(bucket.name, "avatars");
/// assert!(bucket.public);
/// assert!(bucket.extras.contains_key("created_at"));
/// ```
#[derive(Deserialize, Debug, Clone)]
pub struct StorageBucket {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub public: bool,
    pub file_size_limit: Option<u64>,
    pub allowed_mime_types: Option<Vec<String>>,
    #[serde(flatten)]
    pub extras: serde_json::Map<String, Value>,
}

impl StorageBucket {
    /// Converts the listing entry into the domain resource.
    pub fn into_named_resource(self) -> NamedResource {
        NamedResource {
            name: self.name,
            public: Some(self.public),
            file_size_limit: self.file_size_limit,
            allowed_mime_types: self.allowed_mime_types,
        }
    }
}

/// Request body for bucket creation.
#[derive(Serialize, Debug)]
struct CreateBucketRequest<'a> {
    id: &'a str,
    name: &'a str,
    public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_size_limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_mime_types: Option<&'a [String]>,
}

impl<'a> From<&'a NamedResource> for CreateBucketRequest<'a> {
    fn from(res: &'a NamedResource) -> Self {
        Self {
            id: &res.name,
            name: &res.name,
            public: res.public.unwrap_or(false),
            file_size_limit: res.file_size_limit,
            allowed_mime_types: res.allowed_mime_types.as_deref(),
        }
    }
}

/// HTTP client for the storage bucket API.
///
/// # Examples
///
/// ```no_run
/// use portalctl_client::StorageClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = StorageClient::new("https://abc.supabase.co", "service-role-key")?;
/// let buckets = client.list_buckets().await?;
/// println!("Found {} buckets", buckets.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct StorageClient {
    client: Client,
    base_url: Url,
    timeout_secs: u64,
}

impl StorageClient {
    /// Creates a client with the default [`HttpConfig`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidUrl` if the project URL is malformed.
    /// Returns `AppError::ClientError` if the HTTP client cannot be built.
    pub fn new(base_url_str: &str, service_key: &str) -> Result<Self, AppError> {
        Self::with_config(base_url_str, service_key, &HttpConfig::default())
    }

    pub fn with_config(
        base_url_str: &str,
        service_key: &str,
        config: &HttpConfig,
    ) -> Result<Self, AppError> {
        let base_url = crate::parse_base_url(base_url_str)?;
        let client = crate::build_client(service_key, config)?;

        Ok(Self {
            client,
            base_url,
            timeout_secs: config.timeout.as_secs(),
        })
    }

    fn bucket_url(&self) -> Result<Url, AppError> {
        self.base_url
            .join("storage/v1/bucket")
            .map_err(|e| AppError::InvalidUrl(e.to_string()))
    }

    /// Lists every bucket in the project.
    ///
    /// Sends exactly one request. Wrap the client in
    /// [`RetryingDirectory`](crate::RetryingDirectory) to retry transient
    /// failures.
    ///
    /// # Errors
    ///
    /// Returns `AppError::RateLimitExceeded` on HTTP 429, `AppError::Timeout`
    /// or `AppError::NetworkError` on transport failures, and
    /// `AppError::ClientError` for any other failed status or an undecodable
    /// body.
    pub async fn list_buckets(&self) -> Result<Vec<StorageBucket>, AppError> {
        let url = self.bucket_url()?;
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| crate::transport_error(e, self.timeout_secs))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(crate::status_error(status, &url, &body));
        }

        let buckets: Vec<StorageBucket> = resp
            .json()
            .await
            .map_err(|e| AppError::ClientError(e.to_string()))?;

        debug!("Storage lists {} buckets", buckets.len());
        Ok(buckets)
    }

    /// Creates a bucket with the resource's attributes.
    ///
    /// Not retried: a timed-out create may still have succeeded.
    pub async fn create_bucket(&self, resource: &NamedResource) -> Result<(), AppError> {
        let url = self.bucket_url()?;
        let body = CreateBucketRequest::from(resource);

        let resp = self
            .client
            .post(url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| crate::transport_error(e, self.timeout_secs))?;

        let status = resp.status();
        if status.is_success() {
            info!("Created bucket {}", resource.name);
            return Ok(());
        }

        let text = resp.text().await.unwrap_or_default();
        Err(crate::status_error(status, &url, &text))
    }
}

#[async_trait]
impl ResourceDirectory for StorageClient {
    async fn list_names(&self) -> Result<BTreeSet<String>, AppError> {
        let buckets = self.list_buckets().await?;
        Ok(buckets.into_iter().map(|b| b.name).collect())
    }
}
