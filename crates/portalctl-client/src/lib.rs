//! portalctl client - HTTP clients for the hosted backend
//!
//! This crate provides the network-backed capabilities the core consumes:
//!
//! - [`storage`] - storage bucket listing and creation ([`ResourceDirectory`](portalctl_core::ResourceDirectory))
//! - [`rpc`] - SQL execution through the `exec_sql` RPC function ([`SqlExecutor`](portalctl_core::SqlExecutor))
//! - [`retry`] - opt-in retries around any directory
//!
//! Both clients authenticate with the project's service role key and send
//! exactly one request per call.

pub mod retry;
pub mod rpc;
pub mod storage;

#[cfg(test)]
mod test_server;

pub use retry::RetryingDirectory;
pub use rpc::RpcSqlExecutor;
pub use storage::{StorageBucket, StorageClient};

use portalctl_core::error::AppError;
use portalctl_core::HttpConfig;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, StatusCode};
use url::Url;

/// Parses the project URL, making sure relative joins keep any path prefix.
pub(crate) fn parse_base_url(base_url_str: &str) -> Result<Url, AppError> {
    let normalized = if base_url_str.ends_with('/') {
        base_url_str.to_string()
    } else {
        format!("{}/", base_url_str)
    };
    Url::parse(&normalized).map_err(|_| AppError::InvalidUrl(base_url_str.to_string()))
}

/// Builds an HTTP client that sends the service key on every request.
pub(crate) fn build_client(service_key: &str, config: &HttpConfig) -> Result<Client, AppError> {
    let mut headers = HeaderMap::new();
    let key = HeaderValue::from_str(service_key)
        .map_err(|_| AppError::Generic("service key contains invalid characters".to_string()))?;
    let bearer = HeaderValue::from_str(&format!("Bearer {}", service_key))
        .map_err(|_| AppError::Generic("service key contains invalid characters".to_string()))?;
    headers.insert("apikey", key);
    headers.insert(AUTHORIZATION, bearer);

    Client::builder()
        .user_agent(concat!("portalctl/", env!("CARGO_PKG_VERSION")))
        .timeout(config.timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| AppError::ClientError(e.to_string()))
}

/// Maps a failed send into the error taxonomy, the same way for every client.
pub(crate) fn transport_error(e: reqwest::Error, timeout_secs: u64) -> AppError {
    if e.is_timeout() {
        AppError::Timeout(timeout_secs)
    } else if e.is_connect() {
        AppError::NetworkError(format!("Connection failed: {}", e))
    } else {
        AppError::ClientError(e.to_string())
    }
}

/// Maps a non-success HTTP status into the error taxonomy.
pub(crate) fn status_error(status: StatusCode, url: &Url, body: &str) -> AppError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return AppError::RateLimitExceeded;
    }
    if status.is_server_error() {
        return AppError::ClientError(format!(
            "Server error: HTTP {} from {}",
            status.as_u16(),
            url
        ));
    }

    let body = body.trim();
    if body.is_empty() {
        AppError::ClientError(format!("HTTP {} from {}", status.as_u16(), url))
    } else {
        AppError::ClientError(format!("HTTP {} from {}: {}", status.as_u16(), url, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_base_url_adds_trailing_slash() {
        let url = parse_base_url("https://abc.supabase.co").unwrap();
        assert_eq!(url.as_str(), "https://abc.supabase.co/");

        let url = parse_base_url("http://localhost:54321/proxy").unwrap();
        assert_eq!(
            url.join("storage/v1/bucket").unwrap().as_str(),
            "http://localhost:54321/proxy/storage/v1/bucket"
        );
    }

    #[test]
    fn test_parse_base_url_invalid() {
        let result = parse_base_url("not a url");
        assert!(matches!(result, Err(AppError::InvalidUrl(_))));
    }

    #[test]
    fn test_status_error_rate_limit() {
        let url = Url::parse("https://abc.supabase.co/storage/v1/bucket").unwrap();
        let err = status_error(StatusCode::TOO_MANY_REQUESTS, &url, "");
        assert!(matches!(err, AppError::RateLimitExceeded));
    }

    #[test]
    fn test_status_error_server_and_client() {
        let url = Url::parse("https://abc.supabase.co/storage/v1/bucket").unwrap();

        let err = status_error(StatusCode::SERVICE_UNAVAILABLE, &url, "down");
        assert_eq!(
            err.to_string(),
            "API Client error: Server error: HTTP 503 from https://abc.supabase.co/storage/v1/bucket"
        );

        let err = status_error(StatusCode::UNAUTHORIZED, &url, " invalid key \n");
        assert!(err.to_string().ends_with("HTTP 401 from https://abc.supabase.co/storage/v1/bucket: invalid key"));
    }

    #[test]
    fn test_build_client_rejects_newline_in_key() {
        let result = build_client("bad\nkey", &HttpConfig::default());
        assert!(result.is_err());
    }
}
