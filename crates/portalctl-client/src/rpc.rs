use async_trait::async_trait;
use portalctl_core::error::AppError;
use portalctl_core::{HttpConfig, SqlExecutor};
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Name of the Postgres function the project exposes for arbitrary SQL.
pub const EXEC_SQL_FUNCTION: &str = "exec_sql";

#[derive(Serialize)]
struct ExecSqlRequest<'a> {
    sql: &'a str,
}

/// Error body returned by the REST layer for a failed RPC call.
#[derive(Deserialize, Debug)]
struct RpcError {
    message: String,
    code: Option<String>,
    hint: Option<String>,
}

impl RpcError {
    fn render(&self) -> String {
        let mut out = self.message.clone();
        if let Some(code) = &self.code {
            out = format!("{} (code {})", out, code);
        }
        if let Some(hint) = &self.hint {
            out = format!("{}; hint: {}", out, hint);
        }
        out
    }
}

/// Executes SQL through the `exec_sql` RPC endpoint.
///
/// Each call is a single POST. Nothing is retried: a statement that timed out
/// on the client side may still have been committed by the backend.
///
/// # Examples
///
/// ```no_run
/// use portalctl_client::RpcSqlExecutor;
/// use portalctl_core::SqlExecutor;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let executor = RpcSqlExecutor::new("https://abc.supabase.co", "service-role-key")?;
/// executor.execute("CREATE TABLE IF NOT EXISTS notes (id bigint)").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RpcSqlExecutor {
    client: Client,
    rpc_url: Url,
    timeout_secs: u64,
}

impl RpcSqlExecutor {
    pub fn new(base_url_str: &str, service_key: &str) -> Result<Self, AppError> {
        Self::with_config(base_url_str, service_key, &HttpConfig::default())
    }

    pub fn with_config(
        base_url_str: &str,
        service_key: &str,
        config: &HttpConfig,
    ) -> Result<Self, AppError> {
        let rpc_url = crate::parse_base_url(base_url_str)?
            .join(&format!("rest/v1/rpc/{}", EXEC_SQL_FUNCTION))
            .map_err(|e| AppError::InvalidUrl(e.to_string()))?;
        let client = crate::build_client(service_key, config)?;

        Ok(Self {
            client,
            rpc_url,
            timeout_secs: config.timeout.as_secs(),
        })
    }

    pub fn rpc_url(&self) -> &Url {
        &self.rpc_url
    }
}

#[async_trait]
impl SqlExecutor for RpcSqlExecutor {
    async fn execute(&self, sql: &str) -> Result<(), AppError> {
        debug!("POST {} ({} bytes of SQL)", self.rpc_url, sql.len());

        let resp = self
            .client
            .post(self.rpc_url.clone())
            .json(&ExecSqlRequest { sql })
            .send()
            .await
            .map_err(|e| crate::transport_error(e, self.timeout_secs))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        Err(failure_from_response(status, &self.rpc_url, &body))
    }
}

/// Classifies a failed `exec_sql` response.
///
/// 401, 403 and 404 concern the endpoint (key or missing function) and 429 is
/// a rate limit; every other status means the backend ran the statement and
/// rejected it.
fn failure_from_response(status: StatusCode, url: &Url, body: &str) -> AppError {
    let detail = serde_json::from_str::<RpcError>(body)
        .map(|e| e.render())
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        StatusCode::UNAUTHORIZED
        | StatusCode::FORBIDDEN
        | StatusCode::NOT_FOUND
        | StatusCode::TOO_MANY_REQUESTS => crate::status_error(status, url, &detail),
        _ => AppError::ExecutionFailed(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_url() {
        let executor = RpcSqlExecutor::new("https://abc.supabase.co", "key").unwrap();
        assert_eq!(
            executor.rpc_url().as_str(),
            "https://abc.supabase.co/rest/v1/rpc/exec_sql"
        );
    }

    #[test]
    fn test_request_body() {
        let body = serde_json::to_value(ExecSqlRequest { sql: "SELECT 1" }).unwrap();
        assert_eq!(body, serde_json::json!({"sql": "SELECT 1"}));
    }

    #[test]
    fn test_rpc_error_render() {
        let json = r#"{
            "message": "relation \"profiles\" already exists",
            "code": "42P07",
            "hint": null,
            "details": null
        }"#;

        let err: RpcError = serde_json::from_str(json).unwrap();
        assert_eq!(
            err.render(),
            "relation \"profiles\" already exists (code 42P07)"
        );
    }

    #[test]
    fn test_rpc_error_render_with_hint() {
        let err = RpcError {
            message: "function exec_sql(sql => text) does not exist".to_string(),
            code: Some("PGRST202".to_string()),
            hint: Some("Perhaps you meant to call exec".to_string()),
        };
        assert!(err.render().ends_with("hint: Perhaps you meant to call exec"));
    }

    fn rpc_url() -> Url {
        Url::parse("https://abc.supabase.co/rest/v1/rpc/exec_sql").unwrap()
    }

    #[test]
    fn test_bad_request_is_execution_failure() {
        let body = r#"{"code": "42P07", "message": "relation \"profiles\" already exists", "hint": null}"#;
        let err = failure_from_response(StatusCode::BAD_REQUEST, &rpc_url(), body);

        match err {
            AppError::ExecutionFailed(detail) => {
                assert_eq!(detail, "relation \"profiles\" already exists (code 42P07)");
            }
            other => panic!("Expected ExecutionFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_server_error_is_execution_failure() {
        let err = failure_from_response(StatusCode::INTERNAL_SERVER_ERROR, &rpc_url(), "boom");
        assert!(matches!(err, AppError::ExecutionFailed(ref d) if d == "boom"));
    }

    #[test]
    fn test_missing_function_is_client_error() {
        let body = r#"{"code": "PGRST202", "message": "Could not find the function public.exec_sql(sql)", "hint": null}"#;
        let err = failure_from_response(StatusCode::NOT_FOUND, &rpc_url(), body);

        assert!(matches!(err, AppError::ClientError(ref msg) if msg.contains("HTTP 404")));
        assert!(err.user_message().contains("--via postgres"));
    }

    #[test]
    fn test_unauthorized_is_client_error() {
        let err = failure_from_response(
            StatusCode::UNAUTHORIZED,
            &rpc_url(),
            r#"{"message": "Invalid API key"}"#,
        );

        assert!(matches!(err, AppError::ClientError(ref msg) if msg.contains("HTTP 401") && msg.contains("Invalid API key")));
        assert!(err.user_message().contains("SUPABASE_SERVICE_ROLE_KEY"));
    }

    #[tokio::test]
    async fn test_execute_maps_bad_request_from_server() {
        let (base, hits) = crate::test_server::serve(
            "400 Bad Request",
            r#"{"code": "42601", "message": "syntax error at or near \"CREAT\"", "hint": null}"#,
        )
        .await;
        let executor = RpcSqlExecutor::new(&base, "key").unwrap();

        let result = executor.execute("CREAT TABLE x ()").await;
        assert!(matches!(result, Err(AppError::ExecutionFailed(ref d)) if d.contains("42601")));
        assert_eq!(hits.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_timeout_matches_storage_mapping() {
        let base = crate::test_server::serve_silence().await;
        let config = HttpConfig {
            timeout: std::time::Duration::from_millis(200),
            ..HttpConfig::default()
        };
        let executor = RpcSqlExecutor::with_config(&base, "key", &config).unwrap();

        let result = executor.execute("SELECT 1").await;
        assert!(matches!(result, Err(AppError::Timeout(_))));
    }
}
