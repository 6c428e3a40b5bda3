use thiserror::Error;

/// Application-wide error types.
///
/// This enum represents every failure the portalctl crates report. The three
/// domain variants map onto how the core treats a failure:
///
/// - [`AppError::DirectoryUnavailable`] aborts a single reconciliation call.
/// - [`AppError::ExecutionFailed`] is recorded against one migration unit.
/// - [`AppError::UnitNotFound`] is recorded against one migration unit.
///
/// The remaining variants describe transport and configuration problems raised
/// by the capability implementations in `portalctl-client` and `portalctl-db`.
///
/// # Error Conversion
///
/// - `sqlx::Error` → `AppError::DatabaseError`
/// - `serde_json::Error` → `AppError::SerializationError`
///
/// # Examples
///
/// ```no_run
/// use portalctl_core::error::AppError;
///
/// fn example() -> Result<(), AppError> {
///     Err(AppError::Generic("Something went wrong".to_string()))
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// The resource directory could not be listed.
    ///
    /// Carries the rendered cause from the underlying fetch. A reconciliation
    /// that hits this error produces no report at all.
    #[error("Resource directory unavailable: {0}")]
    DirectoryUnavailable(String),

    /// A migration unit's SQL was rejected by the backend.
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// A migration unit named in the manifest could not be loaded.
    #[error("Migration unit not found: {0}")]
    UnitNotFound(String),

    /// Database operation failed.
    ///
    /// This error wraps all errors from SQLx database operations, including
    /// connection failures, query errors, and constraint violations.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// HTTP client request failed.
    #[error("API Client error: {0}")]
    ClientError(String),

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The manifest file is missing or malformed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Network or connection error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded. Please wait and try again.")]
    RateLimitExceeded,

    /// Generic application error for cases not covered by specific variants.
    #[error("Error: {0}")]
    Generic(String),
}

impl AppError {
    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::DatabaseError(e) => {
                if e.to_string().contains("connection") {
                    "Cannot connect to database. Check DATABASE_URL and that the project is reachable."
                        .to_string()
                } else {
                    format!("Database error: {}", e)
                }
            }
            AppError::ClientError(msg) => {
                if msg.contains("401") || msg.contains("403") {
                    "The backend rejected the service key.\n   Check SUPABASE_SERVICE_ROLE_KEY."
                        .to_string()
                } else if msg.contains("404") && msg.contains("exec_sql") {
                    "The exec_sql RPC function does not exist on the backend.\n   Create it or run with --via postgres.".to_string()
                } else {
                    format!("API error: {}", msg)
                }
            }
            AppError::DirectoryUnavailable(cause) => {
                format!(
                    "Could not list backend resources: {}\n   Nothing was compared.",
                    cause
                )
            }
            AppError::ConfigError(msg) => {
                format!(
                    "Invalid manifest: {}\n   See `portalctl --help` for the manifest location.",
                    msg
                )
            }
            AppError::NetworkError(msg) => {
                format!("Network error: {}\n   Check your internet connection.", msg)
            }
            AppError::Timeout(secs) => {
                format!(
                    "Request timed out after {} seconds.\n   The backend may be overloaded. Try again later.",
                    secs
                )
            }
            AppError::RateLimitExceeded => {
                "Too many requests. Please wait a moment and try again.".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Returns true if this error is retryable.
    ///
    /// # Examples
    ///
    /// ```
    /// use portalctl_core::error::AppError;
    ///
    /// let err = AppError::NetworkError("connection reset".to_string());
    /// assert!(err.is_retryable());
    ///
    /// // A failed migration is never retried
    /// let err = AppError::ExecutionFailed("syntax error".to_string());
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::NetworkError(_) | AppError::Timeout(_) | AppError::RateLimitExceeded
        )
    }
}
