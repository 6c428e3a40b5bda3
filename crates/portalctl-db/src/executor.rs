use async_trait::async_trait;
use portalctl_core::error::AppError;
use portalctl_core::SqlExecutor;
use sqlx::{PgPool, Pool, Postgres};
use tracing::debug;

/// Executes migration SQL directly against Postgres.
///
/// The whole text is sent as one simple-protocol batch, so a file may hold
/// several statements. Statements run outside an explicit transaction unless
/// the file opens one itself.
#[derive(Clone)]
pub struct PgSqlExecutor {
    pool: Pool<Postgres>,
}

impl PgSqlExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Statement errors belong to the unit; everything else is the connection.
fn classify_error(e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(db) => match db.code() {
            Some(code) => AppError::ExecutionFailed(format!("{} (code {})", db.message(), code)),
            None => AppError::ExecutionFailed(db.message().to_string()),
        },
        other => AppError::DatabaseError(other),
    }
}

#[async_trait]
impl SqlExecutor for PgSqlExecutor {
    async fn execute(&self, sql: &str) -> Result<(), AppError> {
        let result = sqlx::raw_sql(sql)
            .execute(&self.pool)
            .await
            .map_err(classify_error)?;

        debug!("Statement batch affected {} rows", result.rows_affected());
        Ok(())
    }
}
