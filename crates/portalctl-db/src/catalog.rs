use std::collections::BTreeSet;

use async_trait::async_trait;
use portalctl_core::error::AppError;
use portalctl_core::ResourceDirectory;
use sqlx::{PgPool, Pool, Postgres};
use tracing::debug;

/// Lists the base tables and views of one schema.
///
/// # Examples
///
/// ```no_run
/// use sqlx::postgres::PgPoolOptions;
/// use portalctl_db::TableCatalog;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = PgPoolOptions::new()
///     .max_connections(5)
///     .connect("postgresql://localhost/portal")
///     .await?;
///
/// let catalog = TableCatalog::new(pool, "public");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct TableCatalog {
    pool: Pool<Postgres>,
    schema: String,
}

impl TableCatalog {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        Self {
            pool,
            schema: schema.into(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    /// Returns the table names of the configured schema.
    pub async fn table_names(&self) -> Result<BTreeSet<String>, AppError> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = $1
            "#,
        )
        .bind(&self.schema)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        debug!("Schema {} has {} tables", self.schema, names.len());
        Ok(names.into_iter().collect())
    }
}

#[async_trait]
impl ResourceDirectory for TableCatalog {
    async fn list_names(&self) -> Result<BTreeSet<String>, AppError> {
        self.table_names().await
    }
}

/// Round-trips `SELECT 1` to confirm the database answers.
pub async fn ping(pool: &PgPool) -> Result<(), AppError> {
    let one: i32 = sqlx::query_scalar("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(AppError::DatabaseError)?;

    if one != 1 {
        return Err(AppError::Generic(format!("SELECT 1 returned {}", one)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    #[tokio::test]
    async fn test_catalog_keeps_schema() {
        // connect_lazy does not open a connection until first use
        let pool = PgPoolOptions::new()
            .connect_lazy("postgresql://localhost/portal")
            .unwrap();
        let catalog = TableCatalog::new(pool, "storage");
        assert_eq!(catalog.schema(), "storage");
    }
}
