//! portalctl db - direct PostgreSQL access.
//!
//! - [`TableCatalog`] lists tables of a schema as a
//!   [`ResourceDirectory`](portalctl_core::ResourceDirectory).
//! - [`PgSqlExecutor`] runs migration SQL over a pooled connection as a
//!   [`SqlExecutor`](portalctl_core::SqlExecutor).

pub mod catalog;
pub mod executor;

pub use catalog::{ping, TableCatalog};
pub use executor::PgSqlExecutor;
