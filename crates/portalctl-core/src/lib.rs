//! portalctl core - domain types, error handling, configuration, resource
//! reconciliation and sequential migration application.
//!
//! Nothing in this crate talks to a backend directly. Directory listings and
//! SQL execution come in through the [`ResourceDirectory`] and
//! [`SqlExecutor`] traits.

pub mod config;
pub mod error;
pub mod migrate;
pub mod models;
pub mod reconcile;

pub use config::{default_config_path, load_manifest, DbConfig, HttpConfig, Manifest};
pub use error::AppError;
pub use migrate::{
    apply_all, apply_manifest, DirMigrationSource, MigrationOutcome, MigrationRun,
    MigrationRunReport, MigrationSource, OutcomeStatus, RunState, SqlExecutor,
};
pub use models::{MigrationUnit, NamedResource};
pub use reconcile::{expected_names, reconcile, ReconciliationReport, ResourceDirectory};
