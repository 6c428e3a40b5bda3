//! portalctl CLI - command-line administration for the student portal backend
//!
//! This crate wires the core reconciler and migration applier to the HTTP
//! and Postgres capabilities and renders their reports.

pub mod buckets;
pub mod config;
pub mod output;

pub use config::{BucketAction, Command, Config, ExecutionPath, OutputFormat, TableAction};
