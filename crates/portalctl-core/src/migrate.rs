//! Sequential migration application.
//!
//! Units are applied strictly in the order supplied, one execution call per
//! unit. A failing unit is recorded and the run moves on to the next one:
//! there is no rollback and no early abort. Migrations are written to be
//! additive (`CREATE TABLE IF NOT EXISTS`, `CREATE OR REPLACE FUNCTION`), so an
//! "already exists" failure on one file must not block the files after it.
//! Every run ends in [`RunState::Completed`] with one outcome per unit.

use std::path::{Path, PathBuf};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::MigrationUnit;

/// Runs one block of SQL against the backend.
///
/// The executor does not parse or validate SQL; it hands the text over and
/// reports whether the backend accepted it.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<(), AppError>;
}

/// Resolves a migration name from the manifest into its SQL text.
pub trait MigrationSource {
    /// # Errors
    ///
    /// Returns `AppError::UnitNotFound` if the unit cannot be loaded.
    fn load(&self, name: &str) -> Result<MigrationUnit, AppError>;
}

/// Loads migration units as files from a directory.
#[derive(Debug, Clone)]
pub struct DirMigrationSource {
    dir: PathBuf,
}

impl DirMigrationSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl MigrationSource for DirMigrationSource {
    fn load(&self, name: &str) -> Result<MigrationUnit, AppError> {
        let path = self.dir.join(name);
        let sql = std::fs::read_to_string(&path)
            .map_err(|e| AppError::UnitNotFound(format!("{} ({})", path.display(), e)))?;
        Ok(MigrationUnit::new(name, sql))
    }
}

/// How a single unit ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    Failed { detail: String },
    NotFound { detail: String },
}

/// Result of attempting one migration unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationOutcome {
    pub unit_name: String,
    #[serde(flatten)]
    pub status: OutcomeStatus,
    /// SHA-256 of the applied SQL; absent when the unit could not be loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub elapsed_ms: u64,
}

impl MigrationOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, OutcomeStatus::Succeeded)
    }

    /// The failure cause, for both failed and missing units.
    pub fn error_detail(&self) -> Option<&str> {
        match &self.status {
            OutcomeStatus::Succeeded => None,
            OutcomeStatus::Failed { detail } | OutcomeStatus::NotFound { detail } => Some(detail),
        }
    }
}

/// Ordered outcomes of one migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationRunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<MigrationOutcome>,
}

impl MigrationRunReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OutcomeStatus::Failed { .. }))
            .count()
    }

    pub fn not_found_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, OutcomeStatus::NotFound { .. }))
            .count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.succeeded())
    }
}

/// Position of a [`MigrationRun`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running(usize),
    Succeeded(usize),
    Failed(usize),
    NotFound(usize),
    Completed,
}

/// A unit waiting to be attempted.
#[derive(Debug)]
enum PlannedUnit {
    Loaded(MigrationUnit),
    Unavailable { name: String, detail: String },
}

/// A stepwise migration run.
///
/// Use [`apply_all`] or [`apply_manifest`] unless the caller needs to observe
/// each transition.
#[derive(Debug)]
pub struct MigrationRun {
    run_id: Uuid,
    planned: Vec<PlannedUnit>,
    next: usize,
    state: RunState,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    outcomes: Vec<MigrationOutcome>,
}

impl MigrationRun {
    /// Plans a run over already loaded units.
    pub fn new(units: Vec<MigrationUnit>) -> Self {
        Self::from_planned(units.into_iter().map(PlannedUnit::Loaded).collect())
    }

    /// Plans a run by loading each manifest name through `source`.
    ///
    /// Load failures are kept in place and reported as `NotFound` when the
    /// run reaches them.
    pub fn from_manifest<S>(names: &[String], source: &S) -> Self
    where
        S: MigrationSource + ?Sized,
    {
        let planned = names
            .iter()
            .map(|name| match source.load(name) {
                Ok(unit) => PlannedUnit::Loaded(unit),
                Err(e) => {
                    let detail = match e {
                        AppError::UnitNotFound(detail) => detail,
                        other => other.to_string(),
                    };
                    PlannedUnit::Unavailable {
                        name: name.clone(),
                        detail,
                    }
                }
            })
            .collect();
        Self::from_planned(planned)
    }

    fn from_planned(planned: Vec<PlannedUnit>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            planned,
            next: 0,
            state: RunState::Pending,
            started_at: None,
            finished_at: None,
            outcomes: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.planned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.planned.is_empty()
    }

    /// Attempts the next unit and returns its outcome.
    ///
    /// Returns `None` once every unit has been attempted, moving the run to
    /// `Completed`.
    pub async fn step<E>(&mut self, executor: &E) -> Option<&MigrationOutcome>
    where
        E: SqlExecutor + ?Sized,
    {
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
            info!(run_id = %self.run_id, "Applying {} migrations", self.planned.len());
        }

        let index = self.next;
        let Some(planned) = self.planned.get(index) else {
            if self.state != RunState::Completed {
                self.state = RunState::Completed;
                self.finished_at = Some(Utc::now());
            }
            return None;
        };
        self.next += 1;
        self.state = RunState::Running(index);

        let total = self.planned.len();
        let start = Instant::now();
        let outcome = match planned {
            PlannedUnit::Loaded(unit) => {
                debug!("[{}/{}] Executing {}", index + 1, total, unit.name);
                let checksum = Some(unit.checksum());
                match executor.execute(&unit.sql).await {
                    Ok(()) => {
                        info!("[{}/{}] Applied {}", index + 1, total, unit.name);
                        self.state = RunState::Succeeded(index);
                        MigrationOutcome {
                            unit_name: unit.name.clone(),
                            status: OutcomeStatus::Succeeded,
                            checksum,
                            elapsed_ms: elapsed_ms(start),
                        }
                    }
                    Err(e) => {
                        error!("[{}/{}] Failed to apply {}: {}", index + 1, total, unit.name, e);
                        self.state = RunState::Failed(index);
                        MigrationOutcome {
                            unit_name: unit.name.clone(),
                            status: OutcomeStatus::Failed {
                                detail: e.to_string(),
                            },
                            checksum,
                            elapsed_ms: elapsed_ms(start),
                        }
                    }
                }
            }
            PlannedUnit::Unavailable { name, detail } => {
                warn!("[{}/{}] Migration not found: {}", index + 1, total, detail);
                self.state = RunState::NotFound(index);
                MigrationOutcome {
                    unit_name: name.clone(),
                    status: OutcomeStatus::NotFound {
                        detail: detail.clone(),
                    },
                    checksum: None,
                    elapsed_ms: 0,
                }
            }
        };

        self.outcomes.push(outcome);
        self.outcomes.last()
    }

    /// Attempts every remaining unit and returns the report.
    pub async fn run<E>(mut self, executor: &E) -> MigrationRunReport
    where
        E: SqlExecutor + ?Sized,
    {
        while self.step(executor).await.is_some() {}
        self.finish()
    }

    /// Consumes the run and reports the units attempted so far.
    pub fn finish(self) -> MigrationRunReport {
        let now = Utc::now();
        let report = MigrationRunReport {
            run_id: self.run_id,
            started_at: self.started_at.unwrap_or(now),
            finished_at: self.finished_at.unwrap_or(now),
            outcomes: self.outcomes,
        };
        info!(
            run_id = %report.run_id,
            "Migrations complete: {} applied, {} failed, {} not found out of {} total",
            report.succeeded_count(),
            report.failed_count(),
            report.not_found_count(),
            report.total()
        );
        report
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Applies `units` in order, continuing past failures.
pub async fn apply_all<E>(units: &[MigrationUnit], executor: &E) -> MigrationRunReport
where
    E: SqlExecutor + ?Sized,
{
    MigrationRun::new(units.to_vec()).run(executor).await
}

/// Loads each manifest name through `source` and applies the result in order.
///
/// Names that cannot be loaded are reported as `NotFound` and never reach the
/// executor.
pub async fn apply_manifest<S, E>(names: &[String], source: &S, executor: &E) -> MigrationRunReport
where
    S: MigrationSource + ?Sized,
    E: SqlExecutor + ?Sized,
{
    MigrationRun::from_manifest(names, source).run(executor).await
}
