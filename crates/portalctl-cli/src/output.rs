//! Rendering of reports for the terminal.
//!
//! Text goes to stdout for humans; JSON is the same data for scripts.

use portalctl_core::{MigrationRunReport, OutcomeStatus, ReconciliationReport};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write;

use crate::buckets::CreationOutcome;

/// JSON shape of a reconciliation report, with the derived extra names.
#[derive(Debug, Serialize)]
pub struct ReconciliationView<'a> {
    pub kind: String,
    #[serde(flatten)]
    pub report: &'a ReconciliationReport,
    pub extra: BTreeSet<String>,
    pub complete: bool,
}

impl<'a> ReconciliationView<'a> {
    pub fn new(kind: &str, report: &'a ReconciliationReport) -> Self {
        Self {
            kind: kind.to_lowercase(),
            report,
            extra: report.extra(),
            complete: report.is_complete(),
        }
    }
}

/// Result of one connectivity check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub target: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Renders a reconciliation report for `kind` ("Buckets", "Tables").
pub fn render_reconciliation(kind: &str, report: &ReconciliationReport) -> String {
    let mut out = String::new();
    let found = report.expected.len() - report.missing.len();
    let _ = writeln!(
        out,
        "\n{}: {} expected, {} found, {} missing\n",
        kind,
        report.expected.len(),
        found,
        report.missing.len()
    );

    for name in &report.expected {
        if report.missing.contains(name) {
            let _ = writeln!(out, "  MISSING  {}", name);
        } else {
            let _ = writeln!(out, "  ok       {}", name);
        }
    }

    let extra = report.extra();
    if !extra.is_empty() {
        let _ = writeln!(out, "\n  Not in manifest:");
        for name in &extra {
            let _ = writeln!(out, "    - {}", name);
        }
    }

    // Names that only differ by case are a common mix-up; point them out
    for missing in &report.missing {
        if let Some(close) = extra.iter().find(|e| e.eq_ignore_ascii_case(missing)) {
            let _ = writeln!(
                out,
                "\n  Note: '{}' is missing but '{}' exists (names are case-sensitive)",
                missing, close
            );
        }
    }

    out
}

/// Renders the ordered migration outcomes.
pub fn render_migration_report(report: &MigrationRunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nMigration run {}\n", report.run_id);

    for (i, outcome) in report.outcomes.iter().enumerate() {
        let checksum = outcome
            .checksum
            .as_deref()
            .map(|c| format!(" [{}]", &c[..c.len().min(12)]))
            .unwrap_or_default();
        match &outcome.status {
            OutcomeStatus::Succeeded => {
                let _ = writeln!(
                    out,
                    "{:>3}. ok         {}{} ({} ms)",
                    i + 1,
                    outcome.unit_name,
                    checksum,
                    outcome.elapsed_ms
                );
            }
            OutcomeStatus::Failed { detail } => {
                let _ = writeln!(
                    out,
                    "{:>3}. FAILED     {}{}",
                    i + 1,
                    outcome.unit_name,
                    checksum
                );
                let _ = writeln!(out, "                {}", detail);
            }
            OutcomeStatus::NotFound { detail } => {
                let _ = writeln!(out, "{:>3}. NOT FOUND  {}", i + 1, outcome.unit_name);
                let _ = writeln!(out, "                {}", detail);
            }
        }
    }

    let _ = writeln!(
        out,
        "\n{} applied, {} failed, {} not found out of {} total",
        report.succeeded_count(),
        report.failed_count(),
        report.not_found_count(),
        report.total()
    );
    out
}

pub fn render_creations(outcomes: &[CreationOutcome], dry_run: bool) -> String {
    let mut out = String::new();
    if outcomes.is_empty() {
        let _ = writeln!(out, "\nAll buckets already exist. Nothing to create.");
        return out;
    }

    let _ = writeln!(out);
    for outcome in outcomes {
        if dry_run {
            let _ = writeln!(out, "  would create  {}", outcome.name);
        } else if outcome.created {
            let _ = writeln!(out, "  created       {}", outcome.name);
        } else {
            let _ = writeln!(
                out,
                "  FAILED        {}: {}",
                outcome.name,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
    out
}

pub fn render_checks(checks: &[CheckResult]) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    for check in checks {
        match &check.error {
            None => {
                let _ = writeln!(out, "  ok      {}", check.target);
            }
            Some(err) => {
                let _ = writeln!(out, "  FAILED  {}: {}", check.target, err);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use portalctl_core::MigrationOutcome;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_render_reconciliation_marks_missing() {
        let report = ReconciliationReport::compute(
            set(&["avatars", "receipts", "certificates"]),
            set(&["certificates"]),
        );
        let text = render_reconciliation("Buckets", &report);

        assert!(text.contains("3 expected, 1 found, 2 missing"));
        assert!(text.contains("MISSING  avatars"));
        assert!(text.contains("ok       certificates"));
        assert!(!text.contains("Not in manifest"));
    }

    #[test]
    fn test_render_reconciliation_case_hint() {
        let report = ReconciliationReport::compute(set(&["certificates"]), set(&["Certificates"]));
        let text = render_reconciliation("Buckets", &report);

        assert!(text.contains("Not in manifest"));
        assert!(text.contains("case-sensitive"));
    }

    #[test]
    fn test_render_migration_report() {
        let now = Utc::now();
        let report = MigrationRunReport {
            run_id: Uuid::nil(),
            started_at: now,
            finished_at: now,
            outcomes: vec![
                MigrationOutcome {
                    unit_name: "001.sql".to_string(),
                    status: OutcomeStatus::Succeeded,
                    checksum: Some("a".repeat(64)),
                    elapsed_ms: 4,
                },
                MigrationOutcome {
                    unit_name: "002.sql".to_string(),
                    status: OutcomeStatus::Failed {
                        detail: "already exists".to_string(),
                    },
                    checksum: Some("b".repeat(64)),
                    elapsed_ms: 2,
                },
                MigrationOutcome {
                    unit_name: "003.sql".to_string(),
                    status: OutcomeStatus::NotFound {
                        detail: "migrations/003.sql".to_string(),
                    },
                    checksum: None,
                    elapsed_ms: 0,
                },
            ],
        };

        let text = render_migration_report(&report);
        assert!(text.contains("ok         001.sql [aaaaaaaaaaaa] (4 ms)"));
        assert!(text.contains("FAILED     002.sql"));
        assert!(text.contains("already exists"));
        assert!(text.contains("NOT FOUND  003.sql"));
        assert!(text.contains("1 applied, 1 failed, 1 not found out of 3 total"));
    }

    #[test]
    fn test_render_creations_empty() {
        let text = render_creations(&[], false);
        assert!(text.contains("Nothing to create"));
    }

    #[test]
    fn test_render_creations_dry_run() {
        let outcomes = vec![CreationOutcome {
            name: "avatars".to_string(),
            created: false,
            error: None,
        }];
        let text = render_creations(&outcomes, true);
        assert!(text.contains("would create  avatars"));
    }

    #[test]
    fn test_render_checks() {
        let checks = vec![
            CheckResult {
                target: "storage".to_string(),
                ok: true,
                error: None,
            },
            CheckResult {
                target: "database".to_string(),
                ok: false,
                error: Some("refused".to_string()),
            },
        ];
        let text = render_checks(&checks);
        assert!(text.contains("ok      storage"));
        assert!(text.contains("FAILED  database: refused"));
    }

    #[test]
    fn test_output_is_plain_ascii() {
        let report = ReconciliationReport::compute(set(&["avatars"]), set(&["receipts"]));
        let text = render_reconciliation("Buckets", &report);
        assert!(text.is_ascii());
    }

    #[test]
    fn test_reconciliation_view_json() {
        let report = ReconciliationReport::compute(
            set(&["avatars", "certificates"]),
            set(&["certificates", "legacy"]),
        );
        let json = serde_json::to_value(ReconciliationView::new("Buckets", &report)).unwrap();

        assert_eq!(json["kind"], "buckets");
        assert_eq!(json["missing"], serde_json::json!(["avatars"]));
        assert_eq!(json["extra"], serde_json::json!(["legacy"]));
        assert_eq!(json["observed"], serde_json::json!(["certificates", "legacy"]));
        assert_eq!(json["complete"], false);
    }
}
