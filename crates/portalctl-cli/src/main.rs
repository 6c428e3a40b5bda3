use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context};
use clap::Parser;
use dotenvy::dotenv;
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use portalctl::buckets::{any_failed, create_missing};
use portalctl::output::{
    render_checks, render_creations, render_migration_report, render_reconciliation,
    CheckResult, ReconciliationView,
};
use portalctl::{BucketAction, Command, Config, ExecutionPath, OutputFormat, TableAction};
use portalctl_client::{RetryingDirectory, RpcSqlExecutor, StorageClient};
use portalctl_core::{
    apply_manifest, default_config_path, expected_names, load_manifest, reconcile, AppError,
    DbConfig, DirMigrationSource, Manifest, MigrationRunReport, ReconciliationReport,
    ResourceDirectory,
};
use portalctl_db::{PgSqlExecutor, TableCatalog};

/// Exit status when a report shows missing resources or failed units.
const EXIT_INCOMPLETE: u8 = 1;
/// Exit status when the command itself could not run.
const EXIT_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::parse();

    // Setup logging (stderr to keep stdout clean for JSON reports)
    let level = if config.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("warning: a global tracing subscriber was already installed");
    }

    match run(config).await {
        Ok(code) => code,
        Err(e) => {
            match e.downcast_ref::<AppError>() {
                Some(app) => error!("{}", app.user_message()),
                None => error!("{:#}", e),
            }
            ExitCode::from(EXIT_ERROR)
        }
    }
}

async fn run(config: Config) -> anyhow::Result<ExitCode> {
    match &config.command {
        Command::Buckets { action } => {
            let (_, manifest) = read_manifest(&config)?;
            let storage = RetryingDirectory::new(storage_client(&config)?, config.retries);
            match action {
                BucketAction::Verify => verify_buckets(&manifest, &storage, config.format).await,
                BucketAction::Create { dry_run } => {
                    create_buckets(&manifest, &storage, *dry_run, config.format).await
                }
            }
        }
        Command::Tables {
            action: TableAction::Verify { schema },
        } => {
            let (_, manifest) = read_manifest(&config)?;
            let pool = connect_db(&config).await?;
            let schema = schema
                .clone()
                .unwrap_or_else(|| manifest.tables.schema.clone());
            let catalog = TableCatalog::new(pool, schema);
            verify_tables(&manifest, &catalog, config.format).await
        }
        Command::Migrate { via, dir } => {
            let (path, manifest) = read_manifest(&config)?;
            let dir = dir
                .clone()
                .unwrap_or_else(|| manifest.migrations_dir(&path));
            migrate(&config, &manifest, &dir, *via).await
        }
        Command::Check => check(&config).await,
    }
}

fn read_manifest(config: &Config) -> anyhow::Result<(PathBuf, Manifest)> {
    let path = match &config.config {
        Some(path) => path.clone(),
        None => default_config_path()
            .ok_or_else(|| anyhow!("No config directory on this platform; pass --config"))?,
    };
    let manifest = load_manifest(&path)
        .with_context(|| format!("Failed to load manifest {}", path.display()))?;
    Ok((path, manifest))
}

fn storage_client(config: &Config) -> anyhow::Result<StorageClient> {
    let (url, key) = backend_credentials(config)?;
    StorageClient::new(url, key).context("Invalid storage configuration")
}

fn backend_credentials(config: &Config) -> anyhow::Result<(&str, &str)> {
    let url = config
        .supabase_url
        .as_deref()
        .ok_or_else(|| anyhow!("SUPABASE_URL is not set (or pass --supabase-url)"))?;
    let key = config.service_role_key.as_deref().ok_or_else(|| {
        anyhow!("SUPABASE_SERVICE_ROLE_KEY is not set (or pass --service-role-key)")
    })?;
    Ok((url, key))
}

async fn connect_db(config: &Config) -> anyhow::Result<PgPool> {
    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| anyhow!("DATABASE_URL is not set (or pass --database-url)"))?;

    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(DbConfig::default().max_connections)
        .connect(url)
        .await
        .map_err(AppError::DatabaseError)
        .context("Failed to connect to database")?;
    Ok(pool)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(AppError::SerializationError)?;
    println!("{}", json);
    Ok(())
}

fn print_reconciliation(
    kind: &str,
    report: &ReconciliationReport,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => print!("{}", render_reconciliation(kind, report)),
        OutputFormat::Json => print_json(&ReconciliationView::new(kind, report))?,
    }
    Ok(())
}

fn exit_for(complete: bool) -> ExitCode {
    if complete {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_INCOMPLETE)
    }
}

/// Compare the manifest's buckets against storage.
async fn verify_buckets(
    manifest: &Manifest,
    storage: &RetryingDirectory<StorageClient>,
    format: OutputFormat,
) -> anyhow::Result<ExitCode> {
    info!("Verifying {} buckets", manifest.buckets.len());
    let report = reconcile(expected_names(&manifest.buckets), storage).await?;
    print_reconciliation("Buckets", &report, format)?;
    Ok(exit_for(report.is_complete()))
}

/// Create each manifest bucket that storage does not list yet.
async fn create_buckets(
    manifest: &Manifest,
    storage: &RetryingDirectory<StorageClient>,
    dry_run: bool,
    format: OutputFormat,
) -> anyhow::Result<ExitCode> {
    let report = reconcile(expected_names(&manifest.buckets), storage).await?;
    let outcomes = create_missing(&manifest.buckets, &report, storage.inner(), dry_run).await;

    match format {
        OutputFormat::Text => print!("{}", render_creations(&outcomes, dry_run)),
        OutputFormat::Json => print_json(&serde_json::json!({
            "dry_run": dry_run,
            "buckets": outcomes,
        }))?,
    }

    Ok(exit_for(!any_failed(&outcomes)))
}

/// Compare the manifest's tables against the database catalog.
async fn verify_tables(
    manifest: &Manifest,
    catalog: &TableCatalog,
    format: OutputFormat,
) -> anyhow::Result<ExitCode> {
    info!(
        "Verifying {} tables in schema {}",
        manifest.tables.names.len(),
        catalog.schema()
    );
    let report = reconcile(manifest.table_names(), catalog).await?;
    print_reconciliation("Tables", &report, format)?;
    Ok(exit_for(report.is_complete()))
}

/// Apply every migration in manifest order through the chosen path.
async fn migrate(
    config: &Config,
    manifest: &Manifest,
    dir: &Path,
    via: ExecutionPath,
) -> anyhow::Result<ExitCode> {
    let names = &manifest.migrations.files;
    if names.is_empty() {
        warn!("Manifest lists no migrations");
    }
    info!("Reading migrations from {}", dir.display());
    let source = DirMigrationSource::new(dir);

    let report: MigrationRunReport = match via {
        ExecutionPath::Rpc => {
            let (url, key) = backend_credentials(config)?;
            let executor = RpcSqlExecutor::new(url, key).context("Invalid RPC configuration")?;
            apply_manifest(names, &source, &executor).await
        }
        ExecutionPath::Postgres => {
            let pool = connect_db(config).await?;
            let executor = PgSqlExecutor::new(pool);
            apply_manifest(names, &source, &executor).await
        }
    };

    match config.format {
        OutputFormat::Text => print!("{}", render_migration_report(&report)),
        OutputFormat::Json => print_json(&report)?,
    }
    Ok(exit_for(report.all_succeeded()))
}

/// One storage listing and, if configured, one database round trip.
async fn check(config: &Config) -> anyhow::Result<ExitCode> {
    let mut checks = Vec::new();

    match storage_client(config) {
        Ok(storage) => {
            let storage = RetryingDirectory::new(storage, config.retries);
            checks.push(check_result("storage", storage.list_names().await.map(|_| ())));
        }
        Err(e) => checks.push(CheckResult {
            target: "storage".to_string(),
            ok: false,
            error: Some(format!("{:#}", e)),
        }),
    }

    if config.database_url.is_some() {
        let result = match connect_db(config).await {
            Ok(pool) => portalctl_db::ping(&pool).await,
            Err(e) => Err(AppError::Generic(format!("{:#}", e))),
        };
        checks.push(check_result("database", result));
    } else {
        info!("DATABASE_URL not set, skipping database check");
    }

    match config.format {
        OutputFormat::Text => print!("{}", render_checks(&checks)),
        OutputFormat::Json => print_json(&checks)?,
    }
    Ok(exit_for(checks.iter().all(|c| c.ok)))
}

fn check_result(target: &str, result: Result<(), AppError>) -> CheckResult {
    match result {
        Ok(()) => CheckResult {
            target: target.to_string(),
            ok: true,
            error: None,
        },
        Err(e) => CheckResult {
            target: target.to_string(),
            ok: false,
            error: Some(e.user_message()),
        },
    }
}
