use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "portalctl")]
#[command(
    author,
    version,
    about = "Administration tasks for the student portal backend"
)]
#[command(after_help = "Examples:
  portalctl buckets verify --retries 3
  portalctl buckets create --dry-run
  portalctl tables verify
  portalctl migrate --via postgres
  portalctl check --format json")]
pub struct Config {
    /// Project URL of the hosted backend
    #[arg(long, env = "SUPABASE_URL", global = true)]
    pub supabase_url: Option<String>,

    /// Service role key used for storage and RPC calls
    #[arg(long, env = "SUPABASE_SERVICE_ROLE_KEY", global = true, hide_env_values = true)]
    pub service_role_key: Option<String>,

    /// PostgreSQL connection URL for direct database access
    #[arg(long, env = "DATABASE_URL", global = true, hide_env_values = true)]
    pub database_url: Option<String>,

    /// Path to the manifest.toml describing buckets, tables and migrations
    #[arg(short, long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Report output format
    #[arg(short, long, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Attempts per storage listing; transient failures are retried up to this many times
    #[arg(long, value_name = "N", default_value_t = 1, global = true)]
    pub retries: u32,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Verify or create storage buckets
    Buckets {
        #[command(subcommand)]
        action: BucketAction,
    },
    /// Verify database tables
    Tables {
        #[command(subcommand)]
        action: TableAction,
    },
    /// Apply the manifest's migrations in order
    #[command(after_help = "Every migration is attempted even if an earlier one fails.
The exit status is non-zero if any migration failed or was not found.")]
    Migrate {
        /// How SQL reaches the database
        #[arg(long, default_value = "rpc")]
        via: ExecutionPath,
        /// Directory holding the migration files (overrides the manifest)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },
    /// Check that the storage API and the database answer
    Check,
}

#[derive(Subcommand, Debug)]
pub enum BucketAction {
    /// Report expected buckets that do not exist
    Verify,
    /// Create expected buckets that do not exist
    Create {
        /// Only print which buckets would be created
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum TableAction {
    /// Report expected tables that do not exist
    Verify {
        /// Schema to inspect (overrides the manifest)
        #[arg(long)]
        schema: Option<String>,
    },
}

/// Where migration SQL is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionPath {
    /// The exec_sql RPC function over HTTP
    Rpc,
    /// A direct PostgreSQL connection
    Postgres,
}

/// Supported report formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable text
    Text,
    /// Pretty-printed JSON
    Json,
}
