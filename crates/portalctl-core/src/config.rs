//! Configuration types for portalctl components.
//!
//! Connection settings come from the environment (see the CLI). What the
//! backend is supposed to contain lives in a TOML manifest:
//!
//! ```toml
//! [[buckets]]
//! name = "avatars"
//! public = true
//! file_size_limit = 5242880
//! allowed_mime_types = ["image/*"]
//!
//! [tables]
//! schema = "public"
//! names = ["profiles", "courses"]
//!
//! [migrations]
//! dir = "migrations"
//! files = ["001_profiles.sql", "002_courses.sql"]
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::AppError;
use crate::models::NamedResource;

/// Database connection pool configuration.
pub struct DbConfig {
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self { max_connections: 5 }
    }
}

/// HTTP client configuration for backend API calls.
pub struct HttpConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

/// Declared contents of the backend.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub buckets: Vec<NamedResource>,
    #[serde(default)]
    pub tables: TablesManifest,
    #[serde(default)]
    pub migrations: MigrationsManifest,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TablesManifest {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default)]
    pub names: Vec<String>,
}

impl Default for TablesManifest {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            names: Vec::new(),
        }
    }
}

fn default_schema() -> String {
    "public".to_string()
}

/// Ordered list of migration files. The order here is the application order.
#[derive(Debug, Clone, Deserialize)]
pub struct MigrationsManifest {
    #[serde(default = "default_migrations_dir")]
    pub dir: PathBuf,
    #[serde(default)]
    pub files: Vec<String>,
}

impl Default for MigrationsManifest {
    fn default() -> Self {
        Self {
            dir: default_migrations_dir(),
            files: Vec::new(),
        }
    }
}

fn default_migrations_dir() -> PathBuf {
    PathBuf::from("migrations")
}

impl Manifest {
    /// Parses a manifest from TOML text and validates it.
    pub fn from_toml(text: &str) -> Result<Self, AppError> {
        let manifest: Manifest =
            toml::from_str(text).map_err(|e| AppError::ConfigError(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), AppError> {
        let mut seen = BTreeSet::new();
        for bucket in &self.buckets {
            if bucket.name.is_empty() {
                return Err(AppError::ConfigError("bucket with empty name".to_string()));
            }
            if !seen.insert(bucket.name.as_str()) {
                return Err(AppError::ConfigError(format!(
                    "duplicate bucket '{}'",
                    bucket.name
                )));
            }
        }

        let mut seen = BTreeSet::new();
        for file in &self.migrations.files {
            if !seen.insert(file.as_str()) {
                return Err(AppError::ConfigError(format!(
                    "migration '{}' listed twice",
                    file
                )));
            }
        }
        Ok(())
    }

    /// Resolves the migrations directory against the manifest's location.
    pub fn migrations_dir(&self, manifest_path: &Path) -> PathBuf {
        if self.migrations.dir.is_absolute() {
            return self.migrations.dir.clone();
        }
        manifest_path
            .parent()
            .map(|parent| parent.join(&self.migrations.dir))
            .unwrap_or_else(|| self.migrations.dir.clone())
    }

    pub fn table_names(&self) -> BTreeSet<String> {
        self.tables.names.iter().cloned().collect()
    }
}

/// Default manifest location: `<config dir>/portalctl/manifest.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("portalctl").join("manifest.toml"))
}

/// Reads and validates the manifest at `path`.
pub fn load_manifest(path: &Path) -> Result<Manifest, AppError> {
    debug!("Loading manifest from {}", path.display());
    let text = std::fs::read_to_string(path)
        .map_err(|e| AppError::ConfigError(format!("cannot read {}: {}", path.display(), e)))?;
    Manifest::from_toml(&text)
}
