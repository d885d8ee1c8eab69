//! Configuration types and parsing for migrator.yaml

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Token substituted with the target schema name when none is configured
pub const DEFAULT_SCHEMA_PLACEHOLDER: &str = "{schema}";

/// Migrator configuration from migrator.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Root directory containing the migration source directories
    #[serde(rename = "baseLocation")]
    pub base_location: String,

    /// Database engine family
    pub driver: DbDriver,

    /// Driver-specific data source (a file path or `:memory:` for DuckDB)
    #[serde(rename = "dataSource")]
    pub data_source: String,

    /// Statement listing tenant names, overriding the migrator tenants table
    #[serde(rename = "tenantSelectSQL", default)]
    pub tenant_select_sql: Option<String>,

    /// Statement inserting a tenant name (one bind parameter)
    #[serde(rename = "tenantInsertSQL", default)]
    pub tenant_insert_sql: Option<String>,

    /// Token replaced with the target schema in migration bodies
    #[serde(rename = "schemaPlaceHolder", default)]
    pub schema_placeholder: Option<String>,

    /// Directories holding single-schema migrations (directory name = schema)
    #[serde(rename = "singleMigrations", default)]
    pub single_migrations: Vec<String>,

    /// Directories holding tenant migrations
    #[serde(rename = "tenantMigrations", default)]
    pub tenant_migrations: Vec<String>,

    /// Directories holding single-schema scripts
    #[serde(rename = "singleScripts", default)]
    pub single_scripts: Vec<String>,

    /// Directories holding tenant scripts
    #[serde(rename = "tenantScripts", default)]
    pub tenant_scripts: Vec<String>,
}

/// Database engine family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbDriver {
    /// MySQL / MariaDB
    MySql,
    /// Microsoft SQL Server
    #[serde(alias = "mssql")]
    SqlServer,
    /// PostgreSQL
    #[serde(alias = "postgresql")]
    Postgres,
    /// DuckDB (embedded)
    DuckDb,
}

impl std::fmt::Display for DbDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DbDriver::MySql => write!(f, "mysql"),
            DbDriver::SqlServer => write!(f, "sqlserver"),
            DbDriver::Postgres => write!(f, "postgres"),
            DbDriver::DuckDb => write!(f, "duckdb"),
        }
    }
}

impl Config {
    /// Load configuration from a file path
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::ReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn parse(content: &str) -> CoreResult<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> CoreResult<()> {
        if self.base_location.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "baseLocation cannot be empty".to_string(),
            });
        }

        if self.data_source.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "dataSource cannot be empty".to_string(),
            });
        }

        if self.single_migrations.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "At least one singleMigrations entry must be specified".to_string(),
            });
        }

        if let Some(placeholder) = &self.schema_placeholder {
            if placeholder.is_empty() {
                return Err(CoreError::ConfigInvalid {
                    message: "schemaPlaceHolder cannot be empty when set".to_string(),
                });
            }
        }

        if self.tenant_insert_sql.is_some() != self.tenant_select_sql.is_some() {
            log::warn!(
                "Only one of tenantSelectSQL/tenantInsertSQL is set; the other falls back to the migrator tenants table"
            );
        }

        Ok(())
    }

    /// The configured schema placeholder or [`DEFAULT_SCHEMA_PLACEHOLDER`]
    pub fn schema_placeholder(&self) -> &str {
        self.schema_placeholder
            .as_deref()
            .unwrap_or(DEFAULT_SCHEMA_PLACEHOLDER)
    }

    /// Get the absolute base location relative to a root directory
    pub fn base_location_absolute(&self, root: &Path) -> PathBuf {
        root.join(&self.base_location)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
