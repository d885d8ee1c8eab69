//! Connector trait definition

use crate::dialect::dialect_for;
use crate::duckdb::DuckDbConnector;
use crate::error::{DbError, DbResult};
use mg_core::{
    AppliedMigration, ApplyMode, Config, DbDriver, MigrationDefinition, TenantName, Version,
    VersionDetail, VersionSummary, DEFAULT_SCHEMA_PLACEHOLDER,
};

/// Owns the live database connection and executes apply batches.
///
/// Every mutating call runs in exactly one transaction: either all of its
/// statements and bookkeeping rows are committed or none are. Statements are
/// never retried.
pub trait Connector {
    /// Open the connection and idempotently create the migrator schema,
    /// migrations table, default tenants table (unless a tenant select
    /// override is configured) and versions table
    fn init(&mut self) -> DbResult<()>;

    /// Known tenant names, via the configured override or the dialect default
    fn tenants(&self) -> DbResult<Vec<String>>;

    /// All applied migration records ordered by version, then insertion order
    fn applied_migrations(&self) -> DbResult<Vec<AppliedMigration>>;

    /// All versions, newest first
    fn versions(&self) -> DbResult<Vec<Version>>;

    /// One version with its applied migrations
    fn version_by_id(&self, id: i64) -> DbResult<Option<VersionDetail>>;

    /// Versions that recorded the given file, newest first
    fn versions_by_file(&self, file: &str) -> DbResult<Vec<Version>>;

    /// One applied migration record by id
    fn applied_migration_by_id(&self, id: i64) -> DbResult<Option<AppliedMigration>>;

    /// Apply `definitions` to their target schemas in one transaction under a
    /// new version named `version_name`.
    ///
    /// Tenant-scoped definitions run against every current tenant; the rest
    /// run against their source directory. Nothing to execute (or
    /// [`ApplyMode::DryRun`]) leaves the database untouched and opens no
    /// version.
    fn apply_migrations(
        &mut self,
        mode: ApplyMode,
        version_name: &str,
        definitions: &[MigrationDefinition],
    ) -> DbResult<VersionSummary>;

    /// Create `tenant`'s schema, register it and replay the tenant-scoped
    /// `definitions` against it, all in one transaction under a new version
    fn add_tenant_and_apply_migrations(
        &mut self,
        mode: ApplyMode,
        version_name: &str,
        tenant: &TenantName,
        definitions: &[MigrationDefinition],
    ) -> DbResult<VersionSummary>;

    /// Release the connection. Safe to call repeatedly or before `init`.
    fn dispose(&mut self);
}

impl<C: Connector + ?Sized> Connector for Box<C> {
    fn init(&mut self) -> DbResult<()> {
        (**self).init()
    }

    fn tenants(&self) -> DbResult<Vec<String>> {
        (**self).tenants()
    }

    fn applied_migrations(&self) -> DbResult<Vec<AppliedMigration>> {
        (**self).applied_migrations()
    }

    fn versions(&self) -> DbResult<Vec<Version>> {
        (**self).versions()
    }

    fn version_by_id(&self, id: i64) -> DbResult<Option<VersionDetail>> {
        (**self).version_by_id(id)
    }

    fn versions_by_file(&self, file: &str) -> DbResult<Vec<Version>> {
        (**self).versions_by_file(file)
    }

    fn applied_migration_by_id(&self, id: i64) -> DbResult<Option<AppliedMigration>> {
        (**self).applied_migration_by_id(id)
    }

    fn apply_migrations(
        &mut self,
        mode: ApplyMode,
        version_name: &str,
        definitions: &[MigrationDefinition],
    ) -> DbResult<VersionSummary> {
        (**self).apply_migrations(mode, version_name, definitions)
    }

    fn add_tenant_and_apply_migrations(
        &mut self,
        mode: ApplyMode,
        version_name: &str,
        tenant: &TenantName,
        definitions: &[MigrationDefinition],
    ) -> DbResult<VersionSummary> {
        (**self).add_tenant_and_apply_migrations(mode, version_name, tenant, definitions)
    }

    fn dispose(&mut self) {
        (**self).dispose()
    }
}

/// Connector behaviour taken from configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorSettings {
    /// Token replaced with the target schema in migration bodies
    pub schema_placeholder: String,

    /// Override for listing tenants
    pub tenant_select_sql: Option<String>,

    /// Override for registering a tenant (one bind parameter)
    pub tenant_insert_sql: Option<String>,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            schema_placeholder: DEFAULT_SCHEMA_PLACEHOLDER.to_string(),
            tenant_select_sql: None,
            tenant_insert_sql: None,
        }
    }
}

impl ConnectorSettings {
    /// Settings from the migrator configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            schema_placeholder: config.schema_placeholder().to_string(),
            tenant_select_sql: config.tenant_select_sql.clone(),
            tenant_insert_sql: config.tenant_insert_sql.clone(),
        }
    }
}

/// Build the connector for the configured driver.
///
/// The connection itself is opened by [`Connector::init`].
pub fn open_connector(config: &Config) -> DbResult<Box<dyn Connector>> {
    let settings = ConnectorSettings::from_config(config);
    match config.driver {
        DbDriver::DuckDb => Ok(Box::new(DuckDbConnector::new(
            &config.data_source,
            settings,
        ))),
        other => Err(DbError::NotImplemented {
            backend: dialect_for(other).name().to_string(),
            feature: "connector (only the SQL dialect is available)".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(driver: &str) -> Config {
        Config::parse(&format!(
            "baseLocation: m\ndriver: {driver}\ndataSource: \":memory:\"\nsingleMigrations: [ref]\nschemaPlaceHolder: \":tenant\"\n"
        ))
        .unwrap()
    }

    #[test]
    fn test_settings_from_config() {
        let settings = ConnectorSettings::from_config(&config("duckdb"));
        assert_eq!(settings.schema_placeholder, ":tenant");
        assert!(settings.tenant_select_sql.is_none());
        assert_eq!(
            ConnectorSettings::default().schema_placeholder,
            DEFAULT_SCHEMA_PLACEHOLDER
        );
    }

    #[test]
    fn test_open_connector_duckdb() {
        let mut connector = open_connector(&config("duckdb")).unwrap();
        connector.init().unwrap();
        assert!(connector.tenants().unwrap().is_empty());
        connector.dispose();
    }

    #[test]
    fn test_open_connector_without_driver() {
        for driver in ["mysql", "postgres", "sqlserver"] {
            match open_connector(&config(driver)) {
                Err(DbError::NotImplemented { backend, .. }) => assert_eq!(backend, driver),
                Err(other) => panic!("unexpected error: {other}"),
                Ok(_) => panic!("{driver} has no connector"),
            }
        }
    }
}
