//! DuckDB connector implementation
//!
//! [`DuckDbConnector`] owns one DuckDB [`Connection`] and runs bootstrap and
//! every apply batch inside a single [`duckdb::Transaction`], rolling back on
//! the first failing statement.

use crate::connector::{Connector, ConnectorSettings};
use crate::dialect::{Dialect, DuckDbDialect, MIGRATOR_SCHEMA};
use crate::error::{DbError, DbResult};
use crate::row_helpers::{into_applied, into_version, read_applied_row, read_version_row};
use chrono::Utc;
use duckdb::{params, Connection, Params};
use mg_core::{
    AppliedMigration, ApplyMode, MigrationDefinition, TenantName, Version, VersionDetail,
    VersionSummary,
};
use std::path::Path;

/// Connector backed by a DuckDB database file (or `:memory:`)
pub struct DuckDbConnector {
    data_source: String,
    settings: ConnectorSettings,
    dialect: DuckDbDialect,
    conn: Option<Connection>,
}

impl DuckDbConnector {
    /// Connector for `data_source`; nothing is opened until [`Connector::init`]
    pub fn new(data_source: &str, settings: ConnectorSettings) -> Self {
        Self {
            data_source: data_source.to_string(),
            settings,
            dialect: DuckDbDialect::new(),
            conn: None,
        }
    }

    /// Connector over a fresh in-memory database
    pub fn in_memory(settings: ConnectorSettings) -> Self {
        Self::new(":memory:", settings)
    }

    /// Replace the dialect (e.g. one that does not read ids via `RETURNING`)
    pub fn with_dialect(mut self, dialect: DuckDbDialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Borrow the open connection
    pub fn conn(&self) -> DbResult<&Connection> {
        self.conn.as_ref().ok_or(DbError::NotConnected)
    }

    /// Whether [`Connector::init`] has opened a connection
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn open(&self) -> DbResult<Connection> {
        let result = if self.data_source == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(Path::new(&self.data_source))
        };
        result.map_err(|e| DbError::ConnectionError(format!("{e}: {}", self.data_source)))
    }

    fn tenant_select_sql(&self) -> String {
        self.settings
            .tenant_select_sql
            .clone()
            .unwrap_or_else(|| self.dialect.tenant_select_sql())
    }

    fn tenant_insert_sql(&self) -> String {
        self.settings
            .tenant_insert_sql
            .clone()
            .unwrap_or_else(|| self.dialect.tenant_insert_sql())
    }
}

/// Run `body` inside one DuckDB transaction and commit when it succeeds.
///
/// The [`duckdb::Transaction`] guard rolls back whenever it is dropped
/// uncommitted: on an `Err` from `body` and while unwinding from a panic.
pub(crate) fn in_transaction<T>(
    conn: &mut Connection,
    body: impl FnOnce(&Connection) -> DbResult<T>,
) -> DbResult<T> {
    let tx = conn
        .transaction()
        .map_err(|e| DbError::TransactionError(format!("could not begin: {e}")))?;

    let value = body(&tx).inspect_err(|e| log::warn!("Rolling back: {e}"))?;

    tx.commit()
        .map_err(|e| DbError::TransactionError(format!("could not commit: {e}")))?;
    Ok(value)
}

/// Create the migrator tables in one transaction so a failed retrofit
/// leaves nothing half-written behind
fn bootstrap(conn: &mut Connection, dialect: &dyn Dialect, default_tenants: bool) -> DbResult<()> {
    in_transaction(conn, |tx| {
        let run = |step: &str, sql: &str| {
            tx.execute_batch(sql).map_err(|e| DbError::BootstrapError {
                step: step.to_string(),
                message: e.to_string(),
            })
        };

        run("create migrator schema", &dialect.create_schema_sql(MIGRATOR_SCHEMA))?;
        run(
            "create migrator migrations table",
            &dialect.create_migrations_table_sql(),
        )?;
        if default_tenants {
            run(
                "create migrator tenants table",
                &dialect.create_tenants_table_sql(),
            )?;
        }
        for sql in dialect.create_versions_table_sql() {
            run("create migrator versions table", &sql)?;
        }
        Ok(())
    })
}

fn query_tenants(conn: &Connection, sql: &str) -> DbResult<Vec<String>> {
    let failed = |e: duckdb::Error| DbError::QueryError(format!("could not list tenants: {e}"));
    let mut stmt = conn.prepare(sql).map_err(failed)?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(failed)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(failed)
}

/// Fail when `tenant` is already registered under any casing; schema names
/// are case-insensitive, so "ABC" would land on the schema of "abc"
fn reject_registered(conn: &Connection, tenant_select: &str, tenant: &TenantName) -> DbResult<()> {
    let existing = query_tenants(conn, tenant_select)?
        .into_iter()
        .find(|t| t.eq_ignore_ascii_case(tenant.as_str()));
    match existing {
        Some(existing) => Err(DbError::TenantError {
            tenant: tenant.to_string(),
            message: format!("tenant '{existing}' is already registered"),
        }),
        None => Ok(()),
    }
}

fn query_versions<P: Params>(conn: &Connection, sql: &str, params: P) -> DbResult<Vec<Version>> {
    let failed = |e: duckdb::Error| DbError::QueryError(format!("could not read versions: {e}"));
    let mut stmt = conn.prepare(sql).map_err(failed)?;
    let rows = stmt
        .query_map(params, read_version_row)
        .map_err(failed)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(failed)?;
    rows.into_iter().map(into_version).collect()
}

fn query_applied<P: Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> DbResult<Vec<AppliedMigration>> {
    let failed =
        |e: duckdb::Error| DbError::QueryError(format!("could not read applied migrations: {e}"));
    let mut stmt = conn.prepare(sql).map_err(failed)?;
    let rows = stmt
        .query_map(params, read_applied_row)
        .map_err(failed)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(failed)?;
    rows.into_iter().map(into_applied).collect()
}

/// Insert a version row and read it back
fn open_version(conn: &Connection, dialect: &dyn Dialect, name: &str) -> DbResult<Version> {
    let insert = dialect.version_insert_sql();
    let id: i64 = if dialect.version_insert_returns_id() {
        conn.query_row(&insert, params![name], |row| row.get(0))
    } else {
        conn.execute(&insert, params![name])
            .and_then(|_| conn.query_row(&dialect.version_max_id_sql(), [], |row| row.get(0)))
    }
    .map_err(|e| DbError::TransactionError(format!("could not create version '{name}': {e}")))?;

    query_versions(conn, &dialect.version_by_id_sql(), params![id])?
        .into_iter()
        .next()
        .ok_or_else(|| DbError::TransactionError(format!("version {id} vanished after insert")))
}

/// Execute each definition against its target schemas and record it
fn apply_definitions(
    conn: &Connection,
    dialect: &dyn Dialect,
    placeholder: &str,
    tenants: &[String],
    definitions: &[MigrationDefinition],
    version_id: i64,
) -> DbResult<()> {
    let insert = dialect.migration_insert_sql();

    for definition in definitions {
        let single = [definition.source_dir.clone()];
        let schemas: &[String] = if definition.kind.is_tenant() {
            tenants
        } else {
            &single
        };

        for schema in schemas {
            log::debug!(
                "Applying {} {} to schema {}",
                definition.kind,
                definition.file,
                schema
            );
            let contents = if placeholder.is_empty() {
                definition.contents.clone()
            } else {
                definition.contents.replace(placeholder, schema)
            };
            conn.execute_batch(&contents)
                .map_err(|e| DbError::ExecutionError {
                    schema: schema.clone(),
                    file: definition.file.clone(),
                    message: e.to_string(),
                })?;

            conn.execute(
                &insert,
                params![
                    definition.name,
                    definition.source_dir,
                    definition.file,
                    definition.kind.code(),
                    schema,
                    definition.contents,
                    definition.checksum,
                    version_id
                ],
            )
            .map_err(|e| DbError::ExecutionError {
                schema: schema.clone(),
                file: definition.file.clone(),
                message: format!("could not record migration: {e}"),
            })?;
        }
    }
    Ok(())
}

impl Connector for DuckDbConnector {
    fn init(&mut self) -> DbResult<()> {
        if self.conn.is_none() {
            log::debug!("Opening DuckDB database {}", self.data_source);
            self.conn = Some(self.open()?);
        }
        let default_tenants = self.settings.tenant_select_sql.is_none();
        let conn = self.conn.as_mut().ok_or(DbError::NotConnected)?;
        bootstrap(conn, &self.dialect, default_tenants)
    }

    fn tenants(&self) -> DbResult<Vec<String>> {
        query_tenants(self.conn()?, &self.tenant_select_sql())
    }

    fn applied_migrations(&self) -> DbResult<Vec<AppliedMigration>> {
        query_applied(self.conn()?, &self.dialect.migration_select_sql(), [])
    }

    fn versions(&self) -> DbResult<Vec<Version>> {
        query_versions(self.conn()?, &self.dialect.versions_select_sql(), [])
    }

    fn version_by_id(&self, id: i64) -> DbResult<Option<VersionDetail>> {
        let conn = self.conn()?;
        let Some(version) = query_versions(conn, &self.dialect.version_by_id_sql(), params![id])?
            .into_iter()
            .next()
        else {
            return Ok(None);
        };
        let migrations = query_applied(
            conn,
            &self.dialect.migrations_by_version_sql(),
            params![id],
        )?;
        Ok(Some(VersionDetail {
            version,
            migrations,
        }))
    }

    fn versions_by_file(&self, file: &str) -> DbResult<Vec<Version>> {
        query_versions(
            self.conn()?,
            &self.dialect.versions_by_file_sql(),
            params![file],
        )
    }

    fn applied_migration_by_id(&self, id: i64) -> DbResult<Option<AppliedMigration>> {
        Ok(
            query_applied(self.conn()?, &self.dialect.migration_by_id_sql(), params![id])?
                .into_iter()
                .next(),
        )
    }

    fn apply_migrations(
        &mut self,
        mode: ApplyMode,
        version_name: &str,
        definitions: &[MigrationDefinition],
    ) -> DbResult<VersionSummary> {
        let started_at = Utc::now();
        let tenant_select = self.tenant_select_sql();
        let conn = self.conn()?;

        if mode.is_dry_run() {
            let tenants = query_tenants(conn, &tenant_select)?;
            let summary = VersionSummary::tally(started_at, tenants.len(), definitions);
            log::info!(
                "Dry run: {} migration(s) and {} script(s) across {} tenant(s) would be applied",
                summary.migrations_grand_total,
                summary.scripts_grand_total,
                summary.tenants
            );
            return Ok(summary.finish(None));
        }

        let conn = self.conn.as_mut().ok_or(DbError::NotConnected)?;
        let dialect = &self.dialect;
        let placeholder = self.settings.schema_placeholder.as_str();
        let (summary, version) = in_transaction(conn, |tx| {
            let tenants = query_tenants(tx, &tenant_select)?;
            let summary = VersionSummary::tally(started_at, tenants.len(), definitions);
            if summary.applied_count() == 0 {
                return Ok((summary, None));
            }
            let version = open_version(tx, dialect, version_name)?;
            apply_definitions(tx, dialect, placeholder, &tenants, definitions, version.id)?;
            Ok((summary, Some(version)))
        })?;

        match &version {
            Some(v) => log::info!(
                "Version {} '{}' committed: {} migration(s) and {} script(s) across {} tenant(s)",
                v.id,
                v.name,
                summary.migrations_grand_total,
                summary.scripts_grand_total,
                summary.tenants
            ),
            None => log::info!("Nothing to apply, no version created"),
        }
        Ok(summary.finish(version))
    }

    fn add_tenant_and_apply_migrations(
        &mut self,
        mode: ApplyMode,
        version_name: &str,
        tenant: &TenantName,
        definitions: &[MigrationDefinition],
    ) -> DbResult<VersionSummary> {
        let started_at = Utc::now();
        let tenant_definitions: Vec<MigrationDefinition> = definitions
            .iter()
            .filter(|d| d.kind.is_tenant())
            .cloned()
            .collect();
        let skipped = definitions.len() - tenant_definitions.len();
        if skipped > 0 {
            log::debug!(
                "Ignoring {skipped} single-schema definition(s) while onboarding tenant {tenant}"
            );
        }

        let summary = VersionSummary::tally(started_at, 1, &tenant_definitions);
        let tenant_select = self.tenant_select_sql();
        let tenant_insert = self.tenant_insert_sql();

        if mode.is_dry_run() {
            reject_registered(self.conn()?, &tenant_select, tenant)?;
            log::info!(
                "Dry run: tenant {tenant} would be created with {} migration(s) and {} script(s)",
                summary.tenant_migrations,
                summary.tenant_scripts
            );
            return Ok(summary.finish(None));
        }

        let conn = self.conn.as_mut().ok_or(DbError::NotConnected)?;
        let dialect = &self.dialect;
        let placeholder = self.settings.schema_placeholder.as_str();
        let version = in_transaction(conn, |tx| {
            reject_registered(tx, &tenant_select, tenant)?;
            let registration_failed = |e: duckdb::Error| DbError::TenantError {
                tenant: tenant.to_string(),
                message: e.to_string(),
            };
            tx.execute_batch(&dialect.create_tenant_schema_sql(tenant))
                .map_err(registration_failed)?;
            tx.execute(&tenant_insert, params![tenant.as_str()])
                .map_err(registration_failed)?;

            let version = open_version(tx, dialect, version_name)?;
            let tenants = [tenant.to_string()];
            apply_definitions(
                tx,
                dialect,
                placeholder,
                &tenants,
                &tenant_definitions,
                version.id,
            )?;
            Ok(version)
        })?;

        log::info!(
            "Tenant {tenant} added under version {} '{}'",
            version.id,
            version.name
        );
        Ok(summary.finish(Some(version)))
    }

    fn dispose(&mut self) {
        if let Some(conn) = self.conn.take() {
            log::debug!("Closing DuckDB database {}", self.data_source);
            if let Err((_, e)) = conn.close() {
                log::warn!("Error closing DuckDB database {}: {e}", self.data_source);
            }
        }
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
