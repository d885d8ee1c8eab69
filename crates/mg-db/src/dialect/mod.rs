//! SQL dialect abstraction
//!
//! A [`Dialect`] produces the bootstrap DDL and the parameterized bookkeeping
//! statements for one database engine family. Statements every engine shares
//! are provided as default methods built from the helpers in this module;
//! each engine overrides only what differs (placeholder syntax, identity
//! columns, existence guards).

mod duckdb;
mod mssql;
mod mysql;
mod postgres;

pub use self::duckdb::DuckDbDialect;
pub use self::mssql::MsSqlDialect;
pub use self::mysql::MySqlDialect;
pub use self::postgres::PostgresDialect;

use mg_core::DbDriver;

/// Schema holding the migrator-owned tables
pub const MIGRATOR_SCHEMA: &str = "migrator";
/// Applied migration records
pub const MIGRATIONS_TABLE: &str = "migrator_migrations";
/// Default tenant registry
pub const TENANTS_TABLE: &str = "migrator_tenants";
/// Versions grouping applied records
pub const VERSIONS_TABLE: &str = "migrator_versions";

/// Columns bound by [`Dialect::migration_insert_sql`], in bind order
pub const MIGRATION_INSERT_COLUMNS: &[&str] = &[
    "name",
    "source_dir",
    "filename",
    "type",
    "db_schema",
    "contents",
    "checksum",
    "version_id",
];

/// Trait for SQL dialect implementations
///
/// Row-returning statements project columns in a fixed order so one decoder
/// serves every engine:
/// - versions: `id, name, created`
/// - applied migrations: `id, name, source_dir, filename, type, db_schema,
///   created, contents, checksum, version id, version name, version created`
pub trait Dialect: Send + Sync {
    /// Get the dialect name
    fn name(&self) -> &'static str;

    /// Bind placeholder for the 1-based parameter `index`
    fn placeholder(&self, index: usize) -> String;

    /// Idempotent `CREATE SCHEMA`
    fn create_schema_sql(&self, schema: &str) -> String;

    /// `CREATE SCHEMA` for a new tenant. Fails when the schema already
    /// exists, so onboarding never lands on someone else's schema.
    fn create_tenant_schema_sql(&self, schema: &str) -> String {
        format!("create schema {schema}")
    }

    /// Idempotent creation of the migrations table (without `version_id`,
    /// which [`create_versions_table_sql`](Self::create_versions_table_sql)
    /// retrofits)
    fn create_migrations_table_sql(&self) -> String;

    /// Idempotent creation of the default tenants table
    fn create_tenants_table_sql(&self) -> String;

    /// Independent statements creating the versions table and retrofitting
    /// `version_id` onto existing migration rows under one synthetic
    /// "Initial version". Re-running them is a no-op.
    fn create_versions_table_sql(&self) -> Vec<String>;

    /// Whether the id generated by
    /// [`version_insert_sql`](Self::version_insert_sql) is available right
    /// after the insert, either from the driver's last-insert-id or from a
    /// returned row (see [`version_insert_returns_id`](Self::version_insert_returns_id)).
    /// When `false` the connector re-queries
    /// [`version_max_id_sql`](Self::version_max_id_sql) inside the same
    /// transaction.
    fn last_insert_id_supported(&self) -> bool;

    /// Whether [`version_insert_sql`](Self::version_insert_sql) yields the new
    /// id as a one-column result row (`RETURNING`, `OUTPUT`) rather than
    /// through a driver-level last-insert-id
    fn version_insert_returns_id(&self) -> bool {
        false
    }

    /// Wrap a timestamp column so the driver can decode it
    fn timestamp_column(&self, column: &str) -> String {
        column.to_string()
    }

    /// List tenant names
    fn tenant_select_sql(&self) -> String {
        format!(
            "select name from {} order by name",
            qualified(TENANTS_TABLE)
        )
    }

    /// Insert one tenant name (one bind parameter)
    fn tenant_insert_sql(&self) -> String {
        insert_sql(self, TENANTS_TABLE, &["name"])
    }

    /// Insert one applied migration record ([`MIGRATION_INSERT_COLUMNS`])
    fn migration_insert_sql(&self) -> String {
        insert_sql(self, MIGRATIONS_TABLE, MIGRATION_INSERT_COLUMNS)
    }

    /// All applied migrations ordered by version, then insertion order
    fn migration_select_sql(&self) -> String {
        format!("{} order by mv.id, mm.id", applied_select(self))
    }

    /// One applied migration by record id
    fn migration_by_id_sql(&self) -> String {
        format!("{} where mm.id = {}", applied_select(self), self.placeholder(1))
    }

    /// Applied migrations of one version, in insertion order
    fn migrations_by_version_sql(&self) -> String {
        format!(
            "{} where mm.version_id = {} order by mm.id",
            applied_select(self),
            self.placeholder(1)
        )
    }

    /// Insert a version row (one bind parameter: the version name)
    fn version_insert_sql(&self) -> String {
        insert_sql(self, VERSIONS_TABLE, &["name"])
    }

    /// Highest version id
    fn version_max_id_sql(&self) -> String {
        format!("select max(id) from {}", qualified(VERSIONS_TABLE))
    }

    /// All versions, newest first
    fn versions_select_sql(&self) -> String {
        format!("{} order by id desc", versions_select(self))
    }

    /// One version by id
    fn version_by_id_sql(&self) -> String {
        format!("{} where id = {}", versions_select(self), self.placeholder(1))
    }

    /// Versions that recorded a given file, newest first
    fn versions_by_file_sql(&self) -> String {
        format!(
            "{} where id in (select version_id from {} where filename = {}) order by id desc",
            versions_select(self),
            qualified(MIGRATIONS_TABLE),
            self.placeholder(1)
        )
    }
}

/// `migrator.<table>`
pub fn qualified(table: &str) -> String {
    format!("{MIGRATOR_SCHEMA}.{table}")
}

/// `insert into migrator.<table> (cols) values (<placeholders>)`
pub fn insert_sql<D: Dialect + ?Sized>(dialect: &D, table: &str, columns: &[&str]) -> String {
    let placeholders: Vec<String> = (1..=columns.len())
        .map(|i| dialect.placeholder(i))
        .collect();
    format!(
        "insert into {} ({}) values ({})",
        qualified(table),
        columns.join(", "),
        placeholders.join(", ")
    )
}

fn versions_select<D: Dialect + ?Sized>(dialect: &D) -> String {
    format!(
        "select id, name, {} from {}",
        dialect.timestamp_column("created"),
        qualified(VERSIONS_TABLE)
    )
}

fn applied_select<D: Dialect + ?Sized>(dialect: &D) -> String {
    format!(
        "select mm.id, mm.name, mm.source_dir, mm.filename, mm.type, mm.db_schema, {}, \
         mm.contents, mm.checksum, mv.id, mv.name, {} \
         from {} mm join {} mv on mm.version_id = mv.id",
        dialect.timestamp_column("mm.created"),
        dialect.timestamp_column("mv.created"),
        qualified(MIGRATIONS_TABLE),
        qualified(VERSIONS_TABLE)
    )
}

/// Build the dialect for a configured driver
pub fn dialect_for(driver: DbDriver) -> Box<dyn Dialect> {
    match driver {
        DbDriver::MySql => Box::new(MySqlDialect),
        DbDriver::SqlServer => Box::new(MsSqlDialect),
        DbDriver::Postgres => Box::new(PostgresDialect),
        DbDriver::DuckDb => Box::new(DuckDbDialect::new()),
    }
}

#[cfg(test)]
#[path = "dialect_test.rs"]
mod tests;
