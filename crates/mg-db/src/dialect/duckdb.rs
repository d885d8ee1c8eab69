//! DuckDB dialect

use super::{qualified, Dialect, MIGRATIONS_TABLE, TENANTS_TABLE, VERSIONS_TABLE};
use mg_core::Version;

/// DuckDB dialect.
///
/// DuckDB has no procedural blocks and cannot add constraints to an existing
/// table, so the versions bootstrap is a list of individually idempotent
/// statements and `version_id` stays nullable at the DDL level (the connector
/// always writes it). The migrations table carries no index so that
/// `ALTER TABLE ... ADD COLUMN` stays possible; its ids come from a sequence
/// referenced by the insert statement.
#[derive(Debug, Clone, Copy)]
pub struct DuckDbDialect {
    returning_ids: bool,
}

impl DuckDbDialect {
    /// Dialect reading generated version ids through `RETURNING`
    pub fn new() -> Self {
        Self {
            returning_ids: true,
        }
    }

    /// Dialect that re-queries the max version id after inserting
    pub fn without_returning() -> Self {
        Self {
            returning_ids: false,
        }
    }
}

impl Default for DuckDbDialect {
    fn default() -> Self {
        Self::new()
    }
}

fn sequence(table: &str) -> String {
    qualified(&format!("{table}_id_seq"))
}

impl Dialect for DuckDbDialect {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn create_schema_sql(&self, schema: &str) -> String {
        format!("CREATE SCHEMA IF NOT EXISTS {schema}")
    }

    fn create_tenant_schema_sql(&self, schema: &str) -> String {
        format!("CREATE SCHEMA {schema}")
    }

    fn create_migrations_table_sql(&self) -> String {
        format!(
            "CREATE SEQUENCE IF NOT EXISTS {};
CREATE TABLE IF NOT EXISTS {} (
  id BIGINT NOT NULL,
  name VARCHAR NOT NULL,
  source_dir VARCHAR NOT NULL,
  filename VARCHAR NOT NULL,
  type INTEGER NOT NULL,
  db_schema VARCHAR NOT NULL,
  created TIMESTAMP NOT NULL DEFAULT now(),
  contents VARCHAR NOT NULL,
  checksum VARCHAR NOT NULL
);",
            sequence(MIGRATIONS_TABLE),
            qualified(MIGRATIONS_TABLE)
        )
    }

    fn create_tenants_table_sql(&self) -> String {
        let seq = sequence(TENANTS_TABLE);
        format!(
            "CREATE SEQUENCE IF NOT EXISTS {seq};
CREATE TABLE IF NOT EXISTS {} (
  id BIGINT PRIMARY KEY DEFAULT nextval('{seq}'),
  name VARCHAR NOT NULL UNIQUE,
  created TIMESTAMP NOT NULL DEFAULT now()
);",
            qualified(TENANTS_TABLE)
        )
    }

    fn create_versions_table_sql(&self) -> Vec<String> {
        let seq = sequence(VERSIONS_TABLE);
        let versions = qualified(VERSIONS_TABLE);
        let migrations = qualified(MIGRATIONS_TABLE);
        let initial = Version::INITIAL_VERSION_NAME;
        vec![
            format!("CREATE SEQUENCE IF NOT EXISTS {seq}"),
            format!(
                "CREATE TABLE IF NOT EXISTS {versions} (
  id BIGINT PRIMARY KEY DEFAULT nextval('{seq}'),
  name VARCHAR NOT NULL,
  created TIMESTAMP NOT NULL DEFAULT now()
)"
            ),
            format!("ALTER TABLE {migrations} ADD COLUMN IF NOT EXISTS version_id BIGINT"),
            format!(
                "INSERT INTO {versions} (name) SELECT '{initial}' \
                 WHERE EXISTS (SELECT 1 FROM {migrations} WHERE version_id IS NULL)"
            ),
            format!(
                "UPDATE {migrations} SET version_id = \
                 (SELECT max(id) FROM {versions} WHERE name = '{initial}') \
                 WHERE version_id IS NULL"
            ),
        ]
    }

    fn last_insert_id_supported(&self) -> bool {
        self.returning_ids
    }

    fn version_insert_returns_id(&self) -> bool {
        self.returning_ids
    }

    fn timestamp_column(&self, column: &str) -> String {
        format!("epoch_ms({column})")
    }

    fn migration_insert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (id, name, source_dir, filename, type, db_schema, contents, checksum, version_id) \
             VALUES (nextval('{}'), ?, ?, ?, ?, ?, ?, ?, ?)",
            qualified(MIGRATIONS_TABLE),
            sequence(MIGRATIONS_TABLE)
        )
    }

    fn version_insert_sql(&self) -> String {
        let insert = format!("INSERT INTO {} (name) VALUES (?)", qualified(VERSIONS_TABLE));
        if self.returning_ids {
            format!("{insert} RETURNING id")
        } else {
            insert
        }
    }
}
