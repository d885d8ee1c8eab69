//! Microsoft SQL Server dialect

use super::{qualified, Dialect, MIGRATIONS_TABLE, MIGRATOR_SCHEMA, TENANTS_TABLE, VERSIONS_TABLE};
use mg_core::Version;

/// SQL Server dialect.
///
/// SQL Server has no `if not exists` DDL clauses, so every statement is
/// wrapped in an `IF NOT EXISTS (...) BEGIN ... END` guard. Statements that
/// reference a column added earlier in the same batch go through
/// `sp_executesql` so they compile after the column exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsSqlDialect;

fn table_exists_guard(table: &str) -> String {
    format!(
        "IF NOT EXISTS (select * from information_schema.tables where table_schema = '{MIGRATOR_SCHEMA}' and table_name = '{table}')"
    )
}

impl Dialect for MsSqlDialect {
    fn name(&self) -> &'static str {
        "sqlserver"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("@p{index}")
    }

    fn create_schema_sql(&self, schema: &str) -> String {
        format!(
            "IF NOT EXISTS (select * from information_schema.schemata where schema_name = '{schema}')
BEGIN
  EXEC sp_executesql N'create schema {schema}';
END"
        )
    }

    fn create_tenant_schema_sql(&self, schema: &str) -> String {
        format!("EXEC sp_executesql N'create schema {schema}'")
    }

    fn create_migrations_table_sql(&self) -> String {
        format!(
            "{}
BEGIN
  create table [{MIGRATOR_SCHEMA}].{MIGRATIONS_TABLE} (
    id int identity (1,1) primary key,
    name varchar(200) not null,
    source_dir varchar(200) not null,
    filename varchar(200) not null,
    type int not null,
    db_schema varchar(200) not null,
    created datetime default CURRENT_TIMESTAMP,
    contents text,
    checksum varchar(64)
  );
END",
            table_exists_guard(MIGRATIONS_TABLE)
        )
    }

    fn create_tenants_table_sql(&self) -> String {
        format!(
            "{}
BEGIN
  create table [{MIGRATOR_SCHEMA}].{TENANTS_TABLE} (
    id int identity (1,1) primary key,
    name varchar(200) not null unique,
    created datetime default CURRENT_TIMESTAMP
  );
END",
            table_exists_guard(TENANTS_TABLE)
        )
    }

    fn create_versions_table_sql(&self) -> Vec<String> {
        let versions = qualified(VERSIONS_TABLE);
        let migrations = qualified(MIGRATIONS_TABLE);
        let initial = Version::INITIAL_VERSION_NAME;
        vec![format!(
            "{}
BEGIN
  declare @initial_version_id int;
  create table [{MIGRATOR_SCHEMA}].{VERSIONS_TABLE} (
    id int identity (1,1) primary key,
    name varchar(200) not null,
    created datetime default CURRENT_TIMESTAMP
  );
  alter table {migrations} add version_id int;
  EXEC sp_executesql N'create index migrator_migrations_version_id_idx on {migrations} (version_id)';
  if exists (select * from {migrations})
  BEGIN
    insert into {versions} (name) values ('{initial}');
    set @initial_version_id = scope_identity();
    EXEC sp_executesql N'update {migrations} set version_id = @id', N'@id int', @id = @initial_version_id;
  END
  EXEC sp_executesql N'alter table {migrations} alter column version_id int not null';
  EXEC sp_executesql N'alter table {migrations} add constraint migrator_versions_version_id_fk foreign key (version_id) references {versions} (id) on delete cascade';
END",
            table_exists_guard(VERSIONS_TABLE)
        )]
    }

    fn last_insert_id_supported(&self) -> bool {
        true
    }

    fn version_insert_returns_id(&self) -> bool {
        true
    }

    fn version_insert_sql(&self) -> String {
        // OUTPUT clause reports the identity value as a result row
        format!(
            "insert into {} (name) output inserted.id values ({})",
            qualified(VERSIONS_TABLE),
            self.placeholder(1)
        )
    }
}
