//! MySQL / MariaDB dialect

use super::{qualified, Dialect, MIGRATIONS_TABLE, MIGRATOR_SCHEMA, TENANTS_TABLE, VERSIONS_TABLE};
use mg_core::Version;

const CREATE_VERSIONS_PROCEDURE: &str = "migrator_create_versions";

/// MySQL dialect.
///
/// MySQL cannot execute anonymous blocks, so the versions bootstrap is a
/// drop/create/call sequence around a stored procedure.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn create_schema_sql(&self, schema: &str) -> String {
        format!("create schema if not exists {schema}")
    }

    fn create_migrations_table_sql(&self) -> String {
        format!(
            "create table if not exists {} (
  id serial primary key,
  name varchar(200) not null,
  source_dir varchar(200) not null,
  filename varchar(200) not null,
  type int not null,
  db_schema varchar(200) not null,
  created timestamp default now(),
  contents longtext,
  checksum varchar(64)
)",
            qualified(MIGRATIONS_TABLE)
        )
    }

    fn create_tenants_table_sql(&self) -> String {
        format!(
            "create table if not exists {} (
  id serial primary key,
  name varchar(200) not null unique,
  created timestamp default now()
)",
            qualified(TENANTS_TABLE)
        )
    }

    fn create_versions_table_sql(&self) -> Vec<String> {
        let versions = qualified(VERSIONS_TABLE);
        let migrations = qualified(MIGRATIONS_TABLE);
        let initial = Version::INITIAL_VERSION_NAME;
        vec![
            format!("drop procedure if exists {MIGRATOR_SCHEMA}.{CREATE_VERSIONS_PROCEDURE}"),
            format!(
                "create procedure {MIGRATOR_SCHEMA}.{CREATE_VERSIONS_PROCEDURE}()
begin
if not exists (select * from information_schema.tables where table_schema = '{MIGRATOR_SCHEMA}' and table_name = '{VERSIONS_TABLE}') then
  create table {versions} (
    id serial primary key,
    name varchar(200) not null,
    created timestamp default now()
  );
  alter table {migrations} add column version_id bigint unsigned;
  create index migrator_migrations_version_id_idx on {migrations} (version_id);
  if exists (select * from {migrations}) then
    insert into {versions} (name) values ('{initial}');
    update {migrations} set version_id = last_insert_id();
  end if;
  alter table {migrations} modify version_id bigint unsigned not null;
  alter table {migrations}
    add constraint migrator_versions_version_id_fk foreign key (version_id) references {versions} (id) on delete cascade;
end if;
end"
            ),
            format!("call {MIGRATOR_SCHEMA}.{CREATE_VERSIONS_PROCEDURE}()"),
        ]
    }

    // the driver's LastInsertId; the insert itself returns no row
    fn last_insert_id_supported(&self) -> bool {
        true
    }
}
