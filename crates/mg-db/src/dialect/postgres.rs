//! PostgreSQL dialect

use super::{qualified, Dialect, MIGRATIONS_TABLE, MIGRATOR_SCHEMA, TENANTS_TABLE, VERSIONS_TABLE};
use mg_core::Version;

/// PostgreSQL dialect.
///
/// Uses numbered `$n` placeholders and a `do $$ ... $$` block to guard the
/// versions retrofit. Drivers of the `lib/pq` family cannot report generated
/// ids, so the version id is re-queried.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn placeholder(&self, index: usize) -> String {
        format!("${index}")
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
  contents text,
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
        vec![format!(
            "do $$
declare
  initial_version_id integer;
begin
if not exists (select * from information_schema.tables where table_schema = '{MIGRATOR_SCHEMA}' and table_name = '{VERSIONS_TABLE}') then
  create table {versions} (
    id serial primary key,
    name varchar(200) not null,
    created timestamp default now()
  );
  alter table {migrations} add column version_id integer;
  create index migrator_migrations_version_id_idx on {migrations} (version_id);
  if exists (select * from {migrations}) then
    insert into {versions} (name) values ('{initial}') returning id into initial_version_id;
    update {migrations} set version_id = initial_version_id;
  end if;
  alter table {migrations} alter column version_id set not null;
  alter table {migrations}
    add constraint migrator_versions_version_id_fk foreign key (version_id) references {versions} (id) on delete cascade;
end if;
end $$"
        )]
    }

    fn last_insert_id_supported(&self) -> bool {
        false
    }
}
