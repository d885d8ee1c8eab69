//! mg-db - Database layer for the tenant migrator
//!
//! This crate provides the [`Dialect`] trait with MySQL, SQL Server,
//! PostgreSQL and DuckDB implementations, and the [`Connector`] trait with a
//! DuckDB-backed implementation that bootstraps the migrator tables and
//! applies migration batches inside a single transaction.

pub mod connector;
pub mod dialect;
pub mod duckdb;
pub mod error;
pub(crate) mod row_helpers;

pub use connector::{open_connector, Connector, ConnectorSettings};
pub use dialect::{
    dialect_for, Dialect, DuckDbDialect, MsSqlDialect, MySqlDialect, PostgresDialect,
    MIGRATIONS_TABLE, MIGRATOR_SCHEMA, TENANTS_TABLE, VERSIONS_TABLE,
};
pub use self::duckdb::DuckDbConnector;
pub use error::{DbError, DbResult};
