//! mg-core - Core library for the tenant migrator
//!
//! This crate provides the shared data model (migration definitions, applied
//! records, versions and apply summaries), configuration parsing, checksum
//! computation and the [`Loader`] contract used to read source migrations.

pub mod checksum;
pub mod config;
pub mod error;
pub mod loader;
pub mod migration;
pub mod summary;
pub mod tenant_name;

pub use checksum::compute_checksum;
pub use config::{Config, DbDriver, DEFAULT_SCHEMA_PLACEHOLDER};
pub use error::{CoreError, CoreResult};
pub use loader::{DiskLoader, Loader, StaticLoader};
pub use migration::{AppliedMigration, MigrationDefinition, MigrationKind, Version, VersionDetail};
pub use summary::{ApplyMode, VersionSummary};
pub use tenant_name::TenantName;
