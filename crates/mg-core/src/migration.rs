//! Migration definitions, applied migration records and versions.

use crate::checksum::compute_checksum;
use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a migration definition.
///
/// The numeric codes are what gets persisted in `migrator_migrations.type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationKind {
    /// Applied once to the single schema named by its source directory
    SingleMigration,
    /// Applied once to every tenant schema
    TenantMigration,
    /// Executed against the single schema on every apply
    SingleScript,
    /// Executed against every tenant schema on every apply
    TenantScript,
}

impl MigrationKind {
    /// Persisted numeric code
    pub fn code(self) -> i32 {
        match self {
            MigrationKind::SingleMigration => 1,
            MigrationKind::TenantMigration => 2,
            MigrationKind::SingleScript => 3,
            MigrationKind::TenantScript => 4,
        }
    }

    /// Decode a persisted numeric code
    pub fn from_code(code: i32) -> CoreResult<Self> {
        match code {
            1 => Ok(MigrationKind::SingleMigration),
            2 => Ok(MigrationKind::TenantMigration),
            3 => Ok(MigrationKind::SingleScript),
            4 => Ok(MigrationKind::TenantScript),
            _ => Err(CoreError::InvalidMigrationKind { code }),
        }
    }

    /// Tenant-scoped kinds run once per known tenant schema
    pub fn is_tenant(self) -> bool {
        matches!(
            self,
            MigrationKind::TenantMigration | MigrationKind::TenantScript
        )
    }

    /// Script kinds have no "applied" state and always re-run
    pub fn is_script(self) -> bool {
        matches!(
            self,
            MigrationKind::SingleScript | MigrationKind::TenantScript
        )
    }
}

impl fmt::Display for MigrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationKind::SingleMigration => write!(f, "single migration"),
            MigrationKind::TenantMigration => write!(f, "tenant migration"),
            MigrationKind::SingleScript => write!(f, "single script"),
            MigrationKind::TenantScript => write!(f, "tenant script"),
        }
    }
}

/// A source migration as produced by a [`Loader`](crate::Loader).
///
/// Identity is the pair `(name, source_dir)`: two definitions may share a
/// name when they come from different source directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationDefinition {
    /// Logical id, conventionally a sortable timestamp-prefixed file name
    pub name: String,

    /// Single schema name or tenant migration group the file was read from
    pub source_dir: String,

    /// Relative path used for display and tie-breaking
    pub file: String,

    /// Migration kind
    pub kind: MigrationKind,

    /// Raw statement text, possibly containing the schema placeholder
    pub contents: String,

    /// Hex SHA-256 of `contents`
    pub checksum: String,
}

impl MigrationDefinition {
    /// Build a definition, computing the checksum from `contents`.
    ///
    /// `file` defaults to `<source_dir>/<name>`.
    pub fn new(
        name: impl Into<String>,
        source_dir: impl Into<String>,
        kind: MigrationKind,
        contents: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let source_dir = source_dir.into();
        let contents = contents.into();
        Self {
            file: format!("{source_dir}/{name}"),
            checksum: compute_checksum(&contents),
            name,
            source_dir,
            kind,
            contents,
        }
    }

    /// Identity key `(name, source_dir)`
    pub fn key(&self) -> (&str, &str) {
        (&self.name, &self.source_dir)
    }
}

/// A group of applied migration records written by one apply call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Monotonic version id
    pub id: i64,

    /// Human label
    pub name: String,

    /// Creation timestamp
    pub created: DateTime<Utc>,
}

impl Version {
    /// Label of the synthetic version that absorbs pre-versioning history
    pub const INITIAL_VERSION_NAME: &'static str = "Initial version";
}

/// A migration definition snapshot as recorded against a concrete schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedMigration {
    /// Record id in `migrator_migrations`
    pub id: i64,

    /// Definition snapshot at the time it was applied
    pub definition: MigrationDefinition,

    /// Schema the definition ran against
    pub schema: String,

    /// When the record was written
    pub created: DateTime<Utc>,

    /// Version the record belongs to
    pub version: Version,
}

/// A version together with the records it grouped, in insertion order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionDetail {
    pub version: Version,
    pub migrations: Vec<AppliedMigration>,
}
