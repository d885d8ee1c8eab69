//! Apply modes and the per-call version summary.

use crate::migration::{MigrationDefinition, MigrationKind, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether an apply call touches the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMode {
    /// Compute and report the pending work without executing it
    DryRun,
    /// Execute the pending work in one transaction and record it
    #[default]
    Apply,
}

impl ApplyMode {
    /// Returns `true` for [`ApplyMode::DryRun`]
    pub fn is_dry_run(self) -> bool {
        matches!(self, ApplyMode::DryRun)
    }
}

/// Outcome of one apply call.
///
/// Counts cover the definitions handed to the call; the `*_total` fields
/// multiply tenant-scoped definitions by the number of target tenants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSummary {
    /// Version opened by the call; `None` for dry runs and no-op calls
    pub version: Option<Version>,

    /// When the call started
    pub started_at: DateTime<Utc>,

    /// Wall time spent in the call (in milliseconds)
    pub duration_ms: u64,

    /// Number of tenant schemas targeted
    pub tenants: usize,

    pub single_migrations: usize,
    pub tenant_migrations: usize,
    pub tenant_migrations_total: usize,
    pub migrations_grand_total: usize,

    pub single_scripts: usize,
    pub tenant_scripts: usize,
    pub tenant_scripts_total: usize,
    pub scripts_grand_total: usize,
}

impl VersionSummary {
    /// Count `definitions` against `tenants` target schemas
    pub fn tally(
        started_at: DateTime<Utc>,
        tenants: usize,
        definitions: &[MigrationDefinition],
    ) -> Self {
        let count = |kind: MigrationKind| definitions.iter().filter(|d| d.kind == kind).count();

        let single_migrations = count(MigrationKind::SingleMigration);
        let tenant_migrations = count(MigrationKind::TenantMigration);
        let single_scripts = count(MigrationKind::SingleScript);
        let tenant_scripts = count(MigrationKind::TenantScript);
        let tenant_migrations_total = tenant_migrations * tenants;
        let tenant_scripts_total = tenant_scripts * tenants;

        Self {
            version: None,
            started_at,
            duration_ms: 0,
            tenants,
            single_migrations,
            tenant_migrations,
            tenant_migrations_total,
            migrations_grand_total: single_migrations + tenant_migrations_total,
            single_scripts,
            tenant_scripts,
            tenant_scripts_total,
            scripts_grand_total: single_scripts + tenant_scripts_total,
        }
    }

    /// Stamp the version (if any) and the elapsed time since `started_at`
    pub fn finish(mut self, version: Option<Version>) -> Self {
        self.version = version;
        self.duration_ms = (Utc::now() - self.started_at)
            .num_milliseconds()
            .max(0) as u64;
        self
    }

    /// Number of (definition, schema) executions the call covers
    pub fn applied_count(&self) -> usize {
        self.migrations_grand_total + self.scripts_grand_total
    }

    /// Id of the version opened by the call
    pub fn version_id(&self) -> Option<i64> {
        self.version.as_ref().map(|v| v.id)
    }
}
