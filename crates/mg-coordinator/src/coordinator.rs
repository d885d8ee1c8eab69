//! Coordinator: reconciles source migrations with applied history and
//! drives the connector.

use crate::error::{ChecksumDrift, MigratorError, MigratorResult};
use crate::reconcile::{compute_pending_migrations, verify_checksums};
use mg_core::loader::sort_definitions;
use mg_core::{
    AppliedMigration, ApplyMode, Loader, MigrationDefinition, TenantName, Version, VersionDetail,
    VersionSummary,
};
use mg_db::Connector;
use serde::Serialize;

/// Result of one apply call: the connector's summary plus the definitions
/// that were (or, for a dry run, would be) processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyOutcome {
    pub summary: VersionSummary,
    pub processed: Vec<MigrationDefinition>,
}

/// Top-level migration engine over a [`Connector`] and a [`Loader`].
///
/// The connector is expected to be initialised (see [`Coordinator::init`]).
pub struct Coordinator<C, L> {
    connector: C,
    loader: L,
}

impl<C: Connector, L: Loader> Coordinator<C, L> {
    /// Create a coordinator
    pub fn new(connector: C, loader: L) -> Self {
        Self { connector, loader }
    }

    /// Borrow the connector
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Initialise the connector (open the connection, bootstrap tables)
    pub fn init(&mut self) -> MigratorResult<()> {
        self.connector.init()?;
        Ok(())
    }

    /// Source definitions as the loader produces them
    pub fn source_migrations(&self) -> MigratorResult<Vec<MigrationDefinition>> {
        Ok(self.loader.load_migrations()?)
    }

    /// Applied migration records, ordered by version then insertion
    pub fn applied_migrations(&self) -> MigratorResult<Vec<AppliedMigration>> {
        Ok(self.connector.applied_migrations()?)
    }

    /// Known tenants
    pub fn tenants(&self) -> MigratorResult<Vec<String>> {
        Ok(self.connector.tenants()?)
    }

    /// Check every applied migration against its current source.
    ///
    /// Returns `(true, [])` when history is intact, otherwise `false` with
    /// one entry per drifted definition.
    pub fn verify_source_migrations_checksums(
        &self,
    ) -> MigratorResult<(bool, Vec<ChecksumDrift>)> {
        let source = self.source_migrations()?;
        let applied = self.applied_migrations()?;
        let drifts = verify_checksums(&source, &applied);
        Ok((drifts.is_empty(), drifts))
    }

    /// Definitions the next apply would process, without running anything
    pub fn pending_migrations(&self) -> MigratorResult<Vec<MigrationDefinition>> {
        let source = self.source_migrations()?;
        let applied = self.applied_migrations()?;
        let tenants = self.tenants()?;
        Ok(compute_pending_migrations(&source, &applied, &tenants))
    }

    /// Only the bootstrap retrofit may create the initial version
    fn check_version_name(version_name: &str) -> MigratorResult<()> {
        if version_name == Version::INITIAL_VERSION_NAME {
            return Err(MigratorError::ReservedVersionName(version_name.to_string()));
        }
        Ok(())
    }

    /// Load source and history and fail on drift
    fn load_verified(&self) -> MigratorResult<(Vec<MigrationDefinition>, Vec<AppliedMigration>)> {
        let source = self.source_migrations()?;
        let applied = self.applied_migrations()?;
        let drifts = verify_checksums(&source, &applied);
        if !drifts.is_empty() {
            for drift in &drifts {
                log::warn!("Checksum drift: {drift}");
            }
            return Err(MigratorError::ChecksumDrift(drifts));
        }
        Ok((source, applied))
    }

    /// Verify history, compute the pending set and apply it as one version.
    ///
    /// With [`ApplyMode::DryRun`] the pending set is returned and the
    /// database is not touched.
    pub fn apply_migrations(
        &mut self,
        mode: ApplyMode,
        version_name: &str,
    ) -> MigratorResult<ApplyOutcome> {
        Self::check_version_name(version_name)?;
        let (source, applied) = self.load_verified()?;
        let tenants = self.tenants()?;
        let pending = compute_pending_migrations(&source, &applied, &tenants);
        log::info!(
            "{} of {} source definition(s) pending across {} tenant(s)",
            pending.len(),
            source.len(),
            tenants.len()
        );

        let summary = self
            .connector
            .apply_migrations(mode, version_name, &pending)?;
        Ok(ApplyOutcome {
            summary,
            processed: pending,
        })
    }

    /// Register a new tenant and replay every tenant-scoped definition
    /// against it as one version
    pub fn add_tenant_and_apply_migrations(
        &mut self,
        mode: ApplyMode,
        tenant: &TenantName,
        version_name: &str,
    ) -> MigratorResult<ApplyOutcome> {
        Self::check_version_name(version_name)?;
        // schema names are case-insensitive
        let known = self.tenants()?;
        if let Some(existing) = known.iter().find(|t| t.eq_ignore_ascii_case(tenant.as_str())) {
            log::warn!("Tenant {tenant} collides with registered tenant {existing}");
            return Err(MigratorError::DuplicateTenant(tenant.to_string()));
        }

        let (source, _) = self.load_verified()?;
        let mut pending: Vec<MigrationDefinition> =
            source.into_iter().filter(|d| d.kind.is_tenant()).collect();
        sort_definitions(&mut pending);
        log::info!(
            "Adding tenant {tenant} with {} tenant definition(s)",
            pending.len()
        );

        let summary = self.connector.add_tenant_and_apply_migrations(
            mode,
            version_name,
            tenant,
            &pending,
        )?;
        Ok(ApplyOutcome {
            summary,
            processed: pending,
        })
    }

    /// All versions, newest first
    pub fn versions(&self) -> MigratorResult<Vec<Version>> {
        Ok(self.connector.versions()?)
    }

    /// One version with its applied migrations
    pub fn version_by_id(&self, id: i64) -> MigratorResult<Option<VersionDetail>> {
        Ok(self.connector.version_by_id(id)?)
    }

    /// Versions that recorded `file`, newest first
    pub fn versions_by_file(&self, file: &str) -> MigratorResult<Vec<Version>> {
        Ok(self.connector.versions_by_file(file)?)
    }

    pub fn applied_migration_by_id(&self, id: i64) -> MigratorResult<Option<AppliedMigration>> {
        Ok(self.connector.applied_migration_by_id(id)?)
    }

    /// Release the connector
    pub fn dispose(&mut self) {
        self.connector.dispose();
    }
}

#[cfg(test)]
#[path = "coordinator_test.rs"]
mod tests;
