//! Reconciliation of source definitions against applied history.
//!
//! Definitions are identified by `(name, source_dir)`. All lookups go through
//! ordered maps so results never depend on hash iteration order.

use crate::error::ChecksumDrift;
use mg_core::loader::sort_definitions;
use mg_core::{AppliedMigration, MigrationDefinition};
use std::collections::{BTreeMap, BTreeSet};

type Key<'a> = (&'a str, &'a str);

/// Compare every applied migration record with the current source.
///
/// A record drifts when its source definition is gone or its checksum
/// changed. Scripts are skipped: they re-run on every apply and carry no
/// applied state to protect. Each drifted definition is reported once, even
/// when it was recorded against several tenant schemas.
pub fn verify_checksums(
    source: &[MigrationDefinition],
    applied: &[AppliedMigration],
) -> Vec<ChecksumDrift> {
    let by_key: BTreeMap<Key<'_>, &MigrationDefinition> =
        source.iter().map(|d| (d.key(), d)).collect();

    let mut seen: BTreeSet<Key<'_>> = BTreeSet::new();
    let mut drifts = Vec::new();

    for record in applied {
        let recorded = &record.definition;
        if recorded.kind.is_script() {
            continue;
        }
        let current = by_key.get(&recorded.key());
        let drifted = current.map_or(true, |c| c.checksum != recorded.checksum);
        if drifted && seen.insert(recorded.key()) {
            drifts.push(ChecksumDrift {
                definition: recorded.clone(),
                source_checksum: current.map(|c| c.checksum.clone()),
            });
        }
    }
    drifts
}

/// Definitions that still have to run, ordered by name and then by source
/// order.
///
/// - scripts are always pending
/// - a single-schema migration is pending when it has no record at all
/// - a tenant migration is pending when none of the current `tenants` has a
///   record for it; a partially applied one is reported and skipped
/// - nothing tenant-scoped is pending while there are no tenants
pub fn compute_pending_migrations(
    source: &[MigrationDefinition],
    applied: &[AppliedMigration],
    tenants: &[String],
) -> Vec<MigrationDefinition> {
    let mut recorded: BTreeMap<Key<'_>, BTreeSet<&str>> = BTreeMap::new();
    for record in applied {
        recorded
            .entry(record.definition.key())
            .or_default()
            .insert(record.schema.as_str());
    }

    let mut pending: Vec<MigrationDefinition> = source
        .iter()
        .filter(|definition| {
            if definition.kind.is_tenant() && tenants.is_empty() {
                return false;
            }
            if definition.kind.is_script() {
                return true;
            }
            let Some(schemas) = recorded.get(&definition.key()) else {
                return true;
            };
            if !definition.kind.is_tenant() {
                return false;
            }

            let missing: Vec<&str> = tenants
                .iter()
                .map(String::as_str)
                .filter(|t| !schemas.contains(t))
                .collect();
            if missing.len() == tenants.len() {
                return true;
            }
            if !missing.is_empty() {
                log::warn!(
                    "Tenant migration {} is applied to some tenants but not to [{}]; not re-applying",
                    definition.file,
                    missing.join(", ")
                );
            }
            false
        })
        .cloned()
        .collect();

    sort_definitions(&mut pending);
    pending
}

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod tests;
