//! Error types for mg-coordinator

use mg_core::MigrationDefinition;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// An applied migration whose source no longer matches what was recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChecksumDrift {
    /// Definition as recorded when it was applied
    pub definition: MigrationDefinition,

    /// Checksum of the current source, `None` when the source is gone
    pub source_checksum: Option<String>,
}

impl fmt::Display for ChecksumDrift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source_checksum {
            Some(current) => write!(
                f,
                "{} (recorded {}, source {})",
                self.definition.file, self.definition.checksum, current
            ),
            None => write!(f, "{} (source missing)", self.definition.file),
        }
    }
}

fn join_drifts(drifts: &[ChecksumDrift]) -> String {
    drifts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Coordinator error type
#[derive(Error, Debug)]
pub enum MigratorError {
    /// R001: Source migrations diverged from applied history
    #[error(
        "[R001] Checksum verification failed for {} applied migration(s): {}",
        .0.len(),
        join_drifts(.0)
    )]
    ChecksumDrift(Vec<ChecksumDrift>),

    /// R002: Tenant already registered
    #[error("[R002] Tenant '{0}' already exists")]
    DuplicateTenant(String),

    /// R003: Database error propagation
    #[error("[R003] Database error: {0}")]
    Db(#[from] mg_db::DbError),

    /// R004: Loader or core error propagation
    #[error("[R004] Could not load source migrations: {0}")]
    Read(#[from] mg_core::CoreError),

    /// R005: Version name collides with the retrofit version
    #[error("[R005] Version name '{0}' is reserved for the retrofit version")]
    ReservedVersionName(String),
}

/// Result type alias for MigratorError
pub type MigratorResult<T> = Result<T, MigratorError>;
