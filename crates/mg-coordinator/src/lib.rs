//! mg-coordinator - Reconciliation and orchestration for the tenant migrator
//!
//! The [`Coordinator`] compares the definitions produced by a
//! [`Loader`](mg_core::Loader) with the history recorded by a
//! [`Connector`](mg_db::Connector), refuses to run on top of drifted history,
//! computes the pending set and hands it to the connector for one
//! transactional apply.

pub mod coordinator;
pub mod error;
pub mod reconcile;

pub use coordinator::{ApplyOutcome, Coordinator};
pub use error::{ChecksumDrift, MigratorError, MigratorResult};
pub use reconcile::{compute_pending_migrations, verify_checksums};
