//! Error types for mg-db

use thiserror::Error;

/// Database operation errors
#[derive(Error, Debug)]
pub enum DbError {
    /// Connection error (D001)
    #[error("[D001] Database connection failed: {0}")]
    ConnectionError(String),

    /// Bootstrap DDL failed (D002)
    #[error("[D002] Could not {step}: {message}")]
    BootstrapError { step: String, message: String },

    /// A migration statement failed; the transaction was rolled back (D003)
    #[error("[D003] Migration {file} failed on schema '{schema}', transaction rolled back: {message}")]
    ExecutionError {
        schema: String,
        file: String,
        message: String,
    },

    /// Reading migrator bookkeeping failed (D004)
    #[error("[D004] Query failed: {0}")]
    QueryError(String),

    /// Transaction management error (D005)
    #[error("[D005] Transaction failed: {0}")]
    TransactionError(String),

    /// Not implemented (D006)
    #[error("[D006] Feature not implemented for {backend}: {feature}")]
    NotImplemented { backend: String, feature: String },

    /// Connector used before `init` or after `dispose` (D007)
    #[error("[D007] Connector is not connected; call init() first")]
    NotConnected,

    /// Tenant schema creation or registration failed (D008)
    #[error("[D008] Could not add tenant '{tenant}', transaction rolled back: {message}")]
    TenantError { tenant: String, message: String },
}

/// Result type alias for DbError
pub type DbResult<T> = Result<T, DbError>;
