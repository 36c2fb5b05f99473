use thiserror::Error;

/// Errors raised by tenant routing and background propagation
#[derive(Debug, Error)]
pub enum TenancyError {
    #[error("Invalid tenant schema: {0}")]
    InvalidTenantSchema(String),

    #[error("Unknown tenant: {0}")]
    UnknownTenant(String),

    #[error("Invalid schema name in configuration: {0}")]
    InvalidSchemaName(String),

    #[error("Background executor is shut down")]
    ExecutorClosed,

    #[error("Background queue is full")]
    ExecutorSaturated,
}
