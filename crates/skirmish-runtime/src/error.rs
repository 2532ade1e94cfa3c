//! Skirmish runtime error types.

use std::time::Duration;

use skirmish_core::error::DomainError;
use thiserror::Error;

/// Startup, shutdown, and operator-command errors.
#[derive(Debug, Error)]
pub enum AppError {
    /// A setting is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection, pool, or migration error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// NATS connection or flush error.
    #[error("messaging error: {0}")]
    Messaging(String),

    /// Tracing subscriber or exporter setup error.
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// A combat operation failed.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// An operator command ran past the configured timeout.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Writing output failed.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

impl AppError {
    /// Process exit code for this error. Configuration problems exit with 2
    /// (usage), missing combats with 3, everything else with 1.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Domain(DomainError::AggregateNotFound(_)) => 3,
            _ => 1,
        }
    }
}
