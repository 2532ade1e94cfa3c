//! Command abstractions.

use uuid::Uuid;

use crate::error::DomainError;
use crate::id::AggregateId;

/// Trait that all commands implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this command through the system.
    fn correlation_id(&self) -> Uuid;

    /// The aggregate this command targets.
    fn aggregate_id(&self) -> &AggregateId;

    /// Checks the command input before any storage is touched.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for malformed input.
    fn validate(&self) -> Result<(), DomainError> {
        Ok(())
    }
}
