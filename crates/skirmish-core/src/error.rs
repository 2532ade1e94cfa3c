//! Domain error types.

use thiserror::Error;

use crate::id::AggregateId;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed or semantically invalid command input.
    #[error("validation error: {0}")]
    Validation(String),

    /// An aggregate precondition failed.
    #[error("rule violation: {0}")]
    RuleViolation(String),

    /// An aggregate was not found.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(AggregateId),

    /// A create command targeted an aggregate that already has history.
    #[error("aggregate already exists: {0}")]
    AggregateAlreadyExists(AggregateId),

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: AggregateId,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    /// Replay could not rebuild the aggregate from its history.
    #[error("cannot reconstruct aggregate {aggregate_id}: {reason}")]
    Reconstruction {
        /// The aggregate being replayed.
        aggregate_id: AggregateId,
        /// What went wrong.
        reason: String,
    },

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),

    /// Delivery of a persisted event to the broker failed.
    #[error("publish error: {0}")]
    Publish(String),
}

impl DomainError {
    /// Returns `true` if the caller may reload the aggregate and resubmit.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_concurrency_conflicts_are_retryable() {
        let id = AggregateId::parse("c1").unwrap();
        assert!(
            DomainError::ConcurrencyConflict {
                aggregate_id: id.clone(),
                expected: 1,
                actual: 2,
            }
            .is_retryable()
        );
        assert!(!DomainError::AggregateNotFound(id).is_retryable());
        assert!(!DomainError::Infrastructure("db down".into()).is_retryable());
    }

    #[test]
    fn test_conflict_message_names_versions() {
        let err = DomainError::ConcurrencyConflict {
            aggregate_id: AggregateId::parse("c1").unwrap(),
            expected: 3,
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "concurrency conflict on aggregate c1: expected version 3, found 4"
        );
    }
}
