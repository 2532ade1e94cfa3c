//! Domain event abstractions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::id::AggregateId;
use crate::repository::NewEvent;

/// Metadata attached to every domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Type name for deserialization routing.
    pub event_type: String,
    /// Aggregate/stream this event belongs to.
    pub aggregate_id: AggregateId,
    /// Monotonically increasing version within the aggregate stream.
    pub aggregate_version: i64,
    /// Correlation ID for tracing a command through its effects.
    pub correlation_id: Uuid,
    /// Causation ID linking this event to the event/command that caused it.
    pub causation_id: Uuid,
    /// Domain time at which the command producing this event ran.
    pub occurred_at: DateTime<Utc>,
}

/// Trait that all domain events implement.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Returns the event type name (used for serialization routing).
    fn event_type(&self) -> &'static str;

    /// Serializes the event payload to JSON.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the payload cannot be
    /// represented as JSON.
    fn to_payload(&self) -> Result<serde_json::Value, DomainError>;

    /// Returns the metadata for this event.
    fn metadata(&self) -> &EventMetadata;

    /// Converts the event into the shape accepted by an `EventRepository`.
    ///
    /// # Errors
    ///
    /// Propagates payload serialization failures.
    fn to_new_event(&self) -> Result<NewEvent, DomainError> {
        let meta = self.metadata();
        Ok(NewEvent {
            event_id: meta.event_id,
            aggregate_id: meta.aggregate_id.clone(),
            aggregate_version: meta.aggregate_version,
            event_type: self.event_type().to_owned(),
            payload: self.to_payload()?,
            correlation_id: meta.correlation_id,
            causation_id: meta.causation_id,
            occurred_at: meta.occurred_at,
        })
    }
}
