//! Event publisher abstraction.
//!
//! Publishing happens after an append has committed. It is best-effort: a
//! failure is reported to the caller but never undoes the store write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::id::AggregateId;
use crate::repository::StoredEvent;

/// Header carrying the event type tag.
pub const HEADER_EVENT_TYPE: &str = "event_type";
/// Header carrying the aggregate identifier.
pub const HEADER_AGGREGATE_ID: &str = "aggregate_id";
/// Header carrying the aggregate version.
pub const HEADER_AGGREGATE_VERSION: &str = "aggregate_version";

/// Message value delivered to downstream consumers.
///
/// Consumers order and deduplicate by `aggregate_id` + `aggregate_version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Aggregate the event belongs to; also the partitioning key.
    pub aggregate_id: AggregateId,
    /// Version within the aggregate stream.
    pub aggregate_version: i64,
    /// Event type tag.
    pub event_type: String,
    /// Variant payload.
    pub payload: serde_json::Value,
    /// Correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Causation ID.
    pub causation_id: Uuid,
    /// Domain time of the producing command.
    pub occurred_at: DateTime<Utc>,
    /// Persistence time assigned by the store.
    pub recorded_at: DateTime<Utc>,
}

impl EventEnvelope {
    /// Broker partitioning key for this event.
    #[must_use]
    pub fn key(&self) -> &str {
        self.aggregate_id.as_str()
    }

    /// Identifier brokers can use to drop duplicate deliveries.
    #[must_use]
    pub fn dedup_id(&self) -> String {
        format!("{}:{}", self.aggregate_id, self.aggregate_version)
    }

    /// Headers forwarded with the message for consumer-side filtering.
    #[must_use]
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            (HEADER_EVENT_TYPE, self.event_type.clone()),
            (HEADER_AGGREGATE_ID, self.aggregate_id.to_string()),
            (HEADER_AGGREGATE_VERSION, self.aggregate_version.to_string()),
        ]
    }

    /// Serializes the envelope to JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Publish` if serialization fails.
    pub fn to_json(&self) -> Result<Vec<u8>, DomainError> {
        serde_json::to_vec(self)
            .map_err(|e| DomainError::Publish(format!("envelope serialization failed: {e}")))
    }
}

impl From<&StoredEvent> for EventEnvelope {
    fn from(event: &StoredEvent) -> Self {
        Self {
            event_id: event.event_id,
            aggregate_id: event.aggregate_id.clone(),
            aggregate_version: event.aggregate_version,
            event_type: event.event_type.clone(),
            payload: event.payload.clone(),
            correlation_id: event.correlation_id,
            causation_id: event.causation_id,
            occurred_at: event.occurred_at,
            recorded_at: event.recorded_at,
        }
    }
}

/// Delivers persisted events to an external broker.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one persisted event, keyed by its aggregate id.
    async fn publish(&self, event: &StoredEvent) -> Result<(), DomainError>;
}

/// Publisher that drops every event. For read-only tooling.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(&self, _event: &StoredEvent) -> Result<(), DomainError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored_event() -> StoredEvent {
        StoredEvent {
            event_id: Uuid::new_v4(),
            aggregate_id: AggregateId::parse("combat-7").unwrap(),
            aggregate_version: 3,
            event_type: "combat.turn_advanced".to_owned(),
            payload: serde_json::json!({ "turn": 2 }),
            correlation_id: Uuid::new_v4(),
            causation_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn test_envelope_key_is_aggregate_id() {
        let envelope = EventEnvelope::from(&stored_event());
        assert_eq!(envelope.key(), "combat-7");
        assert_eq!(envelope.dedup_id(), "combat-7:3");
    }

    #[test]
    fn test_envelope_headers_carry_type_and_identity() {
        let envelope = EventEnvelope::from(&stored_event());
        let headers = envelope.headers();
        assert!(headers.contains(&(HEADER_EVENT_TYPE, "combat.turn_advanced".to_owned())));
        assert!(headers.contains(&(HEADER_AGGREGATE_ID, "combat-7".to_owned())));
        assert!(headers.contains(&(HEADER_AGGREGATE_VERSION, "3".to_owned())));
    }

    #[test]
    fn test_envelope_json_uses_snake_case_field_names() {
        let envelope = EventEnvelope::from(&stored_event());
        let value: serde_json::Value =
            serde_json::from_slice(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(value["aggregate_id"], "combat-7");
        assert_eq!(value["aggregate_version"], 3);
        assert_eq!(value["payload"]["turn"], 2);
    }
}
