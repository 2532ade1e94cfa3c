//! Event repository abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::id::AggregateId;

/// An event that has been produced by an aggregate but not yet appended.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Aggregate this event belongs to.
    pub aggregate_id: AggregateId,
    /// Version within the aggregate stream.
    pub aggregate_version: i64,
    /// Event type name for deserialization routing.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Causation ID linking to the causing event/command.
    pub causation_id: Uuid,
    /// Domain time at which the producing command ran.
    pub occurred_at: DateTime<Utc>,
}

impl NewEvent {
    /// Stamps the event with the store-assigned persistence time.
    #[must_use]
    pub fn into_stored(self, recorded_at: DateTime<Utc>) -> StoredEvent {
        StoredEvent {
            event_id: self.event_id,
            aggregate_id: self.aggregate_id,
            aggregate_version: self.aggregate_version,
            event_type: self.event_type,
            payload: self.payload,
            correlation_id: self.correlation_id,
            causation_id: self.causation_id,
            occurred_at: self.occurred_at,
            recorded_at,
        }
    }
}

/// Stored representation of a domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Aggregate this event belongs to.
    pub aggregate_id: AggregateId,
    /// Version within the aggregate stream.
    pub aggregate_version: i64,
    /// Event type name for deserialization routing.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Causation ID linking to the causing event/command.
    pub causation_id: Uuid,
    /// Domain time at which the producing command ran.
    pub occurred_at: DateTime<Utc>,
    /// Time of persistence, assigned by the store.
    pub recorded_at: DateTime<Utc>,
}

/// Materialized state of an aggregate at a given version.
///
/// Snapshots only shorten replay; the event log stays authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Aggregate the snapshot belongs to.
    pub aggregate_id: AggregateId,
    /// Version of the last event folded into `data`.
    pub aggregate_version: i64,
    /// Serialized folded state.
    pub data: serde_json::Value,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
}

/// Repository trait for loading and appending domain events.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Load all events for a given aggregate, ordered by version.
    async fn load_events(&self, aggregate_id: &AggregateId)
    -> Result<Vec<StoredEvent>, DomainError>;

    /// Load the events with a version strictly greater than `from_version`.
    async fn load_events_from(
        &self,
        aggregate_id: &AggregateId,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError>;

    /// Append new events to an aggregate stream with optimistic concurrency.
    /// `expected_version` is the last known version. Returns the committed
    /// events carrying their store-assigned timestamps.
    async fn append_events(
        &self,
        aggregate_id: &AggregateId,
        expected_version: i64,
        events: &[NewEvent],
    ) -> Result<Vec<StoredEvent>, DomainError>;

    /// Replace the aggregate's snapshot.
    async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), DomainError>;

    /// Load the aggregate's snapshot, if one was taken.
    async fn load_snapshot(&self, aggregate_id: &AggregateId)
    -> Result<Option<Snapshot>, DomainError>;
}

/// Checks the shape of an append batch before a store touches storage.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the batch is empty, contains events of
/// another aggregate, or its versions do not run `expected_version + 1, + 2, …`.
pub fn check_append_batch(
    aggregate_id: &AggregateId,
    expected_version: i64,
    events: &[NewEvent],
) -> Result<(), DomainError> {
    if expected_version < 0 {
        return Err(DomainError::Validation(format!(
            "expected version must not be negative, got {expected_version}"
        )));
    }
    if events.is_empty() {
        return Err(DomainError::Validation(
            "cannot append an empty event batch".to_owned(),
        ));
    }
    for (offset, event) in (1_i64..).zip(events) {
        if &event.aggregate_id != aggregate_id {
            return Err(DomainError::Validation(format!(
                "event {} belongs to aggregate {}, not {aggregate_id}",
                event.event_id, event.aggregate_id
            )));
        }
        let wanted = expected_version + offset;
        if event.aggregate_version != wanted {
            return Err(DomainError::Validation(format!(
                "event {} has version {}, expected {wanted}",
                event.event_id, event.aggregate_version
            )));
        }
    }
    Ok(())
}
