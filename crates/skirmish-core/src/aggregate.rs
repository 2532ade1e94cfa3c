//! Aggregate root abstraction.

use chrono::{DateTime, Utc};

use crate::error::DomainError;
use crate::event::DomainEvent;
use crate::id::AggregateId;
use crate::repository::Snapshot;

/// Trait for aggregate roots that reconstitute from event history.
pub trait AggregateRoot: Send + Sync {
    /// The event type this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> &AggregateId;

    /// Returns the current version (number of events applied).
    fn version(&self) -> i64;

    /// Folds one event into the aggregate state.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Reconstruction` if the event is out of order or
    /// not legal in the current state. The aggregate must not be used after
    /// a failed apply.
    fn apply(&mut self, event: &Self::Event) -> Result<(), DomainError>;

    /// Returns uncommitted events produced by command handling.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Clears uncommitted events after persistence.
    fn clear_uncommitted_events(&mut self);

    /// Version last confirmed by the store: the expected version for the
    /// next append.
    #[allow(clippy::cast_possible_wrap)]
    fn committed_version(&self) -> i64 {
        self.version() - self.uncommitted_events().len() as i64
    }
}

/// Aggregates whose folded state can be materialized as a snapshot.
pub trait SnapshotAggregate: AggregateRoot + Sized {
    /// Materializes the folded state at the current version.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the aggregate holds uncommitted
    /// events, or `DomainError::Infrastructure` if the state cannot be
    /// serialized.
    fn to_snapshot(&self, taken_at: DateTime<Utc>) -> Result<Snapshot, DomainError>;

    /// Seeds an aggregate from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Reconstruction` if the snapshot data does not
    /// decode to the aggregate's state.
    fn from_snapshot(snapshot: &Snapshot) -> Result<Self, DomainError>;
}
