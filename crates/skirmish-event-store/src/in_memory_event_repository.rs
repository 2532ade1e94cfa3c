//! In-process implementation of the `EventRepository` trait.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use skirmish_core::clock::{Clock, SystemClock};
use skirmish_core::error::DomainError;
use skirmish_core::id::AggregateId;
use skirmish_core::repository::{
    EventRepository, NewEvent, Snapshot, StoredEvent, check_append_batch,
};

#[derive(Debug, Default)]
struct Streams {
    events: HashMap<AggregateId, Vec<StoredEvent>>,
    snapshots: HashMap<AggregateId, Snapshot>,
}

/// Event repository held in process memory.
///
/// The version check and the insert happen under a single lock acquisition,
/// which gives the same one-winner guarantee as the database implementation
/// within one process. Nothing survives a restart.
pub struct InMemoryEventRepository {
    streams: Mutex<Streams>,
    clock: Arc<dyn Clock>,
}

impl InMemoryEventRepository {
    /// Creates an empty repository stamping `recorded_at` from the system
    /// clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty repository stamping `recorded_at` from `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            streams: Mutex::new(Streams::default()),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Streams>, DomainError> {
        self.streams
            .lock()
            .map_err(|e| DomainError::Infrastructure(format!("event store mutex poisoned: {e}")))
    }
}

impl Default for InMemoryEventRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryEventRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryEventRepository")
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EventRepository for InMemoryEventRepository {
    async fn load_events(
        &self,
        aggregate_id: &AggregateId,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        self.load_events_from(aggregate_id, 0).await
    }

    async fn load_events_from(
        &self,
        aggregate_id: &AggregateId,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let streams = self.lock()?;
        Ok(streams
            .events
            .get(aggregate_id)
            .map(|stream| {
                stream
                    .iter()
                    .filter(|e| e.aggregate_version > from_version)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn append_events(
        &self,
        aggregate_id: &AggregateId,
        expected_version: i64,
        events: &[NewEvent],
    ) -> Result<Vec<StoredEvent>, DomainError> {
        check_append_batch(aggregate_id, expected_version, events)?;

        let mut streams = self.lock()?;
        let actual = streams
            .events
            .get(aggregate_id)
            .and_then(|stream| stream.last())
            .map_or(0, |e| e.aggregate_version);
        if actual != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: aggregate_id.clone(),
                expected: expected_version,
                actual,
            });
        }

        let recorded_at = self.clock.now();
        let committed: Vec<StoredEvent> = events
            .iter()
            .cloned()
            .map(|e| e.into_stored(recorded_at))
            .collect();
        let stream = streams.events.entry(aggregate_id.clone()).or_default();
        stream.extend(committed.iter().cloned());

        debug!(
            aggregate_id = %aggregate_id,
            new_version = stream.len(),
            "appended events"
        );

        Ok(committed)
    }

    async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), DomainError> {
        let mut streams = self.lock()?;
        let stored = streams
            .events
            .get(&snapshot.aggregate_id)
            .map_or(0, |s| s.last().map_or(0, |e| e.aggregate_version));
        if snapshot.aggregate_version < 1 || snapshot.aggregate_version > stored {
            return Err(DomainError::Validation(format!(
                "no event at version {} for aggregate {}; snapshot rejected",
                snapshot.aggregate_version, snapshot.aggregate_id
            )));
        }
        // A slower writer must not replace a newer snapshot.
        let newer_stored = streams
            .snapshots
            .get(&snapshot.aggregate_id)
            .is_some_and(|current| current.aggregate_version >= snapshot.aggregate_version);
        if newer_stored {
            debug!(
                aggregate_id = %snapshot.aggregate_id,
                offered = snapshot.aggregate_version,
                "older snapshot ignored"
            );
        } else {
            streams
                .snapshots
                .insert(snapshot.aggregate_id.clone(), snapshot.clone());
        }
        Ok(())
    }

    async fn load_snapshot(
        &self,
        aggregate_id: &AggregateId,
    ) -> Result<Option<Snapshot>, DomainError> {
        Ok(self.lock()?.snapshots.get(aggregate_id).cloned())
    }
}
