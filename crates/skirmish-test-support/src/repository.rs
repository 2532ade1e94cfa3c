//! Test repositories: mock `EventRepository` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use skirmish_core::error::DomainError;
use skirmish_core::id::AggregateId;
use skirmish_core::repository::{EventRepository, NewEvent, Snapshot, StoredEvent};

use crate::clock::fixed_time;

/// An event repository that records all `append_events` and `save_snapshot`
/// calls. Every load returns the configured events (filtered by version for
/// `load_events_from`) and every append succeeds without a version check.
#[derive(Debug)]
pub struct RecordingEventRepository {
    load_result: Mutex<Vec<StoredEvent>>,
    snapshot: Mutex<Option<Snapshot>>,
    appended: Mutex<Vec<(AggregateId, i64, Vec<NewEvent>)>>,
    saved_snapshots: Mutex<Vec<Snapshot>>,
}

impl RecordingEventRepository {
    /// Create a new recording repository that will return `load_result` from
    /// every load call.
    #[must_use]
    pub fn new(load_result: Vec<StoredEvent>) -> Self {
        Self {
            load_result: Mutex::new(load_result),
            snapshot: Mutex::new(None),
            appended: Mutex::new(Vec::new()),
            saved_snapshots: Mutex::new(Vec::new()),
        }
    }

    /// Also return `snapshot` from every `load_snapshot` call.
    #[must_use]
    pub fn with_snapshot(self, snapshot: Snapshot) -> Self {
        *self.snapshot.lock().unwrap() = Some(snapshot);
        self
    }

    /// Returns a copy of every `(aggregate_id, expected_version, events)`
    /// append call.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn appended_events(&self) -> Vec<(AggregateId, i64, Vec<NewEvent>)> {
        self.appended.lock().unwrap().clone()
    }

    /// Returns a copy of every saved snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn saved_snapshots(&self) -> Vec<Snapshot> {
        self.saved_snapshots.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventRepository for RecordingEventRepository {
    async fn load_events(
        &self,
        _aggregate_id: &AggregateId,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self.load_result.lock().unwrap().clone())
    }

    async fn load_events_from(
        &self,
        _aggregate_id: &AggregateId,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self
            .load_result
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.aggregate_version > from_version)
            .cloned()
            .collect())
    }

    async fn append_events(
        &self,
        aggregate_id: &AggregateId,
        expected_version: i64,
        events: &[NewEvent],
    ) -> Result<Vec<StoredEvent>, DomainError> {
        self.appended
            .lock()
            .unwrap()
            .push((aggregate_id.clone(), expected_version, events.to_vec()));
        Ok(events
            .iter()
            .cloned()
            .map(|e| e.into_stored(fixed_time()))
            .collect())
    }

    async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), DomainError> {
        self.saved_snapshots.lock().unwrap().push(snapshot.clone());
        Ok(())
    }

    async fn load_snapshot(
        &self,
        _aggregate_id: &AggregateId,
    ) -> Result<Option<Snapshot>, DomainError> {
        Ok(self.snapshot.lock().unwrap().clone())
    }
}

/// An event repository that always returns an empty event list and silently
/// accepts appends. Useful for testing "aggregate not found" scenarios and
/// creation commands.
#[derive(Debug)]
pub struct EmptyEventRepository;

#[async_trait]
impl EventRepository for EmptyEventRepository {
    async fn load_events(
        &self,
        _aggregate_id: &AggregateId,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(vec![])
    }

    async fn load_events_from(
        &self,
        _aggregate_id: &AggregateId,
        _from_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(vec![])
    }

    async fn append_events(
        &self,
        _aggregate_id: &AggregateId,
        _expected_version: i64,
        events: &[NewEvent],
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(events
            .iter()
            .cloned()
            .map(|e| e.into_stored(fixed_time()))
            .collect())
    }

    async fn save_snapshot(&self, _snapshot: &Snapshot) -> Result<(), DomainError> {
        Ok(())
    }

    async fn load_snapshot(
        &self,
        _aggregate_id: &AggregateId,
    ) -> Result<Option<Snapshot>, DomainError> {
        Ok(None)
    }
}

/// An event repository that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventRepository;

#[async_trait]
impl EventRepository for FailingEventRepository {
    async fn load_events(
        &self,
        _aggregate_id: &AggregateId,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn load_events_from(
        &self,
        _aggregate_id: &AggregateId,
        _from_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn append_events(
        &self,
        _aggregate_id: &AggregateId,
        _expected_version: i64,
        _events: &[NewEvent],
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn save_snapshot(&self, _snapshot: &Snapshot) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn load_snapshot(
        &self,
        _aggregate_id: &AggregateId,
    ) -> Result<Option<Snapshot>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
