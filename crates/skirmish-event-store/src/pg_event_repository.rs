//! `PostgreSQL` implementation of the `EventRepository` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use skirmish_core::error::DomainError;
use skirmish_core::id::AggregateId;
use skirmish_core::repository::{
    EventRepository, NewEvent, Snapshot, StoredEvent, check_append_batch,
};

use crate::schema;

/// PostgreSQL-backed event repository.
///
/// Appends run in one transaction per call. The transaction takes an advisory
/// lock keyed by the aggregate id, compares the current version, and inserts;
/// the `(aggregate_id, aggregate_version)` unique constraint catches anything
/// that slips past the lock. A transaction dropped before commit (for example
/// when the caller's future is cancelled) rolls back.
#[derive(Debug, Clone)]
pub struct PgEventRepository {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    event_id: Uuid,
    aggregate_id: String,
    aggregate_version: i64,
    event_type: String,
    payload: serde_json::Value,
    correlation_id: Uuid,
    causation_id: Uuid,
    occurred_at: DateTime<Utc>,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for StoredEvent {
    type Error = DomainError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            event_id: row.event_id,
            aggregate_id: stored_aggregate_id(row.aggregate_id)?,
            aggregate_version: row.aggregate_version,
            event_type: row.event_type,
            payload: row.payload,
            correlation_id: row.correlation_id,
            causation_id: row.causation_id,
            occurred_at: row.occurred_at,
            recorded_at: row.recorded_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SnapshotRow {
    aggregate_id: String,
    aggregate_version: i64,
    data: serde_json::Value,
    taken_at: DateTime<Utc>,
}

impl TryFrom<SnapshotRow> for Snapshot {
    type Error = DomainError;

    fn try_from(row: SnapshotRow) -> Result<Self, Self::Error> {
        Ok(Self {
            aggregate_id: stored_aggregate_id(row.aggregate_id)?,
            aggregate_version: row.aggregate_version,
            data: row.data,
            taken_at: row.taken_at,
        })
    }
}

fn stored_aggregate_id(raw: String) -> Result<AggregateId, DomainError> {
    AggregateId::parse(raw)
        .map_err(|e| DomainError::Infrastructure(format!("corrupt aggregate id in store: {e}")))
}

fn infrastructure(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(err.to_string())
}

/// Only the version constraint signals a lost race; any other unique
/// violation (a reused `event_id`, say) is a storage fault.
fn is_version_conflict(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db)
            if db.is_unique_violation()
                && db.constraint() == Some(schema::AGGREGATE_VERSION_CONSTRAINT)
    )
}

impl PgEventRepository {
    /// Creates a new `PgEventRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the highest stored version for the aggregate (0 if none).
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the query fails.
    pub async fn current_version(&self, aggregate_id: &AggregateId) -> Result<i64, DomainError> {
        sqlx::query_scalar::<_, i64>(schema::CURRENT_VERSION)
            .bind(aggregate_id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(infrastructure)
    }
}

#[async_trait]
impl EventRepository for PgEventRepository {
    async fn load_events(
        &self,
        aggregate_id: &AggregateId,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        self.load_events_from(aggregate_id, 0).await
    }

    #[instrument(skip(self), fields(aggregate_id = %aggregate_id))]
    async fn load_events_from(
        &self,
        aggregate_id: &AggregateId,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let rows = sqlx::query_as::<_, EventRow>(schema::SELECT_EVENTS_FROM)
            .bind(aggregate_id.as_str())
            .bind(from_version)
            .fetch_all(&self.pool)
            .await
            .map_err(infrastructure)?;

        debug!(count = rows.len(), from_version, "loaded events");

        rows.into_iter().map(StoredEvent::try_from).collect()
    }

    #[instrument(skip(self, events), fields(aggregate_id = %aggregate_id, count = events.len()))]
    async fn append_events(
        &self,
        aggregate_id: &AggregateId,
        expected_version: i64,
        events: &[NewEvent],
    ) -> Result<Vec<StoredEvent>, DomainError> {
        check_append_batch(aggregate_id, expected_version, events)?;

        let mut tx = self.pool.begin().await.map_err(infrastructure)?;

        sqlx::query(schema::LOCK_AGGREGATE)
            .bind(aggregate_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(infrastructure)?;

        let actual = sqlx::query_scalar::<_, i64>(schema::CURRENT_VERSION)
            .bind(aggregate_id.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(infrastructure)?;

        if actual != expected_version {
            // Dropping `tx` rolls back.
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: aggregate_id.clone(),
                expected: expected_version,
                actual,
            });
        }

        let mut committed = Vec::with_capacity(events.len());
        for event in events {
            let inserted = sqlx::query_scalar::<_, DateTime<Utc>>(schema::INSERT_EVENT)
                .bind(event.event_id)
                .bind(event.aggregate_id.as_str())
                .bind(event.aggregate_version)
                .bind(&event.event_type)
                .bind(&event.payload)
                .bind(event.correlation_id)
                .bind(event.causation_id)
                .bind(event.occurred_at)
                .fetch_one(&mut *tx)
                .await;

            let recorded_at = match inserted {
                Ok(recorded_at) => recorded_at,
                Err(err) if is_version_conflict(&err) => {
                    drop(tx);
                    let actual = self.current_version(aggregate_id).await?;
                    return Err(DomainError::ConcurrencyConflict {
                        aggregate_id: aggregate_id.clone(),
                        expected: expected_version,
                        actual,
                    });
                }
                Err(err) => return Err(infrastructure(err)),
            };
            committed.push(event.clone().into_stored(recorded_at));
        }

        tx.commit().await.map_err(infrastructure)?;

        debug!(
            new_version = committed.last().map_or(expected_version, |e| e.aggregate_version),
            "appended events"
        );

        Ok(committed)
    }

    #[instrument(skip(self, snapshot), fields(aggregate_id = %snapshot.aggregate_id, version = snapshot.aggregate_version))]
    async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), DomainError> {
        let (event_exists, written) = sqlx::query_as::<_, (bool, bool)>(schema::UPSERT_SNAPSHOT)
            .bind(snapshot.aggregate_id.as_str())
            .bind(snapshot.aggregate_version)
            .bind(&snapshot.data)
            .bind(snapshot.taken_at)
            .fetch_one(&self.pool)
            .await
            .map_err(infrastructure)?;

        if !event_exists {
            return Err(DomainError::Validation(format!(
                "no event at version {} for aggregate {}; snapshot rejected",
                snapshot.aggregate_version, snapshot.aggregate_id
            )));
        }
        if !written {
            debug!("newer snapshot already stored; older snapshot ignored");
        }
        Ok(())
    }

    async fn load_snapshot(
        &self,
        aggregate_id: &AggregateId,
    ) -> Result<Option<Snapshot>, DomainError> {
        sqlx::query_as::<_, SnapshotRow>(schema::SELECT_SNAPSHOT)
            .bind(aggregate_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(infrastructure)?
            .map(Snapshot::try_from)
            .transpose()
    }
}
