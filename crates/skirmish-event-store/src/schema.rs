//! Event store database schema.
//!
//! `migrations/` at the workspace root carries the same DDL for
//! `sqlx::test` and deployment tooling.

/// Unique constraint on `(aggregate_id, aggregate_version)`. A violation of
/// this constraint, and only this one, is a lost version race.
pub const AGGREGATE_VERSION_CONSTRAINT: &str = "domain_events_aggregate_version_key";

/// SQL to create the events table.
pub const CREATE_EVENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS domain_events (
    event_id          UUID PRIMARY KEY,
    aggregate_id      TEXT NOT NULL,
    aggregate_version BIGINT NOT NULL CHECK (aggregate_version > 0),
    event_type        VARCHAR(255) NOT NULL,
    payload           JSONB NOT NULL,
    correlation_id    UUID NOT NULL,
    causation_id      UUID NOT NULL,
    occurred_at       TIMESTAMPTZ NOT NULL,
    recorded_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    CONSTRAINT domain_events_aggregate_version_key UNIQUE (aggregate_id, aggregate_version)
);

CREATE INDEX IF NOT EXISTS idx_domain_events_correlation_id
    ON domain_events (correlation_id);
";

/// SQL to create the snapshots table (one row per aggregate).
pub const CREATE_SNAPSHOTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS aggregate_snapshots (
    aggregate_id      TEXT PRIMARY KEY,
    aggregate_version BIGINT NOT NULL CHECK (aggregate_version > 0),
    data              JSONB NOT NULL,
    taken_at          TIMESTAMPTZ NOT NULL
);
";

pub(crate) const SELECT_EVENTS_FROM: &str = r"
SELECT event_id, aggregate_id, aggregate_version, event_type, payload,
       correlation_id, causation_id, occurred_at, recorded_at
FROM domain_events
WHERE aggregate_id = $1 AND aggregate_version > $2
ORDER BY aggregate_version ASC
";

/// Serializes appends per aggregate for the life of the transaction. The key
/// is a 64-bit hash of the id.
pub(crate) const LOCK_AGGREGATE: &str = "SELECT pg_advisory_xact_lock(hashtextextended($1, 0))";

pub(crate) const CURRENT_VERSION: &str =
    "SELECT COALESCE(MAX(aggregate_version), 0) FROM domain_events WHERE aggregate_id = $1";

pub(crate) const INSERT_EVENT: &str = r"
INSERT INTO domain_events (
    event_id, aggregate_id, aggregate_version, event_type, payload,
    correlation_id, causation_id, occurred_at, recorded_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
RETURNING recorded_at
";

/// Upserts only when the event at the snapshot's version exists and the
/// stored snapshot, if any, is older. Returns `(event_exists, written)`.
pub(crate) const UPSERT_SNAPSHOT: &str = r"
WITH target AS (
    SELECT 1 FROM domain_events WHERE aggregate_id = $1 AND aggregate_version = $2
),
written AS (
    INSERT INTO aggregate_snapshots (aggregate_id, aggregate_version, data, taken_at)
    SELECT $1::TEXT, $2::BIGINT, $3::JSONB, $4::TIMESTAMPTZ
    WHERE EXISTS (SELECT 1 FROM target)
    ON CONFLICT (aggregate_id) DO UPDATE
    SET aggregate_version = EXCLUDED.aggregate_version,
        data = EXCLUDED.data,
        taken_at = EXCLUDED.taken_at
    WHERE aggregate_snapshots.aggregate_version < EXCLUDED.aggregate_version
    RETURNING 1
)
SELECT EXISTS (SELECT 1 FROM target), EXISTS (SELECT 1 FROM written)
";

pub(crate) const SELECT_SNAPSHOT: &str = r"
SELECT aggregate_id, aggregate_version, data, taken_at
FROM aggregate_snapshots
WHERE aggregate_id = $1
";
