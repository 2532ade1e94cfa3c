//! Integration tests for `PgEventRepository`.
//!
//! These run against the PostgreSQL named by `DATABASE_URL` and return early
//! when it is unset. Every test works on freshly generated aggregate ids, so
//! they share one database safely.

use chrono::{TimeZone, Utc};
use skirmish_core::error::DomainError;
use skirmish_core::id::AggregateId;
use skirmish_core::repository::{EventRepository, NewEvent, Snapshot};
use skirmish_event_store::pg_event_repository::PgEventRepository;
use sqlx::PgPool;
use uuid::Uuid;

/// Connects to `DATABASE_URL` and applies the workspace migrations, or
/// returns `None` when no database is configured.
async fn test_pool() -> Option<PgPool> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL unset; skipping PostgreSQL test");
        return None;
    };
    let pool = PgPool::connect(&url)
        .await
        .expect("DATABASE_URL should point at a reachable PostgreSQL");
    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .expect("migrations should apply");
    Some(pool)
}

/// Helper to build a `NewEvent` with sensible defaults.
fn make_new_event(aggregate_id: &AggregateId, aggregate_version: i64) -> NewEvent {
    NewEvent {
        event_id: Uuid::new_v4(),
        aggregate_id: aggregate_id.clone(),
        aggregate_version,
        event_type: "test.event".to_string(),
        payload: serde_json::json!({"key": "value"}),
        correlation_id: Uuid::new_v4(),
        causation_id: Uuid::new_v4(),
        occurred_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
    }
}

fn make_snapshot(aggregate_id: &AggregateId, aggregate_version: i64) -> Snapshot {
    Snapshot {
        aggregate_id: aggregate_id.clone(),
        aggregate_version,
        data: serde_json::json!({"version": aggregate_version}),
        taken_at: Utc::now(),
    }
}

// --- load_events ---

#[tokio::test]
async fn test_load_events_returns_empty_vec_for_nonexistent_aggregate() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repo = PgEventRepository::new(pool);

    let events = repo.load_events(&AggregateId::generate()).await.unwrap();

    assert!(events.is_empty());
}

// --- append_events + load_events round-trip ---

#[tokio::test]
async fn test_append_and_load_single_event() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repo = PgEventRepository::new(pool);
    let aggregate_id = AggregateId::generate();
    let event = make_new_event(&aggregate_id, 1);

    let committed = repo
        .append_events(&aggregate_id, 0, std::slice::from_ref(&event))
        .await
        .unwrap();

    let loaded = repo.load_events(&aggregate_id).await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded, committed);

    let e = &loaded[0];
    assert_eq!(e.event_id, event.event_id);
    assert_eq!(e.aggregate_id, aggregate_id);
    assert_eq!(e.event_type, event.event_type);
    assert_eq!(e.payload, event.payload);
    assert_eq!(e.aggregate_version, 1);
    assert_eq!(e.correlation_id, event.correlation_id);
    assert_eq!(e.causation_id, event.causation_id);
    assert_eq!(e.occurred_at, event.occurred_at);
}

// --- ordering ---

#[tokio::test]
async fn test_append_multiple_events_preserves_version_order() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repo = PgEventRepository::new(pool);
    let aggregate_id = AggregateId::generate();
    let events = vec![
        make_new_event(&aggregate_id, 1),
        make_new_event(&aggregate_id, 2),
        make_new_event(&aggregate_id, 3),
    ];

    repo.append_events(&aggregate_id, 0, &events).await.unwrap();

    let loaded = repo.load_events(&aggregate_id).await.unwrap();
    let versions: Vec<i64> = loaded.iter().map(|e| e.aggregate_version).collect();
    assert_eq!(versions, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_load_events_from_returns_only_later_versions() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repo = PgEventRepository::new(pool);
    let aggregate_id = AggregateId::generate();
    let events: Vec<_> = (1..=5).map(|v| make_new_event(&aggregate_id, v)).collect();
    repo.append_events(&aggregate_id, 0, &events).await.unwrap();

    let tail = repo.load_events_from(&aggregate_id, 3).await.unwrap();

    let versions: Vec<i64> = tail.iter().map(|e| e.aggregate_version).collect();
    assert_eq!(versions, vec![4, 5]);
}

// --- aggregate isolation ---

#[tokio::test]
async fn test_aggregate_isolation() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repo = PgEventRepository::new(pool);
    let agg_a = AggregateId::generate();
    let agg_b = AggregateId::generate();

    repo.append_events(&agg_a, 0, &[make_new_event(&agg_a, 1)])
        .await
        .unwrap();
    repo.append_events(&agg_b, 0, &[make_new_event(&agg_b, 1)])
        .await
        .unwrap();

    let loaded_a = repo.load_events(&agg_a).await.unwrap();
    let loaded_b = repo.load_events(&agg_b).await.unwrap();

    assert_eq!(loaded_a.len(), 1);
    assert_eq!(loaded_b.len(), 1);
    assert_eq!(loaded_a[0].aggregate_id, agg_a);
    assert_eq!(loaded_b[0].aggregate_id, agg_b);
}

// --- concurrency ---

#[tokio::test]
async fn test_concurrency_conflict_on_duplicate_version() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repo = PgEventRepository::new(pool);
    let aggregate_id = AggregateId::generate();

    repo.append_events(&aggregate_id, 0, &[make_new_event(&aggregate_id, 1)])
        .await
        .unwrap();

    let result = repo
        .append_events(&aggregate_id, 0, &[make_new_event(&aggregate_id, 1)])
        .await;

    match result {
        Err(DomainError::ConcurrencyConflict {
            aggregate_id: conflict_agg_id,
            expected,
            actual,
        }) => {
            assert_eq!(conflict_agg_id, aggregate_id);
            assert_eq!(expected, 0);
            assert_eq!(actual, 1);
        }
        other => panic!("expected ConcurrencyConflict, got {other:?}"),
    }
}

#[tokio::test]
async fn test_stale_expected_version_writes_nothing() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repo = PgEventRepository::new(pool);
    let aggregate_id = AggregateId::generate();

    repo.append_events(
        &aggregate_id,
        0,
        &[
            make_new_event(&aggregate_id, 1),
            make_new_event(&aggregate_id, 2),
        ],
    )
    .await
    .unwrap();

    // Versions 2-3 with a stale expected version of 1: the first insert would
    // collide, the version check must reject before any write.
    let result = repo
        .append_events(
            &aggregate_id,
            1,
            &[
                make_new_event(&aggregate_id, 2),
                make_new_event(&aggregate_id, 3),
            ],
        )
        .await;

    assert!(matches!(
        result,
        Err(DomainError::ConcurrencyConflict { actual: 2, .. })
    ));
    assert_eq!(repo.load_events(&aggregate_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_concurrent_appends_have_exactly_one_winner() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repo = PgEventRepository::new(pool);
    let aggregate_id = AggregateId::generate();
    let first = [make_new_event(&aggregate_id, 1)];
    let second = [make_new_event(&aggregate_id, 1)];

    let (a, b) = tokio::join!(
        repo.append_events(&aggregate_id, 0, &first),
        repo.append_events(&aggregate_id, 0, &second),
    );

    let outcomes = [a.is_ok(), b.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    for result in [a, b] {
        if let Err(err) = result {
            assert!(err.is_retryable(), "loser must see a conflict, got {err:?}");
        }
    }

    let loaded = repo.load_events(&aggregate_id).await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].aggregate_version, 1);
}

#[tokio::test]
async fn test_sequential_appends_with_correct_expected_version() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repo = PgEventRepository::new(pool);
    let aggregate_id = AggregateId::generate();

    repo.append_events(
        &aggregate_id,
        0,
        &[
            make_new_event(&aggregate_id, 1),
            make_new_event(&aggregate_id, 2),
        ],
    )
    .await
    .unwrap();

    repo.append_events(
        &aggregate_id,
        2,
        &[
            make_new_event(&aggregate_id, 3),
            make_new_event(&aggregate_id, 4),
        ],
    )
    .await
    .unwrap();

    let loaded = repo.load_events(&aggregate_id).await.unwrap();
    assert_eq!(loaded.len(), 4);
    for (i, event) in loaded.iter().enumerate() {
        assert_eq!(event.aggregate_version, i64::try_from(i + 1).unwrap());
    }
    assert_eq!(repo.current_version(&aggregate_id).await.unwrap(), 4);
}

// --- edge cases ---

#[tokio::test]
async fn test_append_empty_events_is_rejected() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repo = PgEventRepository::new(pool);
    let aggregate_id = AggregateId::generate();

    let result = repo.append_events(&aggregate_id, 0, &[]).await;

    assert!(matches!(result, Err(DomainError::Validation(_))));
    assert!(repo.load_events(&aggregate_id).await.unwrap().is_empty());
}

// --- payload serialization ---

#[tokio::test]
async fn test_complex_json_payload_round_trip() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repo = PgEventRepository::new(pool);
    let aggregate_id = AggregateId::generate();
    let complex_payload = serde_json::json!({
        "nested": {"key": "value", "number": 42},
        "array": [1, "two", null, true, false],
        "null_field": null,
        "empty_object": {},
        "empty_array": []
    });

    let mut event = make_new_event(&aggregate_id, 1);
    event.payload = complex_payload.clone();

    repo.append_events(&aggregate_id, 0, &[event]).await.unwrap();

    let loaded = repo.load_events(&aggregate_id).await.unwrap();
    assert_eq!(loaded[0].payload, complex_payload);
}

// --- snapshots ---

#[tokio::test]
async fn test_snapshot_upsert_replaces_previous() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repo = PgEventRepository::new(pool);
    let aggregate_id = AggregateId::generate();
    let events: Vec<_> = (1..=3).map(|v| make_new_event(&aggregate_id, v)).collect();
    repo.append_events(&aggregate_id, 0, &events).await.unwrap();

    repo.save_snapshot(&make_snapshot(&aggregate_id, 1))
        .await
        .unwrap();
    repo.save_snapshot(&make_snapshot(&aggregate_id, 3))
        .await
        .unwrap();

    let loaded = repo.load_snapshot(&aggregate_id).await.unwrap().unwrap();
    assert_eq!(loaded.aggregate_version, 3);
    assert_eq!(loaded.data, serde_json::json!({"version": 3}));
}

#[tokio::test]
async fn test_older_snapshot_does_not_replace_newer_one() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repo = PgEventRepository::new(pool);
    let aggregate_id = AggregateId::generate();
    let events: Vec<_> = (1..=3).map(|v| make_new_event(&aggregate_id, v)).collect();
    repo.append_events(&aggregate_id, 0, &events).await.unwrap();

    repo.save_snapshot(&make_snapshot(&aggregate_id, 3))
        .await
        .unwrap();
    repo.save_snapshot(&make_snapshot(&aggregate_id, 1))
        .await
        .unwrap();

    let loaded = repo.load_snapshot(&aggregate_id).await.unwrap().unwrap();
    assert_eq!(loaded.aggregate_version, 3);
    assert_eq!(loaded.data, serde_json::json!({"version": 3}));
}

#[tokio::test]
async fn test_reused_event_id_is_infrastructure_not_conflict() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repo = PgEventRepository::new(pool);
    let first_id = AggregateId::generate();
    let second_id = AggregateId::generate();
    let first = make_new_event(&first_id, 1);
    repo.append_events(&first_id, 0, std::slice::from_ref(&first))
        .await
        .unwrap();

    let mut reused = make_new_event(&second_id, 1);
    reused.event_id = first.event_id;
    let result = repo.append_events(&second_id, 0, &[reused]).await;

    assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    assert!(repo.load_events(&second_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_snapshot_without_matching_event_is_rejected() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let repo = PgEventRepository::new(pool);
    let aggregate_id = AggregateId::generate();

    let result = repo.save_snapshot(&make_snapshot(&aggregate_id, 1)).await;

    assert!(matches!(result, Err(DomainError::Validation(_))));
    assert!(repo.load_snapshot(&aggregate_id).await.unwrap().is_none());
}
