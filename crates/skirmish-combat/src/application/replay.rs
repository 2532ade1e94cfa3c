//! Rebuilding a `Combat` from its stored history.

use skirmish_core::aggregate::{AggregateRoot, SnapshotAggregate};
use skirmish_core::error::DomainError;
use skirmish_core::event::EventMetadata;
use skirmish_core::id::AggregateId;
use skirmish_core::repository::{EventRepository, Snapshot, StoredEvent};
use tracing::{debug, warn};

use crate::domain::aggregates::Combat;
use crate::domain::events::{CombatEvent, CombatEventKind};

/// Decodes a stored event into a `CombatEvent`.
///
/// # Errors
///
/// Returns `DomainError::Reconstruction` for an unknown tag or a payload that
/// does not match its tag.
pub fn decode(stored: &StoredEvent) -> Result<CombatEvent, DomainError> {
    let kind = CombatEventKind::decode(&stored.event_type, stored.payload.clone()).map_err(|e| {
        DomainError::Reconstruction {
            aggregate_id: stored.aggregate_id.clone(),
            reason: format!(
                "cannot decode {} at version {}: {e}",
                stored.event_type, stored.aggregate_version
            ),
        }
    })?;
    Ok(CombatEvent {
        metadata: EventMetadata {
            event_id: stored.event_id,
            event_type: stored.event_type.clone(),
            aggregate_id: stored.aggregate_id.clone(),
            aggregate_version: stored.aggregate_version,
            correlation_id: stored.correlation_id,
            causation_id: stored.causation_id,
            occurred_at: stored.occurred_at,
        },
        kind,
    })
}

fn fold(combat: &mut Combat, events: &[StoredEvent]) -> Result<(), DomainError> {
    for stored in events {
        combat.apply(&decode(stored)?)?;
    }
    Ok(())
}

/// Reconstitutes a `Combat` by folding its full history. An empty history
/// yields a not-started combat at version 0.
///
/// # Errors
///
/// Returns `DomainError::Reconstruction` if an event cannot be decoded or is
/// not legal where it appears.
pub fn reconstitute(
    combat_id: &AggregateId,
    events: &[StoredEvent],
) -> Result<Combat, DomainError> {
    let mut combat = Combat::new(combat_id.clone());
    fold(&mut combat, events)?;
    Ok(combat)
}

/// Reconstitutes a `Combat` from a snapshot and the events recorded after it.
///
/// # Errors
///
/// Returns `DomainError::Reconstruction` if the snapshot belongs to another
/// combat, its data does not decode, or the tail does not continue it.
pub fn reconstitute_from_snapshot(
    combat_id: &AggregateId,
    snapshot: &Snapshot,
    tail: &[StoredEvent],
) -> Result<Combat, DomainError> {
    if &snapshot.aggregate_id != combat_id {
        return Err(DomainError::Reconstruction {
            aggregate_id: combat_id.clone(),
            reason: format!("snapshot belongs to {}", snapshot.aggregate_id),
        });
    }
    let mut combat = Combat::from_snapshot(snapshot)?;
    fold(&mut combat, tail)?;
    Ok(combat)
}

/// Loads a combat from the repository.
///
/// With `use_snapshot`, the latest snapshot seeds the fold and only the tail
/// is read. A snapshot that cannot be used is logged and the full history is
/// replayed instead.
///
/// # Errors
///
/// Propagates repository failures and `DomainError::Reconstruction` from the
/// full replay.
pub async fn load_combat(
    repo: &dyn EventRepository,
    combat_id: &AggregateId,
    use_snapshot: bool,
) -> Result<Combat, DomainError> {
    if use_snapshot {
        if let Some(snapshot) = repo.load_snapshot(combat_id).await? {
            let tail = repo
                .load_events_from(combat_id, snapshot.aggregate_version)
                .await?;
            match reconstitute_from_snapshot(combat_id, &snapshot, &tail) {
                Ok(combat) => {
                    debug!(
                        %combat_id,
                        snapshot_version = snapshot.aggregate_version,
                        tail = tail.len(),
                        "combat loaded from snapshot"
                    );
                    return Ok(combat);
                }
                Err(DomainError::Reconstruction { reason, .. }) => {
                    warn!(
                        %combat_id,
                        snapshot_version = snapshot.aggregate_version,
                        %reason,
                        "snapshot unusable, replaying full history"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    let events = repo.load_events(combat_id).await?;
    reconstitute(combat_id, &events)
}
