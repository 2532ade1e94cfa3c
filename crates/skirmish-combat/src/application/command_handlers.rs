//! Command handlers for the Combat context.
//!
//! Every command runs the same pipeline: validate the input, rebuild the
//! combat, check that it exists (or not), let the aggregate decide, append the
//! new events at the version the combat was loaded at, publish them, and take
//! a snapshot when one is due. Publishing and snapshotting happen after the
//! commit and never fail the command.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;

use serde::Serialize;
use skirmish_core::aggregate::{AggregateRoot, SnapshotAggregate};
use skirmish_core::clock::Clock;
use skirmish_core::command::Command;
use skirmish_core::error::DomainError;
use skirmish_core::event::DomainEvent;
use skirmish_core::id::AggregateId;
use skirmish_core::publisher::EventPublisher;
use skirmish_core::repository::{EventRepository, Snapshot, StoredEvent};
use tracing::{debug, info, instrument, warn};

use crate::application::query_handlers::CombatView;
use crate::application::replay::load_combat;
use crate::domain::aggregates::Combat;
use crate::domain::commands::{
    AdvanceTurn, ApplyDamage, ExecuteAction, StartCombat, TerminateCombat,
};

/// When the service writes snapshots after a command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotPolicy {
    interval: Option<NonZeroU64>,
}

impl SnapshotPolicy {
    /// Never snapshot; every load replays the full history.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { interval: None }
    }

    /// Snapshot whenever a commit crosses a multiple of `interval`.
    #[must_use]
    pub const fn every(interval: NonZeroU64) -> Self {
        Self {
            interval: Some(interval),
        }
    }

    /// The configured interval, if snapshots are enabled.
    #[must_use]
    pub const fn interval(&self) -> Option<NonZeroU64> {
        self.interval
    }

    /// Whether loads should look for a snapshot.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }

    /// Whether a commit moving the stream from `before` to `after` crosses a
    /// multiple of the interval.
    #[must_use]
    pub fn is_due(&self, before: i64, after: i64) -> bool {
        let Some(interval) = self.interval else {
            return false;
        };
        let interval = i64::try_from(interval.get()).unwrap_or(i64::MAX);
        after > before && before.div_euclid(interval) != after.div_euclid(interval)
    }
}

/// Result of a successful command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutcome {
    /// The combat as of the committed events.
    pub combat: CombatView,
    /// The committed events, with store-assigned timestamps.
    pub events: Vec<StoredEvent>,
    /// Versions that are committed but were not published. Empty when every
    /// event reached the broker.
    pub unpublished_versions: Vec<i64>,
}

#[derive(Debug, Clone, Copy)]
enum Existence {
    MustNotExist,
    MustExist,
}

/// Orchestrates Combat commands over an event repository and a publisher.
#[derive(Clone)]
pub struct CombatService {
    pub(crate) repo: Arc<dyn EventRepository>,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    pub(crate) snapshot_policy: SnapshotPolicy,
}

impl fmt::Debug for CombatService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombatService")
            .field("snapshot_policy", &self.snapshot_policy)
            .finish_non_exhaustive()
    }
}

impl CombatService {
    /// Creates a service with snapshots disabled.
    #[must_use]
    pub fn new(
        repo: Arc<dyn EventRepository>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            publisher,
            clock,
            snapshot_policy: SnapshotPolicy::disabled(),
        }
    }

    /// Replaces the snapshot policy.
    #[must_use]
    pub fn with_snapshot_policy(mut self, snapshot_policy: SnapshotPolicy) -> Self {
        self.snapshot_policy = snapshot_policy;
        self
    }

    /// Handles `StartCombat`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateAlreadyExists` if the combat has events,
    /// `DomainError::Validation` for a malformed setup, and repository errors
    /// from the load or append.
    #[instrument(skip_all, fields(combat_id = %command.combat_id, correlation_id = %command.correlation_id))]
    pub async fn start_combat(
        &self,
        command: &StartCombat,
    ) -> Result<CommandOutcome, DomainError> {
        self.execute(command, Existence::MustNotExist, |combat, clock| {
            combat.start(
                command.grid,
                command.rosters.clone(),
                command.correlation_id,
                clock,
            )
        })
        .await
    }

    /// Handles `ExecuteAction`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` for an unknown combat,
    /// `DomainError::RuleViolation` for an illegal action, and repository
    /// errors, including `DomainError::ConcurrencyConflict` when another
    /// writer committed first.
    #[instrument(skip_all, fields(combat_id = %command.combat_id, correlation_id = %command.correlation_id, actor_id = %command.actor_id, action = command.action.name()))]
    pub async fn execute_action(
        &self,
        command: &ExecuteAction,
    ) -> Result<CommandOutcome, DomainError> {
        self.execute(command, Existence::MustExist, |combat, clock| {
            combat.execute_action(
                &command.actor_id,
                command.target_id.as_deref(),
                command.action,
                command.correlation_id,
                clock,
            )
        })
        .await
    }

    /// Handles `ApplyDamage`.
    ///
    /// # Errors
    ///
    /// See [`CombatService::execute_action`].
    #[instrument(skip_all, fields(combat_id = %command.combat_id, correlation_id = %command.correlation_id, target_id = %command.target_id))]
    pub async fn apply_damage(
        &self,
        command: &ApplyDamage,
    ) -> Result<CommandOutcome, DomainError> {
        self.execute(command, Existence::MustExist, |combat, clock| {
            combat.apply_damage(
                &command.target_id,
                command.amount,
                &command.source,
                command.correlation_id,
                clock,
            )
        })
        .await
    }

    /// Handles `AdvanceTurn`.
    ///
    /// # Errors
    ///
    /// See [`CombatService::execute_action`].
    #[instrument(skip_all, fields(combat_id = %command.combat_id, correlation_id = %command.correlation_id))]
    pub async fn advance_turn(
        &self,
        command: &AdvanceTurn,
    ) -> Result<CommandOutcome, DomainError> {
        self.execute(command, Existence::MustExist, |combat, clock| {
            combat.advance_turn(command.correlation_id, clock)
        })
        .await
    }

    /// Handles `TerminateCombat`.
    ///
    /// # Errors
    ///
    /// See [`CombatService::execute_action`]. Terminating twice is a
    /// `DomainError::RuleViolation`.
    #[instrument(skip_all, fields(combat_id = %command.combat_id, correlation_id = %command.correlation_id))]
    pub async fn terminate_combat(
        &self,
        command: &TerminateCombat,
    ) -> Result<CommandOutcome, DomainError> {
        self.execute(command, Existence::MustExist, |combat, clock| {
            combat.terminate(
                command.victor_team_id.as_deref(),
                &command.reason,
                command.correlation_id,
                clock,
            )
        })
        .await
    }

    async fn execute<C, F>(
        &self,
        command: &C,
        existence: Existence,
        decide: F,
    ) -> Result<CommandOutcome, DomainError>
    where
        C: Command,
        F: FnOnce(&mut Combat, &dyn Clock) -> Result<(), DomainError> + Send,
    {
        command.validate()?;
        let combat_id = command.aggregate_id();
        let mut combat = load_combat(
            self.repo.as_ref(),
            combat_id,
            self.snapshot_policy.is_enabled(),
        )
        .await?;

        match existence {
            Existence::MustNotExist if combat.version() > 0 => {
                return Err(DomainError::AggregateAlreadyExists(combat_id.clone()));
            }
            Existence::MustExist if combat.version() == 0 => {
                return Err(DomainError::AggregateNotFound(combat_id.clone()));
            }
            _ => {}
        }

        decide(&mut combat, self.clock.as_ref())?;

        let expected_version = combat.committed_version();
        let new_events = combat
            .uncommitted_events()
            .iter()
            .map(DomainEvent::to_new_event)
            .collect::<Result<Vec<_>, _>>()?;
        let committed = self
            .repo
            .append_events(combat_id, expected_version, &new_events)
            .await?;
        combat.clear_uncommitted_events();
        info!(
            command = command.command_type(),
            from_version = expected_version,
            to_version = combat.version(),
            "events committed"
        );

        let unpublished_versions = self.publish_in_order(&committed).await;
        self.snapshot_if_due(&combat, expected_version).await;

        Ok(CommandOutcome {
            combat: CombatView::from(&combat),
            events: committed,
            unpublished_versions,
        })
    }

    /// Publishes `events` in version order and stops at the first failure, so
    /// a subscriber never sees a later version before an earlier one from the
    /// same commit. Returns the versions left unpublished.
    async fn publish_in_order(&self, events: &[StoredEvent]) -> Vec<i64> {
        for (index, event) in events.iter().enumerate() {
            if let Err(e) = self.publisher.publish(event).await {
                let unpublished: Vec<i64> =
                    events[index..].iter().map(|ev| ev.aggregate_version).collect();
                warn!(
                    error = %e,
                    aggregate_id = %event.aggregate_id,
                    first_unpublished = event.aggregate_version,
                    unpublished = unpublished.len(),
                    "publish failed after commit; republish to recover"
                );
                return unpublished;
            }
        }
        Vec::new()
    }

    async fn snapshot_if_due(&self, combat: &Combat, before: i64) {
        if !self.snapshot_policy.is_due(before, combat.version()) {
            return;
        }
        let saved = match combat.to_snapshot(self.clock.now()) {
            Ok(snapshot) => self.repo.save_snapshot(&snapshot).await,
            Err(e) => Err(e),
        };
        match saved {
            Ok(()) => debug!(version = combat.version(), "snapshot saved"),
            Err(e) => warn!(error = %e, version = combat.version(), "snapshot not saved"),
        }
    }

    /// Writes a snapshot of the combat at its current version.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` for an unknown combat and
    /// repository errors from the load or save.
    #[instrument(skip(self))]
    pub async fn take_snapshot(&self, combat_id: &AggregateId) -> Result<Snapshot, DomainError> {
        let combat = load_combat(self.repo.as_ref(), combat_id, true).await?;
        if combat.version() == 0 {
            return Err(DomainError::AggregateNotFound(combat_id.clone()));
        }
        let snapshot = combat.to_snapshot(self.clock.now())?;
        self.repo.save_snapshot(&snapshot).await?;
        info!(version = snapshot.aggregate_version, "snapshot saved");
        Ok(snapshot)
    }

    /// Publishes the committed events from `from_version` onwards again.
    /// Subscribers deduplicate on `{aggregate_id}:{aggregate_version}`.
    /// Returns how many events were published.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `from_version` is below 1,
    /// `DomainError::AggregateNotFound` for an unknown combat, and the first
    /// `DomainError::Publish` encountered; events before it were published.
    #[instrument(skip(self))]
    pub async fn republish(
        &self,
        combat_id: &AggregateId,
        from_version: i64,
    ) -> Result<usize, DomainError> {
        if from_version < 1 {
            return Err(DomainError::Validation(format!(
                "republish must start at version 1 or later, got {from_version}"
            )));
        }
        let events = self
            .repo
            .load_events_from(combat_id, from_version - 1)
            .await?;
        if events.is_empty() && self.repo.load_events(combat_id).await?.is_empty() {
            return Err(DomainError::AggregateNotFound(combat_id.clone()));
        }

        for (published, event) in events.iter().enumerate() {
            if let Err(e) = self.publisher.publish(event).await {
                warn!(
                    error = %e,
                    version = event.aggregate_version,
                    published,
                    "republish stopped"
                );
                return Err(e);
            }
        }
        info!(published = events.len(), "events republished");
        Ok(events.len())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use skirmish_core::repository::NewEvent;
    use skirmish_test_support::{
        EmptyEventRepository, FailingEventPublisher, FailingEventRepository, FixedClock,
        RecordingEventPublisher, RecordingEventRepository, fixed_time,
    };
    use uuid::Uuid;

    use super::*;
    use crate::domain::events::{ActionKind, GridSize, Position, Roster, UnitSpec};

    fn combat_id() -> AggregateId {
        AggregateId::parse("combat-1").unwrap()
    }

    fn grid() -> GridSize {
        GridSize {
            width: 6,
            height: 6,
        }
    }

    /// Red fields r1 (12 hp), blue fields b1 (6 hp); r1 acts first.
    fn rosters() -> Vec<Roster> {
        vec![
            Roster {
                team_id: "red".to_owned(),
                units: vec![UnitSpec {
                    unit_id: "r1".to_owned(),
                    name: "Red Knight".to_owned(),
                    max_health: 12,
                    position: Position { x: 0, y: 0 },
                }],
            },
            Roster {
                team_id: "blue".to_owned(),
                units: vec![UnitSpec {
                    unit_id: "b1".to_owned(),
                    name: "Blue Archer".to_owned(),
                    max_health: 6,
                    position: Position { x: 5, y: 5 },
                }],
            },
        ]
    }

    fn started_history() -> Vec<StoredEvent> {
        let mut combat = Combat::new(combat_id());
        combat
            .start(grid(), rosters(), Uuid::new_v4(), &FixedClock::default())
            .unwrap();
        combat
            .uncommitted_events()
            .iter()
            .map(|e| e.to_new_event().unwrap().into_stored(fixed_time()))
            .collect()
    }

    fn service(
        repo: Arc<dyn EventRepository>,
        publisher: Arc<dyn EventPublisher>,
    ) -> CombatService {
        CombatService::new(repo, publisher, Arc::new(FixedClock::default()))
    }

    fn start_command() -> StartCombat {
        StartCombat {
            correlation_id: Uuid::new_v4(),
            combat_id: combat_id(),
            grid: grid(),
            rosters: rosters(),
        }
    }

    fn attack(damage: u32) -> ExecuteAction {
        ExecuteAction {
            correlation_id: Uuid::new_v4(),
            combat_id: combat_id(),
            actor_id: "r1".to_owned(),
            target_id: Some("b1".to_owned()),
            action: ActionKind::Attack { damage },
        }
    }

    /// Serves a fixed history and rejects every append as stale.
    struct ConflictingRepository(RecordingEventRepository);

    #[async_trait]
    impl EventRepository for ConflictingRepository {
        async fn load_events(
            &self,
            aggregate_id: &AggregateId,
        ) -> Result<Vec<StoredEvent>, DomainError> {
            self.0.load_events(aggregate_id).await
        }

        async fn load_events_from(
            &self,
            aggregate_id: &AggregateId,
            from_version: i64,
        ) -> Result<Vec<StoredEvent>, DomainError> {
            self.0.load_events_from(aggregate_id, from_version).await
        }

        async fn append_events(
            &self,
            aggregate_id: &AggregateId,
            expected_version: i64,
            _events: &[NewEvent],
        ) -> Result<Vec<StoredEvent>, DomainError> {
            Err(DomainError::ConcurrencyConflict {
                aggregate_id: aggregate_id.clone(),
                expected: expected_version,
                actual: expected_version + 1,
            })
        }

        async fn save_snapshot(&self, snapshot: &Snapshot) -> Result<(), DomainError> {
            self.0.save_snapshot(snapshot).await
        }

        async fn load_snapshot(
            &self,
            aggregate_id: &AggregateId,
        ) -> Result<Option<Snapshot>, DomainError> {
            self.0.load_snapshot(aggregate_id).await
        }
    }

    // --- SnapshotPolicy ---

    #[test]
    fn test_snapshot_policy_is_due_when_crossing_interval() {
        let policy = SnapshotPolicy::every(NonZeroU64::new(3).unwrap());
        assert!(!policy.is_due(0, 2));
        assert!(policy.is_due(2, 3));
        assert!(policy.is_due(2, 4));
        assert!(!policy.is_due(3, 5));
        assert!(policy.is_due(5, 7));
    }

    #[test]
    fn test_disabled_policy_is_never_due() {
        let policy = SnapshotPolicy::disabled();
        assert!(!policy.is_enabled());
        assert!(!policy.is_due(0, 100));
    }

    // --- start_combat ---

    #[tokio::test]
    async fn test_start_combat_appends_at_version_zero_and_publishes() {
        let repo = Arc::new(RecordingEventRepository::new(Vec::new()));
        let publisher = Arc::new(RecordingEventPublisher::new());
        let command = start_command();

        let outcome = service(repo.clone(), publisher.clone())
            .start_combat(&command)
            .await
            .unwrap();

        let appended = repo.appended_events();
        assert_eq!(appended.len(), 1);
        let (agg_id, expected_version, events) = &appended[0];
        assert_eq!(agg_id, &combat_id());
        assert_eq!(*expected_version, 0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "combat.started");
        assert_eq!(events[0].correlation_id, command.correlation_id);

        assert_eq!(outcome.combat.version, 1);
        assert_eq!(outcome.combat.lifecycle, "active");
        assert_eq!(outcome.events[0].recorded_at, fixed_time());
        assert!(outcome.unpublished_versions.is_empty());

        let published = publisher.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].dedup_id(), "combat-1:1");
    }

    #[tokio::test]
    async fn test_start_existing_combat_is_already_exists() {
        let repo = Arc::new(RecordingEventRepository::new(started_history()));
        let publisher = Arc::new(RecordingEventPublisher::new());

        let result = service(repo.clone(), publisher.clone())
            .start_combat(&start_command())
            .await;

        assert!(matches!(
            result,
            Err(DomainError::AggregateAlreadyExists(id)) if id == combat_id()
        ));
        assert!(repo.appended_events().is_empty());
        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_command_fails_before_touching_storage() {
        let mut command = start_command();
        command.rosters.truncate(1);

        let result = service(
            Arc::new(FailingEventRepository),
            Arc::new(RecordingEventPublisher::new()),
        )
        .start_combat(&command)
        .await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    // --- execute_action ---

    #[tokio::test]
    async fn test_action_on_missing_combat_is_not_found() {
        let repo = Arc::new(RecordingEventRepository::new(vec![]));
        let publisher = Arc::new(RecordingEventPublisher::new());

        let result = service(repo.clone(), publisher.clone())
            .execute_action(&attack(3))
            .await;

        assert!(matches!(result, Err(DomainError::AggregateNotFound(_))));
        assert!(repo.appended_events().is_empty());
        assert!(repo.saved_snapshots().is_empty());
        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn test_lethal_attack_appends_two_events_at_loaded_version() {
        let repo = Arc::new(RecordingEventRepository::new(started_history()));
        let publisher = Arc::new(RecordingEventPublisher::new());

        let outcome = service(repo.clone(), publisher.clone())
            .execute_action(&attack(6))
            .await
            .unwrap();

        let appended = repo.appended_events();
        assert_eq!(appended.len(), 1);
        let (_, expected_version, events) = &appended[0];
        assert_eq!(*expected_version, 1);
        let versions: Vec<i64> = events.iter().map(|e| e.aggregate_version).collect();
        assert_eq!(versions, vec![2, 3]);

        let dedup: Vec<String> = publisher
            .published()
            .iter()
            .map(|e| e.dedup_id())
            .collect();
        assert_eq!(dedup, vec!["combat-1:2", "combat-1:3"]);

        assert_eq!(outcome.combat.version, 3);
        let b1 = outcome
            .combat
            .units
            .iter()
            .find(|u| u.unit_id == "b1")
            .unwrap();
        assert!(b1.defeated);
    }

    #[tokio::test]
    async fn test_rule_violation_is_returned_without_append() {
        let repo = Arc::new(RecordingEventRepository::new(started_history()));
        let publisher = Arc::new(RecordingEventPublisher::new());
        let mut command = attack(3);
        command.actor_id = "b1".to_owned();
        command.target_id = Some("r1".to_owned());

        let result = service(repo.clone(), publisher.clone())
            .execute_action(&command)
            .await;

        assert!(matches!(result, Err(DomainError::RuleViolation(_))));
        assert!(repo.appended_events().is_empty());
        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_keeps_commit_and_reports_unpublished() {
        let repo = Arc::new(RecordingEventRepository::new(started_history()));
        let publisher = Arc::new(FailingEventPublisher::first(1));

        let outcome = service(repo.clone(), publisher.clone())
            .execute_action(&attack(6))
            .await
            .unwrap();

        assert_eq!(repo.appended_events().len(), 1);
        assert_eq!(outcome.events.len(), 2);
        assert_eq!(outcome.unpublished_versions, vec![2, 3]);
        assert_eq!(publisher.attempts(), 1);
        assert!(publisher.delivered().is_empty());
    }

    #[tokio::test]
    async fn test_concurrency_conflict_is_surfaced() {
        let repo = Arc::new(ConflictingRepository(RecordingEventRepository::new(
            started_history(),
        )));
        let publisher = Arc::new(RecordingEventPublisher::new());

        let result = service(repo, publisher.clone())
            .execute_action(&attack(3))
            .await;

        match result {
            Err(e @ DomainError::ConcurrencyConflict { expected: 1, .. }) => {
                assert!(e.is_retryable());
            }
            other => panic!("expected a conflict, got {other:?}"),
        }
        assert!(publisher.published().is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_is_infrastructure_error() {
        let result = service(
            Arc::new(FailingEventRepository),
            Arc::new(RecordingEventPublisher::new()),
        )
        .execute_action(&attack(3))
        .await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    // --- snapshots ---

    #[tokio::test]
    async fn test_snapshot_written_when_commit_crosses_interval() {
        let repo = Arc::new(RecordingEventRepository::new(started_history()));
        let svc = service(repo.clone(), Arc::new(RecordingEventPublisher::new()))
            .with_snapshot_policy(SnapshotPolicy::every(NonZeroU64::new(2).unwrap()));

        svc.execute_action(&attack(6)).await.unwrap();

        let snapshots = repo.saved_snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].aggregate_version, 3);
        assert_eq!(snapshots[0].taken_at, fixed_time());
    }

    #[tokio::test]
    async fn test_no_snapshot_before_interval() {
        let repo = Arc::new(RecordingEventRepository::new(Vec::new()));
        let svc = service(repo.clone(), Arc::new(RecordingEventPublisher::new()))
            .with_snapshot_policy(SnapshotPolicy::every(NonZeroU64::new(2).unwrap()));

        svc.start_combat(&start_command()).await.unwrap();

        assert!(repo.saved_snapshots().is_empty());
    }

    #[tokio::test]
    async fn test_take_snapshot_saves_current_version() {
        let repo = Arc::new(RecordingEventRepository::new(started_history()));

        let snapshot = service(repo.clone(), Arc::new(RecordingEventPublisher::new()))
            .take_snapshot(&combat_id())
            .await
            .unwrap();

        assert_eq!(snapshot.aggregate_version, 1);
        assert_eq!(repo.saved_snapshots(), vec![snapshot]);
    }

    #[tokio::test]
    async fn test_take_snapshot_of_missing_combat_is_not_found() {
        let result = service(
            Arc::new(EmptyEventRepository),
            Arc::new(RecordingEventPublisher::new()),
        )
        .take_snapshot(&combat_id())
        .await;

        assert!(matches!(result, Err(DomainError::AggregateNotFound(_))));
    }

    // --- republish ---

    #[tokio::test]
    async fn test_republish_sends_events_from_version() {
        let mut history = started_history();
        let mut combat = crate::application::replay::reconstitute(&combat_id(), &history).unwrap();
        combat
            .execute_action(
                "r1",
                Some("b1"),
                ActionKind::Attack { damage: 6 },
                Uuid::new_v4(),
                &FixedClock::default(),
            )
            .unwrap();
        history.extend(
            combat
                .uncommitted_events()
                .iter()
                .map(|e| e.to_new_event().unwrap().into_stored(fixed_time())),
        );
        let publisher = Arc::new(RecordingEventPublisher::new());

        let count = service(
            Arc::new(RecordingEventRepository::new(history)),
            publisher.clone(),
        )
        .republish(&combat_id(), 2)
        .await
        .unwrap();

        assert_eq!(count, 2);
        let versions: Vec<i64> = publisher
            .published()
            .iter()
            .map(|e| e.aggregate_version)
            .collect();
        assert_eq!(versions, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_republish_unknown_combat_is_not_found() {
        let result = service(
            Arc::new(EmptyEventRepository),
            Arc::new(RecordingEventPublisher::new()),
        )
        .republish(&combat_id(), 1)
        .await;

        assert!(matches!(result, Err(DomainError::AggregateNotFound(_))));
    }

    #[tokio::test]
    async fn test_republish_surfaces_publish_failure() {
        let result = service(
            Arc::new(RecordingEventRepository::new(started_history())),
            Arc::new(FailingEventPublisher::always()),
        )
        .republish(&combat_id(), 1)
        .await;

        assert!(matches!(result, Err(DomainError::Publish(_))));
    }
}
