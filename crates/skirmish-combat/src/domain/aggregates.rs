//! Aggregate root for the Combat context.
//!
//! Command methods validate against the folded state, then record events by
//! folding them immediately, so a command that emits two events sees the
//! first one applied when building the second.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skirmish_core::aggregate::{AggregateRoot, SnapshotAggregate};
use skirmish_core::clock::Clock;
use skirmish_core::error::DomainError;
use skirmish_core::event::EventMetadata;
use skirmish_core::id::AggregateId;
use skirmish_core::repository::Snapshot;
use uuid::Uuid;

use super::events::{
    ActionExecuted, ActionKind, CombatEvent, CombatEventKind, CombatStarted, CombatTerminated,
    DamageApplied, GridSize, Position, Roster, TurnAdvanced, UnitDefeated,
};

/// Where a combat is in its life.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    /// No event has been applied yet.
    #[default]
    NotStarted,
    /// Started and accepting actions.
    Active,
    /// Ended; no further event is legal.
    Terminated,
}

impl Lifecycle {
    /// Lower-case name used in views and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Active => "active",
            Self::Terminated => "terminated",
        }
    }
}

/// A participating unit as folded from the event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Unit identifier.
    pub unit_id: String,
    /// Owning team.
    pub team_id: String,
    /// Display name.
    pub name: String,
    /// Health cap.
    pub max_health: u32,
    /// Current health.
    pub health: u32,
    /// Current cell.
    pub position: Position,
    /// Braced since its last `defend` action.
    pub defending: bool,
    /// Set once a `UnitDefeated` event has been applied.
    pub defeated: bool,
}

impl Unit {
    /// A unit with health left can act and be targeted.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.health > 0
    }
}

/// Folded combat state. This is also the snapshot payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatState {
    /// Lifecycle stage.
    pub lifecycle: Lifecycle,
    /// Grid dimensions, set by `CombatStarted`.
    pub grid: Option<GridSize>,
    /// Team ids in roster order.
    pub teams: Vec<String>,
    /// Units keyed by id.
    pub units: BTreeMap<String, Unit>,
    /// Unit ids in initiative order.
    pub turn_order: Vec<String>,
    /// Current turn number, starting at 1.
    pub turn: u32,
    /// Unit whose turn it is.
    pub active_unit_id: Option<String>,
    /// Whether the active unit has already acted this turn.
    pub acted_this_turn: bool,
    /// Winning team, once terminated.
    pub victor_team_id: Option<String>,
    /// Why the combat ended, once terminated.
    pub termination_reason: Option<String>,
}

impl CombatState {
    /// Looks up a unit by id.
    #[must_use]
    pub fn unit(&self, unit_id: &str) -> Option<&Unit> {
        self.units.get(unit_id)
    }

    /// The living unit standing on `position`, if any.
    #[must_use]
    pub fn occupant(&self, position: Position) -> Option<&Unit> {
        self.units
            .values()
            .find(|u| u.is_alive() && u.position == position)
    }

    /// Units in initiative order.
    pub fn units_in_turn_order(&self) -> impl Iterator<Item = &Unit> {
        self.turn_order.iter().filter_map(|id| self.units.get(id))
    }

    /// Teams that still have at least one living unit.
    #[must_use]
    pub fn standing_teams(&self) -> Vec<&str> {
        self.teams
            .iter()
            .filter(|team| {
                self.units
                    .values()
                    .any(|u| &u.team_id == *team && u.is_alive())
            })
            .map(String::as_str)
            .collect()
    }
}

/// Checks a combat setup for malformed input.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the grid is empty, fewer than two
/// teams take part, a team fields no units, ids are blank or duplicated, a
/// unit has no health, or starting cells are off-grid or shared.
pub fn validate_setup(grid: GridSize, rosters: &[Roster]) -> Result<(), DomainError> {
    if grid.width == 0 || grid.height == 0 {
        return Err(DomainError::Validation(format!(
            "grid must be at least 1x1, got {}x{}",
            grid.width, grid.height
        )));
    }
    if rosters.len() < 2 {
        return Err(DomainError::Validation(format!(
            "a combat needs at least two teams, got {}",
            rosters.len()
        )));
    }

    let mut teams = HashSet::new();
    let mut units = HashSet::new();
    let mut cells = HashSet::new();
    for roster in rosters {
        if roster.team_id.trim().is_empty() {
            return Err(DomainError::Validation("team id must not be blank".into()));
        }
        if !teams.insert(roster.team_id.as_str()) {
            return Err(DomainError::Validation(format!(
                "team {} appears more than once",
                roster.team_id
            )));
        }
        if roster.units.is_empty() {
            return Err(DomainError::Validation(format!(
                "team {} fields no units",
                roster.team_id
            )));
        }
        for unit in &roster.units {
            if unit.unit_id.trim().is_empty() {
                return Err(DomainError::Validation("unit id must not be blank".into()));
            }
            if !units.insert(unit.unit_id.as_str()) {
                return Err(DomainError::Validation(format!(
                    "unit {} appears more than once",
                    unit.unit_id
                )));
            }
            if unit.max_health == 0 {
                return Err(DomainError::Validation(format!(
                    "unit {} must start with health",
                    unit.unit_id
                )));
            }
            if !grid.contains(unit.position) {
                return Err(DomainError::Validation(format!(
                    "unit {} starts outside the grid",
                    unit.unit_id
                )));
            }
            if !cells.insert(unit.position) {
                return Err(DomainError::Validation(format!(
                    "unit {} starts on an occupied cell",
                    unit.unit_id
                )));
            }
        }
    }
    Ok(())
}

/// Interleaves the rosters rank by rank: every team's first unit, then every
/// team's second unit, and so on.
#[must_use]
pub fn initiative_order(rosters: &[Roster]) -> Vec<String> {
    let deepest = rosters.iter().map(|r| r.units.len()).max().unwrap_or(0);
    (0..deepest)
        .flat_map(|rank| rosters.iter().filter_map(move |r| r.units.get(rank)))
        .map(|u| u.unit_id.clone())
        .collect()
}

fn corrupt(aggregate_id: &AggregateId, reason: impl Into<String>) -> DomainError {
    DomainError::Reconstruction {
        aggregate_id: aggregate_id.clone(),
        reason: reason.into(),
    }
}

/// The aggregate root for a combat.
#[derive(Debug, Clone)]
pub struct Combat {
    id: AggregateId,
    version: i64,
    pub(crate) state: CombatState,
    uncommitted_events: Vec<CombatEvent>,
}

impl Combat {
    /// Creates an empty, not-yet-started combat.
    #[must_use]
    pub fn new(id: AggregateId) -> Self {
        Self {
            id,
            version: 0,
            state: CombatState::default(),
            uncommitted_events: Vec::new(),
        }
    }

    /// The folded state.
    #[must_use]
    pub fn state(&self) -> &CombatState {
        &self.state
    }

    /// Current lifecycle stage.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.state.lifecycle
    }

    fn record(
        &mut self,
        kind: CombatEventKind,
        correlation_id: Uuid,
        occurred_at: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let event = CombatEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.tag().to_owned(),
                aggregate_id: self.id.clone(),
                aggregate_version: self.version + 1,
                correlation_id,
                causation_id: correlation_id,
                occurred_at,
            },
            kind,
        };
        self.apply(&event)?;
        self.uncommitted_events.push(event);
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        match self.state.lifecycle {
            Lifecycle::Active => Ok(()),
            Lifecycle::NotStarted => Err(DomainError::RuleViolation(
                "combat has not started".to_owned(),
            )),
            Lifecycle::Terminated => Err(DomainError::RuleViolation(
                "combat has been terminated".to_owned(),
            )),
        }
    }

    fn living_unit(&self, unit_id: &str) -> Result<&Unit, DomainError> {
        let unit = self.state.unit(unit_id).ok_or_else(|| {
            DomainError::RuleViolation(format!("unit {unit_id} is not part of this combat"))
        })?;
        if !unit.is_alive() {
            return Err(DomainError::RuleViolation(format!(
                "unit {unit_id} has been defeated"
            )));
        }
        Ok(unit)
    }

    /// Starts the combat, producing `CombatStarted`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::RuleViolation` if the combat already started and
    /// `DomainError::Validation` for a malformed setup.
    pub fn start(
        &mut self,
        grid: GridSize,
        rosters: Vec<Roster>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.state.lifecycle != Lifecycle::NotStarted {
            return Err(DomainError::RuleViolation(
                "combat has already started".to_owned(),
            ));
        }
        validate_setup(grid, &rosters)?;
        let turn_order = initiative_order(&rosters);

        self.record(
            CombatEventKind::CombatStarted(CombatStarted {
                grid,
                rosters,
                turn_order,
            }),
            correlation_id,
            clock.now(),
        )
    }

    /// Executes the active unit's action, producing `ActionExecuted` and,
    /// when an attack drops the target to zero health, `UnitDefeated`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::RuleViolation` if the combat is not active, it is
    /// not the actor's turn, the actor already acted, or the target or
    /// destination is not legal for the action. Returns
    /// `DomainError::Validation` for a zero amount or a misplaced target.
    pub fn execute_action(
        &mut self,
        actor_id: &str,
        target_id: Option<&str>,
        action: ActionKind,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_active()?;
        let actor = self.living_unit(actor_id)?;
        if self.state.active_unit_id.as_deref() != Some(actor_id) {
            return Err(DomainError::RuleViolation(format!(
                "it is not unit {actor_id}'s turn"
            )));
        }
        if self.state.acted_this_turn {
            return Err(DomainError::RuleViolation(format!(
                "unit {actor_id} has already acted this turn"
            )));
        }

        let mut defeated = None;
        match action {
            ActionKind::Attack { damage } => {
                if damage == 0 {
                    return Err(DomainError::Validation(
                        "attack damage must be positive".into(),
                    ));
                }
                let target_id = target_id.ok_or_else(|| {
                    DomainError::Validation("an attack needs a target".into())
                })?;
                let target = self.living_unit(target_id)?;
                if target.team_id == actor.team_id {
                    return Err(DomainError::RuleViolation(format!(
                        "unit {actor_id} cannot attack ally {target_id}"
                    )));
                }
                if damage >= target.health {
                    defeated = Some(target.unit_id.clone());
                }
            }
            ActionKind::Heal { amount } => {
                if amount == 0 {
                    return Err(DomainError::Validation("heal amount must be positive".into()));
                }
                let target_id = target_id
                    .ok_or_else(|| DomainError::Validation("a heal needs a target".into()))?;
                let target = self.living_unit(target_id)?;
                if target.team_id != actor.team_id {
                    return Err(DomainError::RuleViolation(format!(
                        "unit {actor_id} cannot heal enemy {target_id}"
                    )));
                }
            }
            ActionKind::Move { to } => {
                if target_id.is_some() {
                    return Err(DomainError::Validation("a move takes no target".into()));
                }
                let inside = self.state.grid.is_some_and(|grid| grid.contains(to));
                if !inside {
                    return Err(DomainError::RuleViolation(format!(
                        "cell ({}, {}) is outside the grid",
                        to.x, to.y
                    )));
                }
                if let Some(occupant) = self.state.occupant(to) {
                    return Err(DomainError::RuleViolation(format!(
                        "cell ({}, {}) is occupied by unit {}",
                        to.x, to.y, occupant.unit_id
                    )));
                }
            }
            ActionKind::Defend => {
                if target_id.is_some() {
                    return Err(DomainError::Validation("defend takes no target".into()));
                }
            }
        }

        let now = clock.now();
        self.record(
            CombatEventKind::ActionExecuted(ActionExecuted {
                actor_id: actor_id.to_owned(),
                target_id: target_id.map(str::to_owned),
                action,
            }),
            correlation_id,
            now,
        )?;
        if let Some(unit_id) = defeated {
            self.record(
                CombatEventKind::UnitDefeated(UnitDefeated { unit_id }),
                correlation_id,
                now,
            )?;
        }
        Ok(())
    }

    /// Applies damage from outside the turn structure, producing
    /// `DamageApplied` and, if the unit drops to zero health,
    /// `UnitDefeated`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::RuleViolation` if the combat is not active or the
    /// target is unknown or already defeated, and `DomainError::Validation`
    /// for a zero amount.
    pub fn apply_damage(
        &mut self,
        target_id: &str,
        amount: u32,
        source: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_active()?;
        if amount == 0 {
            return Err(DomainError::Validation("damage must be positive".into()));
        }
        let lethal = amount >= self.living_unit(target_id)?.health;

        let now = clock.now();
        self.record(
            CombatEventKind::DamageApplied(DamageApplied {
                target_id: target_id.to_owned(),
                amount,
                source: source.to_owned(),
            }),
            correlation_id,
            now,
        )?;
        if lethal {
            self.record(
                CombatEventKind::UnitDefeated(UnitDefeated {
                    unit_id: target_id.to_owned(),
                }),
                correlation_id,
                now,
            )?;
        }
        Ok(())
    }

    /// Passes the turn to the next living unit in initiative order,
    /// producing `TurnAdvanced`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::RuleViolation` if the combat is not active or no
    /// living unit remains.
    pub fn advance_turn(
        &mut self,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_active()?;
        let next = self
            .next_living_unit()
            .ok_or_else(|| DomainError::RuleViolation("no living unit remains".into()))?
            .to_owned();
        let turn = self
            .state
            .turn
            .checked_add(1)
            .ok_or_else(|| DomainError::RuleViolation("turn counter exhausted".into()))?;

        self.record(
            CombatEventKind::TurnAdvanced(TurnAdvanced {
                turn,
                active_unit_id: next,
            }),
            correlation_id,
            clock.now(),
        )
    }

    fn next_living_unit(&self) -> Option<&str> {
        let order = &self.state.turn_order;
        if order.is_empty() {
            return None;
        }
        let current = self
            .state
            .active_unit_id
            .as_deref()
            .and_then(|id| order.iter().position(|u| u == id))
            .unwrap_or(order.len() - 1);
        (1..=order.len())
            .map(|step| &order[(current + step) % order.len()])
            .find(|id| self.state.unit(id).is_some_and(Unit::is_alive))
            .map(String::as_str)
    }

    /// Ends the combat, producing `CombatTerminated`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::RuleViolation` if the combat is not active or the
    /// victor is not one of its teams.
    pub fn terminate(
        &mut self,
        victor_team_id: Option<&str>,
        reason: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        self.ensure_active()?;
        if let Some(victor) = victor_team_id {
            if !self.state.teams.iter().any(|t| t == victor) {
                return Err(DomainError::RuleViolation(format!(
                    "team {victor} is not part of this combat"
                )));
            }
        }

        self.record(
            CombatEventKind::CombatTerminated(CombatTerminated {
                victor_team_id: victor_team_id.map(str::to_owned),
                reason: reason.to_owned(),
            }),
            correlation_id,
            clock.now(),
        )
    }

    fn require_active_on_replay(&self, tag: &str) -> Result<(), DomainError> {
        if self.state.lifecycle == Lifecycle::Active {
            Ok(())
        } else {
            Err(corrupt(
                &self.id,
                format!(
                    "{tag} is not legal while the combat is {}",
                    self.state.lifecycle.as_str()
                ),
            ))
        }
    }

    fn fold_started(&mut self, payload: &CombatStarted) -> Result<(), DomainError> {
        if self.state.lifecycle != Lifecycle::NotStarted {
            return Err(corrupt(&self.id, "combat.started applied twice"));
        }
        let mut units = BTreeMap::new();
        for roster in &payload.rosters {
            for spec in &roster.units {
                units.insert(
                    spec.unit_id.clone(),
                    Unit {
                        unit_id: spec.unit_id.clone(),
                        team_id: roster.team_id.clone(),
                        name: spec.name.clone(),
                        max_health: spec.max_health,
                        health: spec.max_health,
                        position: spec.position,
                        defending: false,
                        defeated: false,
                    },
                );
            }
        }
        let Some(first) = payload.turn_order.first() else {
            return Err(corrupt(&self.id, "combat.started has an empty turn order"));
        };
        if let Some(stranger) = payload.turn_order.iter().find(|id| !units.contains_key(*id)) {
            return Err(corrupt(
                &self.id,
                format!("turn order names unknown unit {stranger}"),
            ));
        }

        self.state = CombatState {
            lifecycle: Lifecycle::Active,
            grid: Some(payload.grid),
            teams: payload.rosters.iter().map(|r| r.team_id.clone()).collect(),
            units,
            turn_order: payload.turn_order.clone(),
            turn: 1,
            active_unit_id: Some(first.clone()),
            acted_this_turn: false,
            victor_team_id: None,
            termination_reason: None,
        };
        Ok(())
    }

    fn fold_action(&mut self, payload: &ActionExecuted) -> Result<(), DomainError> {
        self.require_active_on_replay("combat.action_executed")?;
        if !self.state.units.contains_key(&payload.actor_id) {
            return Err(corrupt(
                &self.id,
                format!("unknown actor {}", payload.actor_id),
            ));
        }
        let target = match &payload.target_id {
            Some(id) if !self.state.units.contains_key(id) => {
                return Err(corrupt(&self.id, format!("unknown target {id}")));
            }
            Some(id) => Some(id.as_str()),
            None => None,
        };

        match (payload.action, target) {
            (ActionKind::Attack { damage }, Some(target)) => {
                if let Some(unit) = self.state.units.get_mut(target) {
                    unit.health = unit.health.saturating_sub(damage);
                }
            }
            (ActionKind::Heal { amount }, Some(target)) => {
                if let Some(unit) = self.state.units.get_mut(target) {
                    unit.health = unit.health.saturating_add(amount).min(unit.max_health);
                }
            }
            (ActionKind::Move { to }, None) => {
                if let Some(unit) = self.state.units.get_mut(&payload.actor_id) {
                    unit.position = to;
                }
            }
            (ActionKind::Defend, None) => {
                if let Some(unit) = self.state.units.get_mut(&payload.actor_id) {
                    unit.defending = true;
                }
            }
            (action, _) => {
                return Err(corrupt(
                    &self.id,
                    format!("{} action with a mismatched target", action.name()),
                ));
            }
        }
        self.state.acted_this_turn = true;
        Ok(())
    }

    fn fold_damage(&mut self, payload: &DamageApplied) -> Result<(), DomainError> {
        self.require_active_on_replay("combat.damage_applied")?;
        let Some(unit) = self.state.units.get_mut(&payload.target_id) else {
            return Err(corrupt(
                &self.id,
                format!("unknown target {}", payload.target_id),
            ));
        };
        unit.health = unit.health.saturating_sub(payload.amount);
        Ok(())
    }

    fn fold_defeated(&mut self, payload: &UnitDefeated) -> Result<(), DomainError> {
        self.require_active_on_replay("combat.unit_defeated")?;
        let Some(unit) = self.state.units.get_mut(&payload.unit_id) else {
            return Err(corrupt(
                &self.id,
                format!("unknown unit {}", payload.unit_id),
            ));
        };
        if unit.health > 0 || unit.defeated {
            return Err(corrupt(
                &self.id,
                format!("unit {} cannot be defeated here", payload.unit_id),
            ));
        }
        unit.defeated = true;
        unit.defending = false;
        Ok(())
    }

    fn fold_turn(&mut self, payload: &TurnAdvanced) -> Result<(), DomainError> {
        self.require_active_on_replay("combat.turn_advanced")?;
        if Some(payload.turn) != self.state.turn.checked_add(1) {
            return Err(corrupt(
                &self.id,
                format!(
                    "turn {} does not follow turn {}",
                    payload.turn, self.state.turn
                ),
            ));
        }
        let Some(unit) = self.state.units.get_mut(&payload.active_unit_id) else {
            return Err(corrupt(
                &self.id,
                format!("unknown unit {}", payload.active_unit_id),
            ));
        };
        unit.defending = false;
        self.state.turn = payload.turn;
        self.state.active_unit_id = Some(payload.active_unit_id.clone());
        self.state.acted_this_turn = false;
        Ok(())
    }

    fn fold_terminated(&mut self, payload: &CombatTerminated) -> Result<(), DomainError> {
        self.require_active_on_replay("combat.terminated")?;
        self.state.lifecycle = Lifecycle::Terminated;
        self.state.active_unit_id = None;
        self.state.victor_team_id.clone_from(&payload.victor_team_id);
        self.state.termination_reason = Some(payload.reason.clone());
        Ok(())
    }
}

impl AggregateRoot for Combat {
    type Event = CombatEvent;

    fn aggregate_id(&self) -> &AggregateId {
        &self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) -> Result<(), DomainError> {
        let meta = &event.metadata;
        if meta.aggregate_id != self.id {
            return Err(corrupt(
                &self.id,
                format!("event {} belongs to {}", meta.event_id, meta.aggregate_id),
            ));
        }
        if meta.aggregate_version != self.version + 1 {
            return Err(corrupt(
                &self.id,
                format!(
                    "event {} has version {}, expected {}",
                    meta.event_id,
                    meta.aggregate_version,
                    self.version + 1
                ),
            ));
        }

        match &event.kind {
            CombatEventKind::CombatStarted(p) => self.fold_started(p)?,
            CombatEventKind::ActionExecuted(p) => self.fold_action(p)?,
            CombatEventKind::DamageApplied(p) => self.fold_damage(p)?,
            CombatEventKind::UnitDefeated(p) => self.fold_defeated(p)?,
            CombatEventKind::TurnAdvanced(p) => self.fold_turn(p)?,
            CombatEventKind::CombatTerminated(p) => self.fold_terminated(p)?,
        }
        self.version = meta.aggregate_version;
        Ok(())
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn clear_uncommitted_events(&mut self) {
        self.uncommitted_events.clear();
    }
}

impl SnapshotAggregate for Combat {
    fn to_snapshot(&self, taken_at: DateTime<Utc>) -> Result<Snapshot, DomainError> {
        if !self.uncommitted_events.is_empty() {
            return Err(DomainError::Validation(format!(
                "combat {} has uncommitted events",
                self.id
            )));
        }
        if self.version == 0 {
            return Err(DomainError::Validation(format!(
                "combat {} has no events to snapshot",
                self.id
            )));
        }
        let data = serde_json::to_value(&self.state).map_err(|e| {
            DomainError::Infrastructure(format!("cannot serialize combat {}: {e}", self.id))
        })?;
        Ok(Snapshot {
            aggregate_id: self.id.clone(),
            aggregate_version: self.version,
            data,
            taken_at,
        })
    }

    fn from_snapshot(snapshot: &Snapshot) -> Result<Self, DomainError> {
        if snapshot.aggregate_version < 1 {
            return Err(corrupt(
                &snapshot.aggregate_id,
                format!("snapshot has version {}", snapshot.aggregate_version),
            ));
        }
        let state: CombatState = serde_json::from_value(snapshot.data.clone())
            .map_err(|e| corrupt(&snapshot.aggregate_id, format!("snapshot data: {e}")))?;
        Ok(Self {
            id: snapshot.aggregate_id.clone(),
            version: snapshot.aggregate_version,
            state,
            uncommitted_events: Vec::new(),
        })
    }
}
