//! Query handlers for the Combat context.
//!
//! Queries rebuild the combat from the store and return read-only view DTOs.

use serde::Serialize;
use skirmish_core::aggregate::AggregateRoot;
use skirmish_core::error::DomainError;
use skirmish_core::id::AggregateId;
use skirmish_core::repository::StoredEvent;
use tracing::instrument;

use crate::application::command_handlers::CombatService;
use crate::application::replay::load_combat;
use crate::domain::aggregates::{Combat, Unit};
use crate::domain::events::{GridSize, Position};

/// Read-only view of a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitView {
    /// The unit identifier.
    pub unit_id: String,
    /// The owning team.
    pub team_id: String,
    /// Display name.
    pub name: String,
    /// Current health.
    pub health: u32,
    /// Health cap.
    pub max_health: u32,
    /// Current cell.
    pub position: Position,
    /// Whether the unit is bracing.
    pub defending: bool,
    /// Whether the unit has been defeated.
    pub defeated: bool,
}

impl From<&Unit> for UnitView {
    fn from(unit: &Unit) -> Self {
        Self {
            unit_id: unit.unit_id.clone(),
            team_id: unit.team_id.clone(),
            name: unit.name.clone(),
            health: unit.health,
            max_health: unit.max_health,
            position: unit.position,
            defending: unit.defending,
            defeated: unit.defeated,
        }
    }
}

/// Read-only view of a combat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombatView {
    /// The combat identifier.
    pub combat_id: String,
    /// Lifecycle stage as a string.
    pub lifecycle: String,
    /// Current version (event count).
    pub version: i64,
    /// Grid dimensions, once started.
    pub grid: Option<GridSize>,
    /// Current turn number.
    pub turn: u32,
    /// Unit whose turn it is.
    pub active_unit_id: Option<String>,
    /// Whether the active unit has acted this turn.
    pub acted_this_turn: bool,
    /// Participating teams.
    pub teams: Vec<String>,
    /// Units in initiative order.
    pub units: Vec<UnitView>,
    /// Winning team, once terminated.
    pub victor_team_id: Option<String>,
    /// Why the combat ended, once terminated.
    pub termination_reason: Option<String>,
}

impl From<&Combat> for CombatView {
    fn from(combat: &Combat) -> Self {
        let state = combat.state();
        Self {
            combat_id: combat.aggregate_id().to_string(),
            lifecycle: state.lifecycle.as_str().to_owned(),
            version: combat.version(),
            grid: state.grid,
            turn: state.turn,
            active_unit_id: state.active_unit_id.clone(),
            acted_this_turn: state.acted_this_turn,
            teams: state.teams.clone(),
            units: state.units_in_turn_order().map(UnitView::from).collect(),
            victor_team_id: state.victor_team_id.clone(),
            termination_reason: state.termination_reason.clone(),
        }
    }
}

impl CombatService {
    /// Retrieves a combat by id.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` if no events exist for the id,
    /// `DomainError::Reconstruction` if the history does not fold, and
    /// repository errors.
    #[instrument(skip(self))]
    pub async fn get_combat(&self, combat_id: &AggregateId) -> Result<CombatView, DomainError> {
        let combat = load_combat(
            self.repo.as_ref(),
            combat_id,
            self.snapshot_policy.is_enabled(),
        )
        .await?;
        if combat.version() == 0 {
            return Err(DomainError::AggregateNotFound(combat_id.clone()));
        }
        Ok(CombatView::from(&combat))
    }

    /// Returns the combat's committed events in version order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` if no events exist for the id,
    /// and repository errors.
    #[instrument(skip(self))]
    pub async fn history(&self, combat_id: &AggregateId) -> Result<Vec<StoredEvent>, DomainError> {
        let events = self.repo.load_events(combat_id).await?;
        if events.is_empty() {
            return Err(DomainError::AggregateNotFound(combat_id.clone()));
        }
        Ok(events)
    }
}
