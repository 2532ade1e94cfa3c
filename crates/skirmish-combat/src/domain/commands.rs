//! Commands for the Combat context.
//!
//! `validate` covers what can be judged from the command alone; everything
//! that depends on the combat's state is checked by the aggregate.

use skirmish_core::command::Command;
use skirmish_core::error::DomainError;
use skirmish_core::id::AggregateId;
use uuid::Uuid;

use super::aggregates::validate_setup;
use super::events::{ActionKind, GridSize, Roster};

fn require_text(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::Validation(format!("{field} must not be blank")));
    }
    Ok(())
}

/// Command to start a new combat.
#[derive(Debug, Clone)]
pub struct StartCombat {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The combat to create.
    pub combat_id: AggregateId,
    /// Grid dimensions.
    pub grid: GridSize,
    /// Participating teams.
    pub rosters: Vec<Roster>,
}

impl Command for StartCombat {
    fn command_type(&self) -> &'static str {
        "combat.start_combat"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> &AggregateId {
        &self.combat_id
    }

    fn validate(&self) -> Result<(), DomainError> {
        validate_setup(self.grid, &self.rosters)
    }
}

/// Command for the active unit to act.
#[derive(Debug, Clone)]
pub struct ExecuteAction {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The combat to act in.
    pub combat_id: AggregateId,
    /// The acting unit.
    pub actor_id: String,
    /// The unit acted upon, for attacks and heals.
    pub target_id: Option<String>,
    /// The action to perform.
    pub action: ActionKind,
}

impl Command for ExecuteAction {
    fn command_type(&self) -> &'static str {
        "combat.execute_action"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> &AggregateId {
        &self.combat_id
    }

    fn validate(&self) -> Result<(), DomainError> {
        require_text("actor id", &self.actor_id)?;
        let needs_target = match self.action {
            ActionKind::Attack { damage: 0 } | ActionKind::Heal { amount: 0 } => {
                return Err(DomainError::Validation(format!(
                    "{} amount must be positive",
                    self.action.name()
                )));
            }
            ActionKind::Attack { .. } | ActionKind::Heal { .. } => true,
            ActionKind::Move { .. } | ActionKind::Defend => false,
        };
        match (&self.target_id, needs_target) {
            (Some(target), true) => require_text("target id", target),
            (None, true) => Err(DomainError::Validation(format!(
                "{} needs a target",
                self.action.name()
            ))),
            (Some(_), false) => Err(DomainError::Validation(format!(
                "{} takes no target",
                self.action.name()
            ))),
            (None, false) => Ok(()),
        }
    }
}

/// Command to damage a unit outside the turn structure.
#[derive(Debug, Clone)]
pub struct ApplyDamage {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The combat the unit fights in.
    pub combat_id: AggregateId,
    /// The damaged unit.
    pub target_id: String,
    /// Damage dealt.
    pub amount: u32,
    /// What caused the damage.
    pub source: String,
}

impl Command for ApplyDamage {
    fn command_type(&self) -> &'static str {
        "combat.apply_damage"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> &AggregateId {
        &self.combat_id
    }

    fn validate(&self) -> Result<(), DomainError> {
        require_text("target id", &self.target_id)?;
        require_text("damage source", &self.source)?;
        if self.amount == 0 {
            return Err(DomainError::Validation("damage must be positive".into()));
        }
        Ok(())
    }
}

/// Command to pass the turn.
#[derive(Debug, Clone)]
pub struct AdvanceTurn {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The combat to advance.
    pub combat_id: AggregateId,
}

impl Command for AdvanceTurn {
    fn command_type(&self) -> &'static str {
        "combat.advance_turn"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> &AggregateId {
        &self.combat_id
    }
}

/// Command to end a combat.
#[derive(Debug, Clone)]
pub struct TerminateCombat {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The combat to end.
    pub combat_id: AggregateId,
    /// Winning team, if any.
    pub victor_team_id: Option<String>,
    /// Why the combat ended.
    pub reason: String,
}

impl Command for TerminateCombat {
    fn command_type(&self) -> &'static str {
        "combat.terminate_combat"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn aggregate_id(&self) -> &AggregateId {
        &self.combat_id
    }

    fn validate(&self) -> Result<(), DomainError> {
        if let Some(victor) = &self.victor_team_id {
            require_text("victor team id", victor)?;
        }
        require_text("termination reason", &self.reason)
    }
}
