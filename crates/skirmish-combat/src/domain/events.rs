//! Domain events for the Combat context.
//!
//! `CombatEventKind` is the closed set of combat transitions. Its serde
//! representation is adjacently tagged on `event_type`/`payload`, and the
//! per-variant `rename` binds each tag to its payload shape for both encoding
//! and [`CombatEventKind::decode`]. [`CombatEventKind::TAGS`] repeats those
//! strings so [`CombatEventKind::tag`] can hand out `&'static str`; the tests
//! hold the two in step.

use serde::{Deserialize, Serialize};
use skirmish_core::error::DomainError;
use skirmish_core::event::{DomainEvent, EventMetadata};

/// Width and height of the combat grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
    /// Number of columns.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
}

impl GridSize {
    /// Returns `true` if `position` lies on the grid.
    #[must_use]
    pub fn contains(&self, position: Position) -> bool {
        position.x < self.width && position.y < self.height
    }
}

/// A cell on the combat grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Column, zero-based.
    pub x: u32,
    /// Row, zero-based.
    pub y: u32,
}

/// A unit entering combat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitSpec {
    /// Unit identifier, unique within the combat.
    pub unit_id: String,
    /// Display name.
    pub name: String,
    /// Starting and maximum health.
    pub max_health: u32,
    /// Starting cell.
    pub position: Position,
}

/// One side of the combat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    /// Team identifier, unique within the combat.
    pub team_id: String,
    /// Units fielded by the team.
    pub units: Vec<UnitSpec>,
}

/// What a unit does on its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    /// Strike an opposing unit for a pre-computed amount of damage.
    Attack {
        /// Damage dealt.
        damage: u32,
    },
    /// Restore health to an allied unit, capped at its maximum.
    Heal {
        /// Health restored.
        amount: u32,
    },
    /// Move to another cell.
    Move {
        /// Destination.
        to: Position,
    },
    /// Brace until the unit's next turn.
    Defend,
}

impl ActionKind {
    /// Short name used in logs and views.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Attack { .. } => "attack",
            Self::Heal { .. } => "heal",
            Self::Move { .. } => "move",
            Self::Defend => "defend",
        }
    }
}

/// Emitted when a combat begins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatStarted {
    /// Grid dimensions.
    pub grid: GridSize,
    /// Participating teams, at least two.
    pub rosters: Vec<Roster>,
    /// Unit ids in initiative order; the first acts on turn 1.
    pub turn_order: Vec<String>,
}

/// Emitted when the active unit performs an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionExecuted {
    /// The acting unit.
    pub actor_id: String,
    /// The unit acted upon, if any.
    pub target_id: Option<String>,
    /// The action performed.
    pub action: ActionKind,
}

/// Emitted when a unit takes damage from a source that is not a unit's
/// action (hazards, lingering effects).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageApplied {
    /// The damaged unit.
    pub target_id: String,
    /// Damage dealt.
    pub amount: u32,
    /// Free-form description of the source.
    pub source: String,
}

/// Emitted when a unit's health reaches zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDefeated {
    /// The defeated unit.
    pub unit_id: String,
}

/// Emitted when the turn passes to the next living unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnAdvanced {
    /// The new turn number.
    pub turn: u32,
    /// The unit whose turn it now is.
    pub active_unit_id: String,
}

/// Emitted when a combat ends. No event may follow it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatTerminated {
    /// Winning team, if the combat had one.
    pub victor_team_id: Option<String>,
    /// Why the combat ended.
    pub reason: String,
}

/// Event payload variants for the Combat context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "payload")]
pub enum CombatEventKind {
    /// A combat has begun.
    #[serde(rename = "combat.started")]
    CombatStarted(CombatStarted),
    /// A unit acted.
    #[serde(rename = "combat.action_executed")]
    ActionExecuted(ActionExecuted),
    /// A unit took non-action damage.
    #[serde(rename = "combat.damage_applied")]
    DamageApplied(DamageApplied),
    /// A unit was defeated.
    #[serde(rename = "combat.unit_defeated")]
    UnitDefeated(UnitDefeated),
    /// The turn advanced.
    #[serde(rename = "combat.turn_advanced")]
    TurnAdvanced(TurnAdvanced),
    /// The combat ended.
    #[serde(rename = "combat.terminated")]
    CombatTerminated(CombatTerminated),
}

impl CombatEventKind {
    /// Every tag in the closed set, in variant order. Must equal the serde
    /// renames above.
    pub const TAGS: [&'static str; 6] = [
        "combat.started",
        "combat.action_executed",
        "combat.damage_applied",
        "combat.unit_defeated",
        "combat.turn_advanced",
        "combat.terminated",
    ];

    /// The type tag for this variant.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::CombatStarted(_) => Self::TAGS[0],
            Self::ActionExecuted(_) => Self::TAGS[1],
            Self::DamageApplied(_) => Self::TAGS[2],
            Self::UnitDefeated(_) => Self::TAGS[3],
            Self::TurnAdvanced(_) => Self::TAGS[4],
            Self::CombatTerminated(_) => Self::TAGS[5],
        }
    }

    /// Serializes the variant's payload without the tag.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error.
    pub fn payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::CombatStarted(p) => serde_json::to_value(p),
            Self::ActionExecuted(p) => serde_json::to_value(p),
            Self::DamageApplied(p) => serde_json::to_value(p),
            Self::UnitDefeated(p) => serde_json::to_value(p),
            Self::TurnAdvanced(p) => serde_json::to_value(p),
            Self::CombatTerminated(p) => serde_json::to_value(p),
        }
    }

    /// Rebuilds a variant from its stored tag and payload.
    ///
    /// # Errors
    ///
    /// Fails for an unknown tag or a payload that does not match the tag's
    /// shape.
    pub fn decode(
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::json!({
            "event_type": event_type,
            "payload": payload,
        }))
    }
}

/// Domain event envelope for the Combat context.
#[derive(Debug, Clone, PartialEq)]
pub struct CombatEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: CombatEventKind,
}

impl DomainEvent for CombatEvent {
    fn event_type(&self) -> &'static str {
        self.kind.tag()
    }

    fn to_payload(&self) -> Result<serde_json::Value, DomainError> {
        self.kind.payload().map_err(|e| {
            DomainError::Infrastructure(format!(
                "cannot serialize {} payload: {e}",
                self.kind.tag()
            ))
        })
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
