//! Skirmish: event-sourced Combat bounded context.
//!
//! A combat is an aggregate whose state is the fold of its event stream.
//! `CombatService` runs commands against it: it rebuilds the combat (from a
//! snapshot when one exists), lets the domain decide, appends the resulting
//! events under optimistic concurrency, and then publishes them.

pub mod application;
pub mod domain;

pub use application::command_handlers::{CombatService, CommandOutcome, SnapshotPolicy};
pub use application::query_handlers::{CombatView, UnitView};
