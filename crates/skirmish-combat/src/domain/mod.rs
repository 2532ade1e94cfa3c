//! Combat domain: events, the `Combat` aggregate, and commands.

pub mod aggregates;
pub mod commands;
pub mod events;
