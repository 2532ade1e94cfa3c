//! Skirmish Core: shared event-sourcing abstractions.
//!
//! This crate defines the fundamental traits and types that the combat
//! bounded context and the infrastructure adapters depend on. It contains no
//! infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod id;
pub mod publisher;
pub mod repository;
