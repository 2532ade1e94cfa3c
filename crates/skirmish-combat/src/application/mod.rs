//! Application layer: replay, command pipeline, and read views.

pub mod command_handlers;
pub mod query_handlers;
pub mod replay;
