//! Skirmish event store: persistence adapters for `EventRepository`.

pub mod in_memory_event_repository;
pub mod pg_event_repository;
pub mod schema;

pub use in_memory_event_repository::InMemoryEventRepository;
pub use pg_event_repository::PgEventRepository;
