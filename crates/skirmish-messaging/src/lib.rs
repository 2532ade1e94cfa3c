//! Skirmish messaging: broker adapters for `EventPublisher`.

pub mod nats_event_publisher;

pub use nats_event_publisher::{NatsEventPublisher, NatsPublisherConfig};
