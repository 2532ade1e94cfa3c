//! Shared test mocks and utilities for the Skirmish combat engine.

mod clock;
mod publisher;
mod repository;

pub use clock::{FixedClock, fixed_time};
pub use publisher::{FailingEventPublisher, RecordingEventPublisher};
pub use repository::{EmptyEventRepository, FailingEventRepository, RecordingEventRepository};
