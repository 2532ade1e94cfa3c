//! Test publishers: mock `EventPublisher` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use skirmish_core::error::DomainError;
use skirmish_core::publisher::{EventEnvelope, EventPublisher};
use skirmish_core::repository::StoredEvent;

/// A publisher that records the envelope of every published event.
#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    published: Mutex<Vec<EventEnvelope>>,
}

impl RecordingEventPublisher {
    /// Create an empty recording publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every published envelope, in publish order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<EventEnvelope> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(&self, event: &StoredEvent) -> Result<(), DomainError> {
        self.published
            .lock()
            .unwrap()
            .push(EventEnvelope::from(event));
        Ok(())
    }
}

/// A publisher that fails its first `failures` calls and records the rest.
/// `FailingEventPublisher::always()` never succeeds.
#[derive(Debug)]
pub struct FailingEventPublisher {
    remaining_failures: Mutex<usize>,
    attempts: Mutex<usize>,
    delivered: RecordingEventPublisher,
}

impl FailingEventPublisher {
    /// Fail the first `failures` publish calls.
    #[must_use]
    pub fn first(failures: usize) -> Self {
        Self {
            remaining_failures: Mutex::new(failures),
            attempts: Mutex::new(0),
            delivered: RecordingEventPublisher::new(),
        }
    }

    /// Fail every publish call.
    #[must_use]
    pub fn always() -> Self {
        Self::first(usize::MAX)
    }

    /// Number of publish calls made, failed or not.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }

    /// Envelopes that were delivered after the failures ran out.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn delivered(&self) -> Vec<EventEnvelope> {
        self.delivered.published()
    }
}

#[async_trait]
impl EventPublisher for FailingEventPublisher {
    async fn publish(&self, event: &StoredEvent) -> Result<(), DomainError> {
        *self.attempts.lock().unwrap() += 1;
        {
            let mut remaining = self.remaining_failures.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(DomainError::Publish("broker unavailable".into()));
            }
        }
        self.delivered.publish(event).await
    }
}
