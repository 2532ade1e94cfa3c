//! NATS `JetStream` implementation of the `EventPublisher` trait.
//!
//! Each aggregate publishes on its own subject, `{prefix}.{aggregate_id}`, so
//! a consumer reading that subject observes the aggregate's events in
//! emission order. Messages carry the `Nats-Msg-Id` header set to
//! `{aggregate_id}:{aggregate_version}`, which lets the stream drop
//! redeliveries inside its duplicate window.

use std::time::Duration;

use async_nats::HeaderMap;
use async_nats::jetstream::{self, context::PublishAckFuture, stream};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, instrument, warn};

use skirmish_core::error::DomainError;
use skirmish_core::id::AggregateId;
use skirmish_core::publisher::{EventEnvelope, EventPublisher};
use skirmish_core::repository::StoredEvent;

/// Default subject prefix for combat events.
pub const DEFAULT_SUBJECT_PREFIX: &str = "skirmish.combat";

/// Default time to wait for a `JetStream` publish acknowledgement.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for [`NatsEventPublisher`].
#[derive(Debug, Clone)]
pub struct NatsPublisherConfig {
    /// Subject prefix; the aggregate id is appended as the last token.
    pub subject_prefix: String,
    /// Upper bound on waiting for the publish acknowledgement.
    pub publish_timeout: Duration,
}

impl Default for NatsPublisherConfig {
    fn default() -> Self {
        Self {
            subject_prefix: DEFAULT_SUBJECT_PREFIX.to_owned(),
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }
}

/// Subject carrying the events of one aggregate.
#[must_use]
pub fn subject_for(prefix: &str, aggregate_id: &AggregateId) -> String {
    format!("{prefix}.{aggregate_id}")
}

/// Headers forwarded with every event message.
#[must_use]
pub fn build_headers(envelope: &EventEnvelope) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in envelope.headers() {
        headers.insert(name, value.as_str());
    }
    headers.insert(
        async_nats::header::NATS_MESSAGE_ID,
        envelope.dedup_id().as_str(),
    );
    headers
}

/// Publishes persisted events to NATS `JetStream`.
#[derive(Debug, Clone)]
pub struct NatsEventPublisher {
    jetstream: jetstream::Context,
    config: NatsPublisherConfig,
}

impl NatsEventPublisher {
    /// Creates a publisher on top of an established NATS client.
    #[must_use]
    pub fn new(client: async_nats::Client, config: NatsPublisherConfig) -> Self {
        Self {
            jetstream: jetstream::new(client),
            config,
        }
    }

    /// Subject this publisher uses for `aggregate_id`.
    #[must_use]
    pub fn subject(&self, aggregate_id: &AggregateId) -> String {
        subject_for(&self.config.subject_prefix, aggregate_id)
    }

    /// Creates the backing stream if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Publish` if the stream cannot be created or
    /// fetched.
    pub async fn ensure_stream(
        &self,
        stream_name: &str,
        duplicate_window: Duration,
    ) -> Result<(), DomainError> {
        self.jetstream
            .get_or_create_stream(stream::Config {
                name: stream_name.to_owned(),
                subjects: vec![format!("{}.>", self.config.subject_prefix)],
                duplicate_window,
                ..Default::default()
            })
            .await
            .map_err(|e| DomainError::Publish(format!("stream {stream_name} unavailable: {e}")))?;
        Ok(())
    }

    async fn send(
        &self,
        subject: String,
        headers: HeaderMap,
        payload: Bytes,
    ) -> Result<jetstream::publish::PublishAck, DomainError> {
        let ack: PublishAckFuture = self
            .jetstream
            .publish_with_headers(subject, headers, payload)
            .await
            .map_err(|e| DomainError::Publish(e.to_string()))?;
        ack.await.map_err(|e| DomainError::Publish(e.to_string()))
    }
}

#[async_trait]
impl EventPublisher for NatsEventPublisher {
    #[instrument(
        skip(self, event),
        fields(
            aggregate_id = %event.aggregate_id,
            version = event.aggregate_version,
            event_type = %event.event_type
        )
    )]
    async fn publish(&self, event: &StoredEvent) -> Result<(), DomainError> {
        let envelope = EventEnvelope::from(event);
        let subject = self.subject(&envelope.aggregate_id);
        let headers = build_headers(&envelope);
        let payload = Bytes::from(envelope.to_json()?);

        let ack = tokio::time::timeout(
            self.config.publish_timeout,
            self.send(subject.clone(), headers, payload),
        )
        .await
        .map_err(|_| {
            DomainError::Publish(format!(
                "no acknowledgement for {subject} within {:?}",
                self.config.publish_timeout
            ))
        })??;

        if ack.duplicate {
            warn!(subject = %subject, "broker reported duplicate event");
        }
        debug!(
            subject = %subject,
            stream = %ack.stream,
            stream_sequence = ack.sequence,
            "event published"
        );
        Ok(())
    }
}
