//! Skirmish runtime: wires the event store, the publisher, and the combat
//! service into a process with an explicit open/shutdown lifecycle.

pub mod config;
pub mod error;
pub mod telemetry;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use skirmish_combat::CombatService;
use skirmish_core::clock::SystemClock;
use skirmish_core::error::DomainError;
use skirmish_core::publisher::NoopEventPublisher;
use skirmish_event_store::PgEventRepository;
use skirmish_messaging::NatsEventPublisher;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::config::Config;
use crate::error::AppError;

/// Runs `operation`, cancelling it once `limit` elapses.
///
/// # Errors
///
/// Returns `AppError::Timeout` when the limit is hit and `AppError::Domain`
/// when the operation fails.
pub async fn with_timeout<T, F>(limit: Duration, operation: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, DomainError>>,
{
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| AppError::Timeout(limit))?
        .map_err(AppError::Domain)
}

/// Open handles to the store and the broker plus the service built on them.
#[derive(Debug)]
pub struct Runtime {
    pool: PgPool,
    nats: Option<async_nats::Client>,
    service: CombatService,
    command_timeout: Duration,
}

async fn connect_pool(config: &Config) -> Result<PgPool, AppError> {
    config.validate()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    Ok(pool)
}

impl Runtime {
    /// Connects to PostgreSQL and NATS, makes sure the event stream exists,
    /// and builds the combat service.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for invalid settings, `AppError::Database`
    /// if the pool cannot connect, and `AppError::Messaging` if NATS is
    /// unreachable or the stream cannot be created.
    pub async fn open(config: &Config) -> Result<Self, AppError> {
        let pool = connect_pool(config).await?;
        let nats = async_nats::connect(config.nats_url.as_str())
            .await
            .map_err(|e| AppError::Messaging(format!("cannot connect to {}: {e}", config.nats_url)))?;

        let publisher = NatsEventPublisher::new(nats.clone(), config.publisher());
        publisher
            .ensure_stream(&config.nats_stream, config.duplicate_window())
            .await
            .map_err(|e| AppError::Messaging(e.to_string()))?;

        let service = CombatService::new(
            Arc::new(PgEventRepository::new(pool.clone())),
            Arc::new(publisher),
            Arc::new(SystemClock),
        )
        .with_snapshot_policy(config.snapshot_policy());

        info!(
            max_connections = config.database_max_connections,
            nats_url = %config.nats_url,
            stream = %config.nats_stream,
            subject_prefix = %config.nats_subject_prefix,
            snapshot_interval = config.snapshot_interval.map(std::num::NonZeroU64::get),
            "runtime opened"
        );

        Ok(Self {
            pool,
            nats: Some(nats),
            service,
            command_timeout: config.command_timeout(),
        })
    }

    /// Connects to PostgreSQL only. Events produced through this runtime's
    /// service are stored but never published.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for invalid settings and
    /// `AppError::Database` if the pool cannot connect.
    pub async fn open_read_only(config: &Config) -> Result<Self, AppError> {
        let pool = connect_pool(config).await?;
        let service = CombatService::new(
            Arc::new(PgEventRepository::new(pool.clone())),
            Arc::new(NoopEventPublisher),
            Arc::new(SystemClock),
        )
        .with_snapshot_policy(config.snapshot_policy());

        info!(
            max_connections = config.database_max_connections,
            "runtime opened without publisher"
        );

        Ok(Self {
            pool,
            nats: None,
            service,
            command_timeout: config.command_timeout(),
        })
    }

    /// The combat service backed by this runtime's handles.
    #[must_use]
    pub fn service(&self) -> &CombatService {
        &self.service
    }

    /// Applies pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` if a migration fails.
    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(sqlx::Error::from)?;
        info!("migrations applied");
        Ok(())
    }

    /// Runs a service operation under the configured command timeout.
    ///
    /// # Errors
    ///
    /// See [`with_timeout`].
    pub async fn run<T, F>(&self, operation: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, DomainError>>,
    {
        with_timeout(self.command_timeout, operation).await
    }

    /// Flushes pending NATS messages, if connected, and closes the pool.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Messaging` if the flush fails; the pool is closed
    /// regardless.
    pub async fn shutdown(self) -> Result<(), AppError> {
        let flushed = match &self.nats {
            Some(nats) => nats
                .flush()
                .await
                .map_err(|e| AppError::Messaging(format!("flush failed: {e}"))),
            None => Ok(()),
        };
        self.pool.close().await;
        info!("runtime closed");
        flushed
    }
}
