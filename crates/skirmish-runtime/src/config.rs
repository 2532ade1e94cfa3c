//! Process configuration.
//!
//! Every setting has a command-line flag and an environment variable; the
//! flag wins when both are present.

use std::num::NonZeroU64;
use std::time::Duration;

use clap::Args;
use skirmish_combat::SnapshotPolicy;
use skirmish_messaging::NatsPublisherConfig;

use crate::error::AppError;

/// Connection and tuning settings for a `Runtime`.
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// PostgreSQL connection string.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    /// Upper bound on pooled database connections.
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 10)]
    pub database_max_connections: u32,

    /// NATS server URL.
    #[arg(long, env = "NATS_URL", default_value = "nats://127.0.0.1:4222")]
    pub nats_url: String,

    /// Subject prefix for published combat events.
    #[arg(long, env = "NATS_SUBJECT_PREFIX", default_value = "skirmish.combat")]
    pub nats_subject_prefix: String,

    /// `JetStream` stream capturing the subject prefix; created on open.
    #[arg(long, env = "NATS_STREAM", default_value = "SKIRMISH_COMBAT")]
    pub nats_stream: String,

    /// Seconds the stream remembers `Nats-Msg-Id` values for deduplication.
    #[arg(long, env = "NATS_DUPLICATE_WINDOW_SECS", default_value_t = 120)]
    pub nats_duplicate_window_secs: u64,

    /// Milliseconds to wait for a publish acknowledgement.
    #[arg(long, env = "PUBLISH_TIMEOUT_MS", default_value_t = 5_000)]
    pub publish_timeout_ms: u64,

    /// Snapshot every N events; unset disables snapshots.
    #[arg(long, env = "SNAPSHOT_INTERVAL")]
    pub snapshot_interval: Option<NonZeroU64>,

    /// Milliseconds an operator command may run before it is cancelled.
    #[arg(long, env = "COMMAND_TIMEOUT_MS", default_value_t = 10_000)]
    pub command_timeout_ms: u64,

    /// OTLP gRPC endpoint; unset disables trace export.
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,
}

impl Config {
    /// Rejects values that parse but cannot work.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the offending setting.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.database_url.trim().is_empty() {
            return Err(AppError::Config("DATABASE_URL must not be empty".into()));
        }
        if self.database_max_connections == 0 {
            return Err(AppError::Config(
                "DATABASE_MAX_CONNECTIONS must be at least 1".into(),
            ));
        }
        if self.nats_subject_prefix.trim().is_empty()
            || self.nats_subject_prefix.contains(['*', '>', ' '])
        {
            return Err(AppError::Config(format!(
                "NATS_SUBJECT_PREFIX {:?} is not a valid subject prefix",
                self.nats_subject_prefix
            )));
        }
        if self.nats_stream.trim().is_empty() || self.nats_stream.contains(['.', '*', '>', ' ']) {
            return Err(AppError::Config(format!(
                "NATS_STREAM {:?} is not a valid stream name",
                self.nats_stream
            )));
        }
        if self.nats_duplicate_window_secs == 0 {
            return Err(AppError::Config(
                "NATS_DUPLICATE_WINDOW_SECS must be positive".into(),
            ));
        }
        if self.publish_timeout_ms == 0 {
            return Err(AppError::Config("PUBLISH_TIMEOUT_MS must be positive".into()));
        }
        if self.command_timeout_ms == 0 {
            return Err(AppError::Config("COMMAND_TIMEOUT_MS must be positive".into()));
        }
        Ok(())
    }

    /// Time allowed for a single operator command.
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// How long the stream deduplicates republished events.
    #[must_use]
    pub fn duplicate_window(&self) -> Duration {
        Duration::from_secs(self.nats_duplicate_window_secs)
    }

    /// Settings for the NATS publisher.
    #[must_use]
    pub fn publisher(&self) -> NatsPublisherConfig {
        NatsPublisherConfig {
            subject_prefix: self.nats_subject_prefix.clone(),
            publish_timeout: Duration::from_millis(self.publish_timeout_ms),
        }
    }

    /// Snapshot policy for the combat service.
    #[must_use]
    pub fn snapshot_policy(&self) -> SnapshotPolicy {
        self.snapshot_interval
            .map_or_else(SnapshotPolicy::disabled, SnapshotPolicy::every)
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Debug, Parser)]
    struct Harness {
        #[command(flatten)]
        config: Config,
    }

    fn parse(extra: &[&str]) -> Result<Config, clap::Error> {
        let mut args = vec!["skirmish", "--database-url", "postgres://localhost/skirmish"];
        args.extend_from_slice(extra);
        Harness::try_parse_from(args).map(|h| h.config)
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = parse(&[
            "--database-max-connections",
            "4",
            "--publish-timeout-ms",
            "250",
            "--snapshot-interval",
            "50",
        ])
        .unwrap();

        assert_eq!(config.database_max_connections, 4);
        assert_eq!(config.publisher().publish_timeout, Duration::from_millis(250));
        assert_eq!(
            config.snapshot_policy(),
            SnapshotPolicy::every(NonZeroU64::new(50).unwrap())
        );
    }

    #[test]
    fn test_zero_snapshot_interval_is_rejected_by_parser() {
        assert!(parse(&["--snapshot-interval", "0"]).is_err());
    }

    #[test]
    fn test_non_numeric_timeout_is_rejected_by_parser() {
        assert!(parse(&["--command-timeout-ms", "soon"]).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_pool_size() {
        let config = parse(&["--database-max-connections", "0"]).unwrap();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_wildcard_subject_prefix() {
        let config = parse(&["--nats-subject-prefix", "skirmish.>"]).unwrap();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_dotted_stream_name() {
        let config = parse(&["--nats-stream", "skirmish.combat"]).unwrap();
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_duplicate_window_defaults_to_two_minutes() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.duplicate_window(), Duration::from_secs(120));
    }

    #[test]
    fn test_command_timeout_converts_milliseconds() {
        let config = parse(&["--command-timeout-ms", "1500"]).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.command_timeout(), Duration::from_millis(1500));
    }
}
