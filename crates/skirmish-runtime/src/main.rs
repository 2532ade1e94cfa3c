//! `skirmish`: operator CLI for the combat event store.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use skirmish_core::id::AggregateId;
use skirmish_runtime::Runtime;
use skirmish_runtime::config::Config;
use skirmish_runtime::error::AppError;
use skirmish_runtime::telemetry;

/// Inspect and maintain combats stored by the Skirmish engine.
#[derive(Debug, Parser)]
#[command(name = "skirmish", version, propagate_version = true)]
struct Cli {
    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the current state of a combat as JSON.
    Show {
        /// Combat identifier.
        combat_id: AggregateId,
    },
    /// Print a combat's stored events in version order.
    History {
        /// Combat identifier.
        combat_id: AggregateId,
    },
    /// Write a snapshot of a combat at its current version.
    Snapshot {
        /// Combat identifier.
        combat_id: AggregateId,
    },
    /// Publish a combat's committed events to NATS again.
    Republish {
        /// Combat identifier.
        combat_id: AggregateId,
        /// First version to publish.
        #[arg(long, default_value_t = 1)]
        from: i64,
    },
    /// Apply pending database migrations.
    Migrate,
}

#[derive(Debug, Serialize)]
struct SnapshotSummary {
    combat_id: AggregateId,
    version: i64,
    taken_at: String,
}

#[derive(Debug, Serialize)]
struct RepublishSummary {
    combat_id: AggregateId,
    from_version: i64,
    published: usize,
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value).map_err(io::Error::from)?;
    writeln!(stdout)?;
    Ok(())
}

async fn execute(runtime: &Runtime, command: Commands) -> Result<(), AppError> {
    let service = runtime.service();
    match command {
        Commands::Show { combat_id } => {
            let view = runtime.run(service.get_combat(&combat_id)).await?;
            print_json(&view)
        }
        Commands::History { combat_id } => {
            let events = runtime.run(service.history(&combat_id)).await?;
            print_json(&events)
        }
        Commands::Snapshot { combat_id } => {
            let snapshot = runtime.run(service.take_snapshot(&combat_id)).await?;
            print_json(&SnapshotSummary {
                combat_id,
                version: snapshot.aggregate_version,
                taken_at: snapshot.taken_at.to_rfc3339(),
            })
        }
        Commands::Republish { combat_id, from } => {
            let published = runtime.run(service.republish(&combat_id, from)).await?;
            print_json(&RepublishSummary {
                combat_id,
                from_version: from,
                published,
            })
        }
        Commands::Migrate => runtime.migrate().await,
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    // Only republishing talks to the broker.
    let runtime = if matches!(cli.command, Commands::Republish { .. }) {
        Runtime::open(&cli.config).await?
    } else {
        Runtime::open_read_only(&cli.config).await?
    };
    let result = execute(&runtime, cli.command).await;
    let closed = runtime.shutdown().await;
    result.and(closed)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let guard = match telemetry::init(cli.config.otlp_endpoint.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("skirmish: {e}");
            return ExitCode::from(e.exit_code());
        }
    };

    let result = run(cli).await;
    if let Err(e) = &result {
        tracing::error!(error = %e, "command failed");
    }
    if let Err(e) = guard.shutdown() {
        eprintln!("skirmish: {e}");
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("skirmish: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}
