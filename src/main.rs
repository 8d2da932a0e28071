use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use arrival_engine::airspace::AirspaceConfig;
use arrival_engine::config::{CliOverrides, EngineSettings};
use arrival_engine::error::EngineError;
use arrival_engine::publisher::{EventPublisher, RedisEventPublisher};
use arrival_engine::scheduler::Scheduler;
use arrival_engine::store::{PgStateStore, StateStore};
use arrival_engine::telemetry::TelemetrySink;

#[derive(Parser, Debug)]
#[command(name = "arrival-engine", about = "Deterministic single-airport arrival simulation engine")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Starts the engine's tick loop (the default command).
    Start {
        /// Bound the run to this many simulated seconds; omit to run until shutdown.
        #[arg(long)]
        duration: Option<u64>,
        /// Override the PRNG seed for this run.
        #[arg(long)]
        seed: Option<u64>,
        /// Path to the airspace configuration JSON (§6).
        #[arg(long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let exit_code = run().await;
    std::process::exit(exit_code);
}

async fn run() -> i32 {
    let cli = Cli::parse();
    let Commands::Start { duration, seed, config } = cli.command.unwrap_or(Commands::Start {
        duration: None,
        seed: None,
        config: None,
    });

    let overrides = CliOverrides {
        config_path: config,
        seed,
        duration_secs: duration,
    };

    match run_engine(overrides).await {
        Ok(()) => 0,
        Err(e) => {
            error!(target: "MAIN", error = %e, "engine stopped with an error");
            e.exit_code().max(1)
        }
    }
}

async fn run_engine(overrides: CliOverrides) -> Result<(), EngineError> {
    let settings = EngineSettings::load(&overrides)?;
    info!(target: "MAIN", seed = settings.seed, duration = ?settings.duration_secs, "starting engine");

    let airspace = AirspaceConfig::load(&settings.airspace_config_path)
        .map_err(|e| EngineError::Config(e.to_string()))?;

    let store: Arc<dyn StateStore> =
        Arc::new(PgStateStore::connect(&settings.database_url, settings.store_max_connections).await?);
    let publisher: Arc<dyn EventPublisher> =
        Arc::new(RedisEventPublisher::connect(&settings.redis_url, settings.event_channel.clone()).await?);
    let telemetry = TelemetrySink::open(&settings.telemetry_dir, chrono::Utc::now(), 100)?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let ctrlc_tx = shutdown_tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(true);
    })
    .map_err(|e| EngineError::Config(format!("failed to install signal handler: {e}")))?;

    let spawn_store = store.clone();
    let spawn_shutdown = shutdown_rx.clone();
    let spawn_redis_url = settings.redis_url.clone();
    let spawn_task = tokio::spawn(arrival_engine::spawn_listener::run(spawn_redis_url, spawn_store, spawn_shutdown));

    let mut scheduler = Scheduler::new(store, publisher, airspace, telemetry, settings.seed);
    let result = scheduler.run(settings.duration_secs, shutdown_rx).await;

    let _ = shutdown_tx.send(true);
    let _ = spawn_task.await;

    result
}
