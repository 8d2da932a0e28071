//! Ambient configuration layer (§4.J). `EngineSettings` merges environment
//! variables with CLI overrides the same way the reference engine's
//! `SimulationConfig` is built: defaults first, environment next, explicit
//! flags last.

use crate::error::EngineError;

const DEFAULT_CHANNEL: &str = "atc:events";
const DEFAULT_SPAWN_CHANNEL: &str = "aircraft.created";
const DEFAULT_TELEMETRY_DIR: &str = "./telemetry";
const DEFAULT_TICK_RATE_HZ: f64 = 1.0;
const DEFAULT_STORE_MAX_CONNECTIONS: u32 = 200;
const DEFAULT_CALL_TIMEOUT_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub database_url: String,
    pub redis_url: String,
    pub event_channel: String,
    pub spawn_channel: String,
    pub airspace_config_path: String,
    pub telemetry_dir: String,
    pub tick_rate_hz: f64,
    pub seed: u64,
    pub duration_secs: Option<u64>,
    pub store_max_connections: u32,
    pub call_timeout_ms: u64,
}

impl EngineSettings {
    /// Builds settings from environment variables, then applies CLI
    /// overrides supplied on top (§6's configuration-inputs list).
    pub fn load(cli: &CliOverrides) -> Result<Self, EngineError> {
        let database_url = require_env("ARRIVAL_ENGINE_DATABASE_URL")?;
        let redis_url = require_env("ARRIVAL_ENGINE_REDIS_URL")?;

        let event_channel = std::env::var("ARRIVAL_ENGINE_EVENT_CHANNEL")
            .unwrap_or_else(|_| DEFAULT_CHANNEL.to_string());
        let spawn_channel = std::env::var("ARRIVAL_ENGINE_SPAWN_CHANNEL")
            .unwrap_or_else(|_| DEFAULT_SPAWN_CHANNEL.to_string());
        let telemetry_dir = std::env::var("ARRIVAL_ENGINE_TELEMETRY_DIR")
            .unwrap_or_else(|_| DEFAULT_TELEMETRY_DIR.to_string());
        let tick_rate_hz = std::env::var("ARRIVAL_ENGINE_TICK_RATE_HZ")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TICK_RATE_HZ);
        let store_max_connections = std::env::var("ARRIVAL_ENGINE_STORE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_STORE_MAX_CONNECTIONS);
        let call_timeout_ms = std::env::var("ARRIVAL_ENGINE_CALL_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_CALL_TIMEOUT_MS);
        let env_seed = std::env::var("ARRIVAL_ENGINE_SEED").ok().and_then(|v| v.parse().ok());

        let airspace_config_path = cli
            .config_path
            .clone()
            .or_else(|| std::env::var("ARRIVAL_ENGINE_AIRSPACE_CONFIG").ok())
            .ok_or_else(|| EngineError::Config("no airspace config path given (--config or ARRIVAL_ENGINE_AIRSPACE_CONFIG)".into()))?;

        let seed = cli.seed.or(env_seed).unwrap_or_else(default_seed);

        Ok(Self {
            database_url,
            redis_url,
            event_channel,
            spawn_channel,
            airspace_config_path,
            telemetry_dir,
            tick_rate_hz,
            seed,
            duration_secs: cli.duration_secs,
            store_max_connections,
            call_timeout_ms,
        })
    }
}

/// A fixed fallback rather than a time-seeded one: an engine started with no
/// explicit seed and no `ARRIVAL_ENGINE_SEED` should still be reproducible
/// run-to-run, matching P5's determinism requirement.
fn default_seed() -> u64 {
    0
}

fn require_env(key: &str) -> Result<String, EngineError> {
    std::env::var(key).map_err(|_| EngineError::Config(format!("missing required environment variable {key}")))
}

/// CLI-supplied values that, when present, win over environment defaults.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<String>,
    pub seed: Option<u64>,
    pub duration_secs: Option<u64>,
}
