use thiserror::Error;

/// Error kinds emitted by the engine, mirroring the recovery policy: Transient
/// kinds are logged and the current operation is skipped, Fatal kinds stop the
/// process with a distinct exit code.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("store transient failure: {0}")]
    StoreTransient(String),

    #[error("store fatal failure: {0}")]
    StoreFatal(String),

    #[error("publish transient failure: {0}")]
    PublishTransient(String),

    #[error("invalid flight state (id={flight_id}): {reason}")]
    InvalidState { flight_id: i64, reason: String },

    #[error("tick overrun: {elapsed_ms}ms")]
    TickOverrun { elapsed_ms: u64 },
}

impl EngineError {
    /// Process exit code this error maps to when it is the reason the engine stops.
    /// Transient kinds never reach `main` as a process-ending error; this is only
    /// meaningful for Config/StoreFatal.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::Config(_) => 1,
            EngineError::StoreFatal(_) => 2,
            _ => 0,
        }
    }
}
