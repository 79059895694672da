//! Daemon error types.

use paperdesk_domain::DomainError;
use paperdesk_engine::EngineError;
use paperdesk_exec::ExecError;
use paperdesk_store::StoreError;
use thiserror::Error;

/// Daemon-level errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Engine error
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Execution error
    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),

    /// Store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Monitor already running
    #[error("Monitor is already running")]
    MonitorAlreadyRunning,

    /// Operation not allowed while the monitor runs
    #[error("Monitor is running: {0}")]
    MonitorRunning(String),

    /// Monitor did not stop in time
    #[error("Monitor did not stop within {0:?}")]
    MonitorJoinTimeout(std::time::Duration),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Shutdown requested
    #[error("Shutdown requested")]
    Shutdown,
}

impl DaemonError {
    /// The engine error behind this failure, looking through execution errors.
    pub fn engine_error(&self) -> Option<&EngineError> {
        match self {
            DaemonError::Engine(e) => Some(e),
            DaemonError::Exec(e) => e.as_engine(),
            _ => None,
        }
    }

    /// Whether the failure was an unavailable price.
    pub fn is_price_unavailable(&self) -> bool {
        matches!(self, DaemonError::Exec(ExecError::PriceUnavailable { .. }))
    }
}

/// Result type for daemon operations.
pub type DaemonResult<T> = Result<T, DaemonError>;
