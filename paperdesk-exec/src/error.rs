//! Execution layer error types.

use paperdesk_domain::Symbol;
use thiserror::Error;

/// Errors that can occur during execution operations.
#[derive(Debug, Error)]
pub enum ExecError {
    /// No usable quote (transient; retried, then skipped)
    #[error("Price unavailable for {symbol}: {reason}")]
    PriceUnavailable {
        /// Symbol that was quoted
        symbol: Symbol,
        /// Provider message
        reason: String,
    },

    /// Trade event sink write failed (best-effort, never rolls back a fill)
    #[error("Sink write error: {0}")]
    Sink(String),

    /// Engine error
    #[error("Engine error: {0}")]
    Engine(#[from] paperdesk_engine::EngineError),

    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] paperdesk_domain::DomainError),
}

impl ExecError {
    pub fn price_unavailable(symbol: &Symbol, reason: impl Into<String>) -> Self {
        ExecError::PriceUnavailable {
            symbol: symbol.clone(),
            reason: reason.into(),
        }
    }

    /// The engine error behind this failure, if any.
    pub fn as_engine(&self) -> Option<&paperdesk_engine::EngineError> {
        match self {
            ExecError::Engine(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for execution operations.
pub type ExecResult<T> = Result<T, ExecError>;
