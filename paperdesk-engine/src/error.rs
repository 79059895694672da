//! Engine error types.

use paperdesk_domain::{DomainError, PositionId, Symbol};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors returned by the ledger and the order state machine.
///
/// Every variant is an expected outcome handed back to the caller; the book is
/// left untouched whenever one is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Bad quantity, price, side or configuration
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not enough buying power to carry the order
    #[error("Insufficient margin: required {required}, available {available}")]
    InsufficientMargin {
        /// Amount that had to fit
        required: Decimal,
        /// Buying power at the time of the check
        available: Decimal,
    },

    /// Exit price matches a known provider fallback value
    #[error("Suspect price {price} for {symbol} (entry {entry}), close rejected")]
    SuspectPrice {
        /// Symbol being closed
        symbol: Symbol,
        /// The rejected quote
        price: Decimal,
        /// Average entry of the position
        entry: Decimal,
    },

    /// Close requested for a symbol with no open position
    #[error("No open position for {0}")]
    NoOpenPosition(Symbol),

    /// The position was replaced between observation and close
    #[error("Position for {symbol} changed: expected {expected}, found {actual}")]
    PositionChanged {
        /// Symbol being closed
        symbol: Symbol,
        /// Position id the caller observed
        expected: PositionId,
        /// Position id currently open
        actual: PositionId,
    },

    /// Internal bookkeeping invariant broken
    #[error("Ledger invariant violated: {0}")]
    InvariantViolation(String),

    /// Domain error passthrough
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl EngineError {
    /// Whether this error means "someone else already closed it".
    pub fn is_stale_close(&self) -> bool {
        matches!(self, EngineError::NoOpenPosition(_) | EngineError::PositionChanged { .. })
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
