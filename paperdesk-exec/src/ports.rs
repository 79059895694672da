//! Execution layer port definitions.
//!
//! Ports define the interfaces for external collaborators (price feed, trade
//! log, wall clock). Adapters implement these ports for specific services
//! (broker quote API, stub, event bus, etc.).

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveTime, Utc};

use paperdesk_domain::{Price, Symbol, TradeEvent};

use crate::error::ExecError;

// =============================================================================
// Price Source
// =============================================================================

/// Port for last-traded-price lookups.
///
/// Implementations:
/// - `StubPriceSource` - For testing (configurable prices and failures)
///
/// An implementation must return `ExecError::PriceUnavailable` when it has no
/// quote. It must never hand back a zero or placeholder price in its place.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Get the current price for a symbol.
    async fn get_price(&self, symbol: &Symbol) -> Result<Price, ExecError>;
}

// =============================================================================
// Trade Event Sink
// =============================================================================

/// Port for the durable trade log.
///
/// Writes are best-effort: the executor logs a failure and moves on, the fill
/// that produced the event stays committed.
#[async_trait]
pub trait TradeEventSink: Send + Sync {
    /// Record one trade event.
    async fn record(&self, event: &TradeEvent) -> Result<(), ExecError>;
}

/// Sink that drops every event.
pub struct NullSink;

#[async_trait]
impl TradeEventSink for NullSink {
    async fn record(&self, _event: &TradeEvent) -> Result<(), ExecError> {
        Ok(())
    }
}

// =============================================================================
// Clock
// =============================================================================

/// Port for wall-clock time.
///
/// The session schedule is expressed in local time of day, fills are stamped
/// in UTC.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;

    /// Current local time of day.
    fn local_time(&self) -> NaiveTime;
}

/// The host's clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_time(&self) -> NaiveTime {
        Local::now().time()
    }
}
