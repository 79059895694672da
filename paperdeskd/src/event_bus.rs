//! Event bus for internal daemon communication.
//!
//! The event bus allows decoupled communication between:
//! - Executor → listeners (trade fills, via `BusSink`)
//! - Monitor → listeners (marks, exit triggers, square-off failures)
//! - Daemon → everything (shutdown)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use paperdesk_domain::{ExitReason, PositionId, Price, Symbol, TradeEvent};
use paperdesk_exec::{ExecError, TradeEventSink};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

// =============================================================================
// Event Types
// =============================================================================

/// Events that flow through the daemon event bus.
#[derive(Debug, Clone)]
pub enum DaemonEvent {
    /// A fill was committed
    Trade(TradeEvent),

    /// Monitor marked a position to market
    PriceMarked {
        symbol: Symbol,
        price: Price,
        unrealized_pnl: Decimal,
        timestamp: DateTime<Utc>,
    },

    /// Stop-loss or target breached; a close follows
    ExitTriggered {
        position_id: PositionId,
        symbol: Symbol,
        reason: ExitReason,
        price: Price,
    },

    /// Square-off gave up on a symbol; needs an operator
    SquareOffFailed { symbol: Symbol, error: String },

    /// Monitor loop exited
    MonitorStopped { reason: MonitorStopReason },

    /// Shutdown signal
    Shutdown,
}

/// Why the monitor loop exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorStopReason {
    /// `stop_monitor` was called
    Cancelled,
    /// Hard cutoff reached and square-off attempted
    SessionClosed,
}

// =============================================================================
// Event Bus
// =============================================================================

/// Broadcast bus shared by the engine, the monitor and the daemon loop.
///
/// Receivers that fall more than `capacity` events behind see
/// `RecvError::Lagged` and skip ahead.
pub struct EventBus {
    sender: broadcast::Sender<DaemonEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish `event`; dropped silently when nobody listens.
    pub fn send(&self, event: DaemonEvent) {
        if self.sender.send(event).is_err() {
            trace!("No bus subscribers");
        }
    }

    /// Events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<DaemonEvent> {
        self.sender.subscribe()
    }
}

// =============================================================================
// Bus Sink
// =============================================================================

/// Trade event sink that publishes every fill on the bus.
pub struct BusSink {
    bus: Arc<EventBus>,
}

impl BusSink {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl TradeEventSink for BusSink {
    async fn record(&self, event: &TradeEvent) -> Result<(), ExecError> {
        self.bus.send(DaemonEvent::Trade(event.clone()));
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
