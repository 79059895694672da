//! Executor: the single entry point for every fill.
//!
//! The Executor is the bridge between the pure Book (bookkeeping) and the
//! impure world (trade log, callers on many tasks). Manual orders, manual
//! closes, monitor-triggered exits and the end-of-day square-off all pass
//! through `execute`, so they share one code path and one lock.
//!
//! # Flow
//!
//! ```text
//! Caller → Executor ─lock─► Book::apply_order ─unlock─► TradeEventSink
//! ```
//!
//! The sink is written after the lock is released; a slow or failing trade
//! log never blocks another order and never undoes a committed fill.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use paperdesk_domain::{ExitReason, Position, PositionId, Price, Symbol, TradeEvent};
use paperdesk_engine::{Book, BookSnapshot, BookState, EngineError, OrderOutcome, OrderPolicy, OrderRequest};

use crate::error::ExecResult;
use crate::ports::{Clock, TradeEventSink};

/// Runs orders against a shared book.
pub struct Executor {
    /// Ledger + positions + stats, guarded together
    book: Mutex<Book>,
    /// Protection defaults and suspect-price screening
    policy: OrderPolicy,
    /// Best-effort trade log
    sink: Arc<dyn TradeEventSink>,
    clock: Arc<dyn Clock>,
}

impl Executor {
    /// Create a new executor.
    pub fn new(book: Book, policy: OrderPolicy, sink: Arc<dyn TradeEventSink>, clock: Arc<dyn Clock>) -> Self {
        Self {
            book: Mutex::new(book),
            policy,
            sink,
            clock,
        }
    }

    pub fn policy(&self) -> &OrderPolicy {
        &self.policy
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Apply one order atomically, then publish its events.
    pub async fn execute(&self, order: OrderRequest) -> ExecResult<OrderOutcome> {
        let outcome = {
            let mut book = self.book.lock().await;
            book.apply_order(&order, &self.policy, self.clock.now())?
        };

        info!(
            symbol = %order.symbol,
            side = %order.side,
            quantity = %order.quantity,
            price = %order.price,
            transition = ?outcome.transition,
            realized_pnl = %outcome.realized_pnl,
            "Order executed"
        );

        self.publish(&outcome.events).await;
        Ok(outcome)
    }

    /// Fully close the position held for `symbol` at `price`.
    ///
    /// With `expected` set, the close only applies to that exact position;
    /// if it was already closed or replaced the call fails with
    /// `NoOpenPosition` / `PositionChanged` and nothing changes. The quantity
    /// is read under the same lock that applies the close.
    pub async fn close(
        &self,
        symbol: &Symbol,
        price: Price,
        reason: ExitReason,
        expected: Option<PositionId>,
    ) -> ExecResult<OrderOutcome> {
        let outcome = {
            let mut book = self.book.lock().await;
            let position = book
                .position(symbol)
                .ok_or_else(|| EngineError::NoOpenPosition(symbol.clone()))?;

            let mut order = OrderRequest::new(symbol.clone(), position.side.exit_action(), position.quantity, price)
                .with_reason(reason);
            if let Some(id) = expected {
                order = order.expecting(id);
            }

            book.apply_order(&order, &self.policy, self.clock.now())?
        };

        info!(
            symbol = %symbol,
            %price,
            %reason,
            pnl = %outcome.realized_pnl,
            "Position closed"
        );

        self.publish(&outcome.events).await;
        Ok(outcome)
    }

    /// Update the mark of an open position.
    pub async fn mark(&self, symbol: &Symbol, price: Price) -> Option<Position> {
        let now = self.clock.now();
        let mut book = self.book.lock().await;
        book.mark(symbol, price, now).cloned()
    }

    pub async fn position(&self, symbol: &Symbol) -> Option<Position> {
        self.book.lock().await.position(symbol).cloned()
    }

    /// Open positions in stable symbol order.
    pub async fn positions(&self) -> Vec<Position> {
        self.book.lock().await.positions().cloned().collect()
    }

    pub async fn snapshot(&self) -> BookSnapshot {
        self.book.lock().await.snapshot()
    }

    pub async fn state(&self) -> BookState {
        self.book.lock().await.state()
    }

    /// Swap in a different book (restore or reset).
    pub async fn replace(&self, book: Book) {
        *self.book.lock().await = book;
    }

    async fn publish(&self, events: &[TradeEvent]) {
        for event in events {
            if let Err(e) = self.sink.record(event).await {
                warn!(
                    position_id = %event.id,
                    symbol = %event.symbol,
                    status = %event.status,
                    error = %e,
                    "Trade event sink write failed"
                );
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
