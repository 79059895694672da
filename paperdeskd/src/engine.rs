//! Trading engine: the public face of the paper ledger.
//!
//! Every operation a GUI, CLI or strategy can call lives here. All of them
//! end in the same `Executor`, so a manual close, a stop-loss exit and the
//! end-of-day square-off share one code path and one lock.
//!
//! # Operations
//!
//! - `open_or_adjust`: open, add to, reduce, close or reverse a position
//! - `close_position` / `close_all`: exits at the live price
//! - `snapshot`: ledger, positions and P&L
//! - `start_monitor` / `stop_monitor`: the real-time stop/target/cutoff loop

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use paperdesk_domain::{ExitReason, Leverage, OrderSide, Position, Price, Quantity, Symbol};
use paperdesk_engine::{
    Book, BookSnapshot, EngineError, Ledger, OrderOutcome, OrderRequest, SessionPhase, SessionSchedule,
};
use paperdesk_exec::{fetch_price, Clock, Executor, PriceSource, RetryPolicy, TradeEventSink};
use paperdesk_store::SnapshotStore;
use rust_decimal::Decimal;

use crate::config::{Config, MonitorConfig};
use crate::error::{DaemonError, DaemonResult};
use crate::event_bus::{DaemonEvent, EventBus, MonitorStopReason};
use crate::monitor::Monitor;

// =============================================================================
// Square-off results
// =============================================================================

/// Result of squaring off one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SquareOff {
    pub symbol: Symbol,
    #[serde(flatten)]
    pub outcome: SquareOffOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SquareOffOutcome {
    /// Closed at `exit_price`, realizing `pnl`
    Closed { exit_price: Price, pnl: Decimal },
    /// Someone else closed it first
    AlreadyClosed,
    /// Every attempt failed; the position is still open
    Failed { error: String },
}

impl SquareOff {
    /// Closed by this call.
    pub fn is_closed(&self) -> bool {
        matches!(self.outcome, SquareOffOutcome::Closed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, SquareOffOutcome::Failed { .. })
    }

    /// Realized P&L, zero unless closed by this call.
    pub fn pnl(&self) -> Decimal {
        match &self.outcome {
            SquareOffOutcome::Closed { pnl, .. } => *pnl,
            _ => Decimal::ZERO,
        }
    }
}

// =============================================================================
// Trading Engine
// =============================================================================

struct MonitorHandle {
    shutdown: CancellationToken,
    task: JoinHandle<MonitorStopReason>,
}

/// Paper trading engine.
pub struct TradingEngine {
    executor: Executor,
    schedule: SessionSchedule,
    leverage: Leverage,
    monitor_config: MonitorConfig,
    retry: RetryPolicy,
    /// Quotes for manual closes
    price_source: Arc<dyn PriceSource>,
    event_bus: Arc<EventBus>,
    store: Option<Arc<dyn SnapshotStore>>,
    monitor: Mutex<Option<MonitorHandle>>,
}

impl TradingEngine {
    /// Build an engine with a fresh paper account from `config`.
    pub fn new(
        config: &Config,
        price_source: Arc<dyn PriceSource>,
        sink: Arc<dyn TradeEventSink>,
        clock: Arc<dyn Clock>,
        event_bus: Arc<EventBus>,
    ) -> DaemonResult<Self> {
        config.validate()?;
        let leverage = config.leverage()?;
        let ledger = Ledger::new(config.engine.initial_cash, leverage)?;
        let executor = Executor::new(Book::new(ledger), config.order_policy(), sink, clock);

        Ok(Self {
            executor,
            schedule: config.schedule()?,
            leverage,
            monitor_config: config.monitor.clone(),
            retry: config.retry_policy(),
            price_source,
            event_bus,
            store: None,
            monitor: Mutex::new(None),
        })
    }

    /// Persist snapshots to `store`.
    pub fn with_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn monitor_config(&self) -> &MonitorConfig {
        &self.monitor_config
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn schedule(&self) -> SessionSchedule {
        self.schedule
    }

    /// Session phase at the clock's current local time.
    pub fn session_phase(&self) -> SessionPhase {
        self.schedule.phase(self.executor.clock().local_time())
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Place one order at `price`.
    ///
    /// Opens, adds to, reduces, closes or reverses the position for `symbol`
    /// depending on what is held. Omitted stop-loss/target fall back to the
    /// configured percentages on open; on an add they keep their current
    /// values. After the hard cutoff only orders that reduce a position are
    /// accepted.
    pub async fn open_or_adjust(
        &self,
        symbol: Symbol,
        side: OrderSide,
        quantity: Quantity,
        price: Price,
        stop_loss: Option<Price>,
        target: Option<Price>,
    ) -> DaemonResult<OrderOutcome> {
        let allow_new_exposure = self
            .schedule
            .accepts_new_exposure(self.executor.clock().local_time());
        let order = OrderRequest::new(symbol, side, quantity, price)
            .with_protection(stop_loss, target)
            .with_exposure_allowed(allow_new_exposure);

        match self.executor.execute(order.clone()).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(
                    symbol = %order.symbol,
                    side = %order.side,
                    quantity = %order.quantity,
                    price = %order.price,
                    error = %e,
                    "Order rejected"
                );
                Err(e.into())
            },
        }
    }

    /// Close the whole position for `symbol` at the live price.
    pub async fn close_position(&self, symbol: &Symbol, reason: ExitReason) -> DaemonResult<OrderOutcome> {
        let position = self
            .executor
            .position(symbol)
            .await
            .ok_or_else(|| EngineError::NoOpenPosition(symbol.clone()))?;

        let price = fetch_price(self.price_source.as_ref(), symbol, self.retry).await?;
        self.exit_observed(&position, price, reason).await
    }

    /// Close `position` at `price`, provided it is still the open position
    /// for its symbol.
    ///
    /// Fails with `NoOpenPosition` / `PositionChanged` (and changes nothing)
    /// when another caller closed or replaced it first.
    pub async fn exit_observed(&self, position: &Position, price: Price, reason: ExitReason) -> DaemonResult<OrderOutcome> {
        Ok(self
            .executor
            .close(&position.symbol, price, reason, Some(position.id))
            .await?)
    }

    /// Close every open position at the live price.
    pub async fn close_all(&self, reason: ExitReason) -> Vec<SquareOff> {
        self.square_off(self.price_source.as_ref(), reason, 1).await
    }

    /// Close every open position, retrying failed symbols for up to
    /// `rounds` rounds with doubling backoff between rounds.
    ///
    /// Symbols still open afterwards are reported as `Failed`, logged at
    /// error level and announced on the bus: they need an operator.
    pub async fn square_off(&self, source: &dyn PriceSource, reason: ExitReason, rounds: u32) -> Vec<SquareOff> {
        let rounds = rounds.max(1);
        let mut pending: Vec<Symbol> = self
            .executor
            .positions()
            .await
            .into_iter()
            .map(|p| p.symbol)
            .collect();
        let mut results = Vec::with_capacity(pending.len());
        let mut backoff = self.retry.initial_backoff;

        for round in 1..=rounds {
            let mut failed = Vec::new();

            for symbol in pending {
                match self.try_square_off(source, &symbol, reason).await {
                    Ok(outcome) => results.push(SquareOff { symbol, outcome }),
                    Err(e) => {
                        warn!(symbol = %symbol, round, max_rounds = rounds, error = %e, "Square-off attempt failed");
                        failed.push((symbol, e.to_string()));
                    },
                }
            }

            if failed.is_empty() {
                break;
            }

            if round < rounds {
                tokio::time::sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
                pending = failed.into_iter().map(|(symbol, _)| symbol).collect();
                continue;
            }

            for (symbol, error) in failed {
                error!(
                    symbol = %symbol,
                    error = %error,
                    %reason,
                    "Square-off failed, manual intervention required"
                );
                self.event_bus.send(DaemonEvent::SquareOffFailed {
                    symbol: symbol.clone(),
                    error: error.clone(),
                });
                results.push(SquareOff {
                    symbol,
                    outcome: SquareOffOutcome::Failed { error },
                });
            }
            break;
        }

        results
    }

    async fn try_square_off(
        &self,
        source: &dyn PriceSource,
        symbol: &Symbol,
        reason: ExitReason,
    ) -> DaemonResult<SquareOffOutcome> {
        let Some(position) = self.executor.position(symbol).await else {
            return Ok(SquareOffOutcome::AlreadyClosed);
        };

        let price = fetch_price(source, symbol, self.retry).await?;
        match self.exit_observed(&position, price, reason).await {
            Ok(outcome) => Ok(SquareOffOutcome::Closed {
                exit_price: price,
                pnl: outcome.realized_pnl,
            }),
            Err(e) if matches!(e.engine_error(), Some(EngineError::NoOpenPosition(_))) => {
                Ok(SquareOffOutcome::AlreadyClosed)
            },
            Err(e) => Err(e),
        }
    }

    /// Update the mark of an open position without touching margin.
    pub async fn mark_price(&self, symbol: &Symbol, price: Price) -> Option<Position> {
        let position = self.executor.mark(symbol, price).await?;
        self.event_bus.send(DaemonEvent::PriceMarked {
            symbol: symbol.clone(),
            price,
            unrealized_pnl: position.unrealized_pnl(),
            timestamp: position.updated_at,
        });
        Some(position)
    }

    /// Ledger, open positions and P&L.
    pub async fn snapshot(&self) -> BookSnapshot {
        self.executor.snapshot().await
    }

    // =========================================================================
    // Account lifecycle
    // =========================================================================

    /// Start a fresh paper account with `initial_cash`.
    pub async fn reset(&self, initial_cash: Decimal) -> DaemonResult<()> {
        if self.is_monitor_running().await {
            return Err(DaemonError::MonitorRunning("stop it before resetting the account".to_string()));
        }

        let ledger = Ledger::new(initial_cash, self.leverage)?;
        self.executor.replace(Book::new(ledger)).await;
        info!(%initial_cash, leverage = %self.leverage, "Paper account reset");

        self.persist().await
    }

    /// Load the stored snapshot, if any. Returns whether one was applied.
    pub async fn restore(&self) -> DaemonResult<bool> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        if self.is_monitor_running().await {
            return Err(DaemonError::MonitorRunning("stop it before restoring a snapshot".to_string()));
        }

        let Some(snapshot) = store.load().await? else {
            info!("No snapshot to restore");
            return Ok(false);
        };

        let book = Book::from_state(snapshot.state)?;
        info!(
            saved_at = %snapshot.saved_at,
            positions = book.positions().count(),
            cash = %book.ledger().cash(),
            "Restored book from snapshot"
        );
        self.executor.replace(book).await;
        Ok(true)
    }

    /// Write the current book to the snapshot store, if configured.
    pub async fn persist(&self) -> DaemonResult<()> {
        if let Some(store) = &self.store {
            store.save(&self.executor.state().await).await?;
        }
        Ok(())
    }

    // =========================================================================
    // Monitor
    // =========================================================================

    /// Spawn the real-time monitor using `price_source` for live quotes.
    pub async fn start_monitor(self: &Arc<Self>, price_source: Arc<dyn PriceSource>) -> DaemonResult<()> {
        let mut slot = self.monitor.lock().await;
        if slot.as_ref().is_some_and(|handle| !handle.task.is_finished()) {
            return Err(DaemonError::MonitorAlreadyRunning);
        }

        let shutdown = CancellationToken::new();
        let monitor = Monitor::new(self.clone(), price_source, shutdown.clone());
        let task = tokio::spawn(monitor.run());

        *slot = Some(MonitorHandle { shutdown, task });
        Ok(())
    }

    /// Signal the monitor to stop and wait for it.
    ///
    /// An order the monitor is applying finishes first. Returns why the loop
    /// exited, or `None` if no monitor was started. On a join timeout the
    /// task stays registered, so the monitor still counts as running and a
    /// later call can wait for it again.
    pub async fn stop_monitor(&self) -> DaemonResult<Option<MonitorStopReason>> {
        let mut slot = self.monitor.lock().await;
        let Some(handle) = slot.as_mut() else {
            return Ok(None);
        };

        info!("Stopping monitor");
        handle.shutdown.cancel();

        let timeout = self.monitor_config.join_timeout;
        let joined = tokio::time::timeout(timeout, &mut handle.task).await;
        match joined {
            Ok(result) => {
                *slot = None;
                match result {
                    Ok(reason) => Ok(Some(reason)),
                    Err(e) => {
                        error!(error = %e, "Monitor task failed");
                        Ok(None)
                    },
                }
            },
            Err(_) => {
                warn!(timeout_ms = duration_ms(timeout), "Monitor did not stop in time, still running");
                Err(DaemonError::MonitorJoinTimeout(timeout))
            },
        }
    }

    pub async fn is_monitor_running(&self) -> bool {
        self.monitor
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.task.is_finished())
    }
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use paperdesk_domain::{Side, TradeStatus};
    use paperdesk_engine::Transition;
    use paperdesk_exec::{ManualClock, MemorySink, StubPriceSource};
    use paperdesk_exec::ExecError;
    use paperdesk_store::MemorySnapshotStore;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Harness {
        engine: Arc<TradingEngine>,
        prices: Arc<StubPriceSource>,
        sink: Arc<MemorySink>,
        clock: Arc<ManualClock>,
    }

    fn harness() -> Harness {
        let prices = Arc::new(StubPriceSource::new());
        let sink = Arc::new(MemorySink::new());
        let clock = Arc::new(ManualClock::at(10, 0));
        let engine = TradingEngine::new(
            &Config::test(),
            prices.clone(),
            sink.clone(),
            clock.clone(),
            Arc::new(EventBus::new(100)),
        )
        .unwrap();

        Harness {
            engine: Arc::new(engine),
            prices,
            sink,
            clock,
        }
    }

    fn sym(s: &str) -> Symbol {
        Symbol::new(s).unwrap()
    }

    fn px(v: Decimal) -> Price {
        Price::new(v).unwrap()
    }

    fn qty(v: Decimal) -> Quantity {
        Quantity::new(v).unwrap()
    }

    #[tokio::test]
    async fn test_open_applies_default_protection() {
        let h = harness();

        let outcome = h
            .engine
            .open_or_adjust(sym("INFY"), OrderSide::Buy, qty(dec!(10)), px(dec!(1500)), None, None)
            .await
            .unwrap();

        let position = outcome.position.unwrap();
        assert_eq!(position.side, Side::Long);
        assert_eq!(position.stop_loss, Some(px(dec!(1470))));
        assert_eq!(position.target, Some(px(dec!(1560))));
    }

    #[tokio::test]
    async fn test_after_cutoff_only_reductions_accepted() {
        let h = harness();
        h.engine
            .open_or_adjust(sym("INFY"), OrderSide::Buy, qty(dec!(10)), px(dec!(1500)), None, None)
            .await
            .unwrap();

        h.clock.set(chrono::NaiveTime::from_hms_opt(15, 20, 0).unwrap());

        let add = h
            .engine
            .open_or_adjust(sym("INFY"), OrderSide::Buy, qty(dec!(1)), px(dec!(1500)), None, None)
            .await;
        assert!(matches!(add.unwrap_err().engine_error(), Some(EngineError::Validation(_))));

        let reduce = h
            .engine
            .open_or_adjust(sym("INFY"), OrderSide::Sell, qty(dec!(4)), px(dec!(1510)), None, None)
            .await
            .unwrap();
        assert_eq!(reduce.transition, Transition::PartiallyClosed);
    }

    #[tokio::test]
    async fn test_close_position_uses_live_price() {
        let h = harness();
        h.engine
            .open_or_adjust(sym("TCS"), OrderSide::Sell, qty(dec!(5)), px(dec!(3000)), None, None)
            .await
            .unwrap();
        h.prices.set_price(&sym("TCS"), dec!(2950));

        let outcome = h.engine.close_position(&sym("TCS"), ExitReason::Manual).await.unwrap();

        assert_eq!(outcome.realized_pnl, dec!(250));
        assert!(h.engine.snapshot().await.positions.is_empty());
    }

    #[tokio::test]
    async fn test_close_position_without_quote_keeps_position() {
        let h = harness();
        h.engine
            .open_or_adjust(sym("TCS"), OrderSide::Buy, qty(dec!(5)), px(dec!(3000)), None, None)
            .await
            .unwrap();

        let err = h.engine.close_position(&sym("TCS"), ExitReason::Manual).await.unwrap_err();

        assert!(err.is_price_unavailable());
        assert_eq!(h.engine.snapshot().await.positions.len(), 1);
    }

    #[tokio::test]
    async fn test_close_all_reports_each_symbol() {
        let h = harness();
        for (symbol, price) in [("INFY", dec!(1500)), ("TCS", dec!(3000))] {
            h.engine
                .open_or_adjust(sym(symbol), OrderSide::Buy, qty(dec!(2)), px(price), None, None)
                .await
                .unwrap();
        }
        h.prices.set_price(&sym("INFY"), dec!(1510));
        h.prices.fail_always(&sym("TCS"));
        let mut bus = h.engine.event_bus().subscribe();

        let results = h.engine.close_all(ExitReason::Manual).await;

        assert_eq!(results.len(), 2);
        let infy = results.iter().find(|r| r.symbol == sym("INFY")).unwrap();
        assert_eq!(infy.pnl(), dec!(20));
        let tcs = results.iter().find(|r| r.symbol == sym("TCS")).unwrap();
        assert!(tcs.is_failed());

        let mut saw_failure = false;
        while let Ok(event) = bus.try_recv() {
            if let DaemonEvent::SquareOffFailed { symbol, .. } = event {
                assert_eq!(symbol, sym("TCS"));
                saw_failure = true;
            }
        }
        assert!(saw_failure);
        assert_eq!(h.engine.snapshot().await.positions.len(), 1);
    }

    #[tokio::test]
    async fn test_square_off_retries_rounds() {
        let h = harness();
        h.engine
            .open_or_adjust(sym("SBIN"), OrderSide::Buy, qty(dec!(10)), px(dec!(800)), None, None)
            .await
            .unwrap();
        h.prices.set_price(&sym("SBIN"), dec!(790));
        // First round exhausts both price attempts
        h.prices.fail_times(&sym("SBIN"), 2);

        let results = h
            .engine
            .square_off(h.prices.as_ref(), ExitReason::AutoExit, 2)
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].pnl(), dec!(-100));
        let last = h.sink.events().pop().unwrap();
        assert_eq!(last.status, TradeStatus::Closed);
        assert_eq!(last.reason, Some(ExitReason::AutoExit));
    }

    #[tokio::test]
    async fn test_mark_price_publishes() {
        let h = harness();
        h.engine
            .open_or_adjust(sym("ITC"), OrderSide::Buy, qty(dec!(100)), px(dec!(400)), None, None)
            .await
            .unwrap();
        let mut bus = h.engine.event_bus().subscribe();

        let position = h.engine.mark_price(&sym("ITC"), px(dec!(404))).await.unwrap();

        assert_eq!(position.unrealized_pnl(), dec!(400));
        assert!(matches!(bus.try_recv(), Ok(DaemonEvent::PriceMarked { .. })));
        assert!(h.engine.mark_price(&sym("TCS"), px(dec!(1))).await.is_none());
    }

    #[tokio::test]
    async fn test_reset_and_restore() {
        let prices = Arc::new(StubPriceSource::new());
        let store = Arc::new(MemorySnapshotStore::new());
        let engine = TradingEngine::new(
            &Config::test(),
            prices,
            Arc::new(MemorySink::new()),
            Arc::new(ManualClock::at(10, 0)),
            Arc::new(EventBus::new(100)),
        )
        .unwrap()
        .with_store(store.clone());

        engine
            .open_or_adjust(sym("ITC"), OrderSide::Buy, qty(dec!(100)), px(dec!(400)), None, None)
            .await
            .unwrap();
        engine.persist().await.unwrap();
        let saved = store.load().await.unwrap().unwrap().state;
        assert_eq!(saved.positions.len(), 1);

        engine.reset(dec!(50000)).await.unwrap();
        assert_eq!(engine.snapshot().await.cash, dec!(50000));
        assert!(engine.snapshot().await.positions.is_empty());

        // reset persists the fresh account
        assert!(engine.restore().await.unwrap());
        assert!(engine.snapshot().await.positions.is_empty());

        store.save(&saved).await.unwrap();
        assert!(engine.restore().await.unwrap());
        assert_eq!(engine.snapshot().await.positions.len(), 1);
        assert_eq!(engine.snapshot().await.used_margin, dec!(8000));
    }

    #[tokio::test]
    async fn test_monitor_start_twice_rejected() {
        let h = harness();

        h.engine.start_monitor(h.prices.clone()).await.unwrap();
        assert!(h.engine.is_monitor_running().await);
        assert!(matches!(
            h.engine.start_monitor(h.prices.clone()).await,
            Err(DaemonError::MonitorAlreadyRunning)
        ));
        assert!(matches!(h.engine.reset(dec!(1)).await, Err(DaemonError::MonitorRunning(_))));

        let reason = h.engine.stop_monitor().await.unwrap();
        assert_eq!(reason, Some(MonitorStopReason::Cancelled));
        assert!(!h.engine.is_monitor_running().await);
        assert_eq!(h.engine.stop_monitor().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reset_rejects_out_of_range_cash() {
        let h = harness();

        let err = h.engine.reset(Decimal::MAX).await.unwrap_err();
        assert!(matches!(err, DaemonError::Engine(EngineError::Validation(_))));

        let snapshot = h.engine.snapshot().await;
        assert_eq!(snapshot.cash, dec!(100000));
        assert_eq!(snapshot.available_margin, dec!(500000));
    }

    /// Quote feed that never answers within a test's lifetime.
    struct HangingSource {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl PriceSource for HangingSource {
        async fn get_price(&self, symbol: &Symbol) -> Result<Price, ExecError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(ExecError::price_unavailable(symbol, "no answer"))
        }
    }

    fn engine_with_join_timeout(join_timeout: Duration) -> (Arc<TradingEngine>, Arc<ManualClock>) {
        let mut config = Config::test();
        config.monitor.join_timeout = join_timeout;
        let clock = Arc::new(ManualClock::at(10, 0));
        let engine = TradingEngine::new(
            &config,
            Arc::new(StubPriceSource::new()),
            Arc::new(MemorySink::new()),
            clock.clone(),
            Arc::new(EventBus::new(100)),
        )
        .unwrap();
        (Arc::new(engine), clock)
    }

    async fn wait_for_fetch(source: &HangingSource) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while source.calls.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_stop_monitor_interrupts_pending_fetch() {
        let (engine, _clock) = engine_with_join_timeout(Duration::from_secs(2));
        engine
            .open_or_adjust(sym("INFY"), OrderSide::Buy, qty(dec!(10)), px(dec!(1500)), None, None)
            .await
            .unwrap();

        let source = Arc::new(HangingSource {
            calls: AtomicUsize::new(0),
        });
        engine.start_monitor(source.clone()).await.unwrap();
        wait_for_fetch(&source).await;

        let started = std::time::Instant::now();
        let reason = engine.stop_monitor().await.unwrap();
        assert_eq!(reason, Some(MonitorStopReason::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!engine.is_monitor_running().await);
        assert_eq!(engine.snapshot().await.positions.len(), 1);
    }

    #[tokio::test]
    async fn test_monitor_stays_registered_after_join_timeout() {
        let (engine, clock) = engine_with_join_timeout(Duration::from_millis(50));
        engine
            .open_or_adjust(sym("INFY"), OrderSide::Sell, qty(dec!(10)), px(dec!(1500)), None, None)
            .await
            .unwrap();

        // Past the cutoff the monitor is squaring off, which is not interrupted
        clock.set(chrono::NaiveTime::from_hms_opt(15, 20, 0).unwrap());

        let source = Arc::new(HangingSource {
            calls: AtomicUsize::new(0),
        });
        engine.start_monitor(source.clone()).await.unwrap();
        wait_for_fetch(&source).await;

        assert!(matches!(
            engine.stop_monitor().await,
            Err(DaemonError::MonitorJoinTimeout(_))
        ));
        assert!(engine.is_monitor_running().await);
        assert!(matches!(
            engine.start_monitor(source.clone()).await,
            Err(DaemonError::MonitorAlreadyRunning)
        ));
        assert!(matches!(engine.reset(dec!(1)).await, Err(DaemonError::MonitorRunning(_))));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
