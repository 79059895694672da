//! Real-time position monitor.
//!
//! Polls a quote for every open position, marks it to market and closes it
//! when its stop-loss or target is breached. Between the pre-close time and
//! the hard cutoff it polls faster; at the cutoff it squares off everything
//! and exits.
//!
//! A position whose quote is unavailable or suspect is left untouched until
//! the next cycle. Exits are never forced on bad data, except that the
//! cutoff square-off reports symbols it could not close.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use paperdesk_domain::{ExitReason, Position};
use paperdesk_engine::{EngineError, SessionPhase};
use paperdesk_exec::{fetch_price, PriceSource};

use crate::engine::{duration_ms, TradingEngine};
use crate::event_bus::{DaemonEvent, MonitorStopReason};

/// Counters for one pass over the open positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub checked: usize,
    /// No usable quote this cycle
    pub skipped: usize,
    pub exits: usize,
}

/// Monitor loop bound to one engine and one price source.
pub struct Monitor {
    engine: Arc<TradingEngine>,
    source: Arc<dyn PriceSource>,
    shutdown: CancellationToken,
}

impl Monitor {
    pub fn new(engine: Arc<TradingEngine>, source: Arc<dyn PriceSource>, shutdown: CancellationToken) -> Self {
        Self {
            engine,
            source,
            shutdown,
        }
    }

    /// Run until cancelled or until the session closes.
    pub async fn run(self) -> MonitorStopReason {
        let config = self.engine.monitor_config().clone();
        let schedule = self.engine.schedule();
        info!(
            poll_interval_ms = duration_ms(config.poll_interval),
            pre_close_interval_ms = duration_ms(config.pre_close_interval),
            pre_close = %schedule.pre_close(),
            cutoff = %schedule.cutoff(),
            "Monitor started"
        );

        let reason = loop {
            if self.shutdown.is_cancelled() {
                break MonitorStopReason::Cancelled;
            }

            let phase = self.engine.session_phase();
            if phase == SessionPhase::Cutoff {
                self.square_off().await;
                break MonitorStopReason::SessionClosed;
            }

            let report = self.run_cycle().await;
            if report.checked > 0 {
                debug!(
                    checked = report.checked,
                    skipped = report.skipped,
                    exits = report.exits,
                    ?phase,
                    "Monitor cycle complete"
                );
            }
            self.persist().await;

            let interval = match phase {
                SessionPhase::PreClose => config.pre_close_interval,
                _ => config.poll_interval,
            };

            tokio::select! {
                _ = self.shutdown.cancelled() => break MonitorStopReason::Cancelled,
                _ = tokio::time::sleep(interval) => {},
            }
        };

        info!(?reason, "Monitor stopped");
        self.engine.event_bus().send(DaemonEvent::MonitorStopped { reason });
        reason
    }

    /// One pass over every open position, in symbol order.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        for position in self.engine.executor().positions().await {
            if self.shutdown.is_cancelled() {
                break;
            }
            report.checked += 1;

            match self.check(&position).await {
                Some(true) => report.exits += 1,
                Some(false) => {},
                None => report.skipped += 1,
            }
        }

        report
    }

    /// Mark one position and close it if a level was breached.
    ///
    /// `None` when no usable quote was available, otherwise whether this
    /// call closed the position.
    async fn check(&self, position: &Position) -> Option<bool> {
        let symbol = &position.symbol;

        let fetched = tokio::select! {
            _ = self.shutdown.cancelled() => {
                debug!(symbol = %symbol, "Monitor cancelled during price fetch");
                return None;
            },
            fetched = fetch_price(self.source.as_ref(), symbol, self.engine.retry_policy()) => fetched,
        };
        let price = match fetched {
            Ok(price) => price,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "No price this cycle, position left open");
                return None;
            },
        };

        let suspect_prices = &self.engine.executor().policy().suspect_prices;
        if suspect_prices.is_suspect(price, position.avg_price) {
            warn!(
                symbol = %symbol,
                %price,
                entry = %position.avg_price,
                "Suspect price ignored, position left open"
            );
            return None;
        }

        // Levels may have moved since the cycle started; trust the marked copy
        let current = self.engine.mark_price(symbol, price).await?;
        if current.id != position.id {
            return Some(false);
        }

        let Some(reason) = current.exit_trigger(price) else {
            return Some(false);
        };

        info!(
            position_id = %current.id,
            symbol = %symbol,
            %reason,
            %price,
            "Exit level breached"
        );
        self.engine.event_bus().send(DaemonEvent::ExitTriggered {
            position_id: current.id,
            symbol: symbol.clone(),
            reason,
            price,
        });

        match self.engine.exit_observed(&current, price, reason).await {
            Ok(_) => Some(true),
            Err(e) if e.engine_error().is_some_and(EngineError::is_stale_close) => {
                debug!(symbol = %symbol, error = %e, "Position already closed elsewhere");
                Some(false)
            },
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Triggered exit failed, retrying next cycle");
                Some(false)
            },
        }
    }

    async fn square_off(&self) {
        let attempts = self.engine.monitor_config().square_off_attempts;
        info!(attempts, "Hard cutoff reached, squaring off all positions");

        let results = self
            .engine
            .square_off(self.source.as_ref(), ExitReason::AutoExit, attempts)
            .await;

        let failed = results.iter().filter(|r| r.is_failed()).count();
        if failed > 0 {
            error!(failed, total = results.len(), "Square-off incomplete");
        } else if !results.is_empty() {
            info!(closed = results.len(), "Square-off complete");
        }

        self.persist().await;
    }

    async fn persist(&self) {
        if let Err(e) = self.engine.persist().await {
            warn!(error = %e, "Failed to persist snapshot");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
