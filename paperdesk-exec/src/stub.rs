//! Stub implementations for testing.
//!
//! These implementations simulate a quote feed, a trade log and a clock
//! without any real I/O.

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use paperdesk_domain::{Price, Symbol, TradeEvent};

use crate::error::ExecError;
use crate::ports::{Clock, PriceSource, TradeEventSink};

// =============================================================================
// Stub Price Source
// =============================================================================

/// Stub price feed for testing.
///
/// Prices are injected per symbol. Failures can be queued per symbol to
/// exercise retry and skip paths.
#[derive(Default)]
pub struct StubPriceSource {
    /// Current prices by symbol
    prices: RwLock<HashMap<Symbol, Decimal>>,
    /// Remaining simulated failures by symbol
    failures: RwLock<HashMap<Symbol, u32>>,
    /// Number of lookups by symbol
    calls: RwLock<HashMap<Symbol, u32>>,
}

impl StubPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the quote for a symbol. A zero or negative value is served as a
    /// provider error.
    pub fn set_price(&self, symbol: &Symbol, price: Decimal) {
        let mut prices = self.prices.write().unwrap_or_else(|e| e.into_inner());
        prices.insert(symbol.clone(), price);
    }

    /// Drop the quote for a symbol.
    pub fn clear_price(&self, symbol: &Symbol) {
        let mut prices = self.prices.write().unwrap_or_else(|e| e.into_inner());
        prices.remove(symbol);
    }

    /// Fail the next `times` lookups for a symbol.
    pub fn fail_times(&self, symbol: &Symbol, times: u32) {
        let mut failures = self.failures.write().unwrap_or_else(|e| e.into_inner());
        failures.insert(symbol.clone(), times);
    }

    /// Fail every lookup for a symbol until `fail_times(symbol, 0)`.
    pub fn fail_always(&self, symbol: &Symbol) {
        self.fail_times(symbol, u32::MAX);
    }

    /// How many lookups a symbol has seen.
    pub fn calls(&self, symbol: &Symbol) -> u32 {
        let calls = self.calls.read().unwrap_or_else(|e| e.into_inner());
        calls.get(symbol).copied().unwrap_or(0)
    }

    fn should_fail(&self, symbol: &Symbol) -> bool {
        let mut failures = self.failures.write().unwrap_or_else(|e| e.into_inner());
        match failures.get_mut(symbol) {
            Some(remaining) if *remaining > 0 => {
                if *remaining != u32::MAX {
                    *remaining -= 1;
                }
                true
            },
            _ => false,
        }
    }
}

#[async_trait]
impl PriceSource for StubPriceSource {
    async fn get_price(&self, symbol: &Symbol) -> Result<Price, ExecError> {
        {
            let mut calls = self.calls.write().unwrap_or_else(|e| e.into_inner());
            *calls.entry(symbol.clone()).or_insert(0) += 1;
        }

        if self.should_fail(symbol) {
            return Err(ExecError::price_unavailable(symbol, "simulated feed failure"));
        }

        let quote = {
            let prices = self.prices.read().unwrap_or_else(|e| e.into_inner());
            prices.get(symbol).copied()
        };

        let quote = quote.ok_or_else(|| ExecError::price_unavailable(symbol, "no quote"))?;
        Price::new(quote).map_err(|e| ExecError::price_unavailable(symbol, e.to_string()))
    }
}

// =============================================================================
// Memory Sink
// =============================================================================

/// Trade event sink that keeps everything in memory.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<TradeEvent>>,
    fail_next: Mutex<bool>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events in arrival order.
    pub fn events(&self) -> Vec<TradeEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Configure the next write to fail.
    pub fn set_fail_next(&self, fail: bool) {
        *self.fail_next.lock().unwrap_or_else(|e| e.into_inner()) = fail;
    }
}

#[async_trait]
impl TradeEventSink for MemorySink {
    async fn record(&self, event: &TradeEvent) -> Result<(), ExecError> {
        {
            let mut fail_next = self.fail_next.lock().unwrap_or_else(|e| e.into_inner());
            if *fail_next {
                *fail_next = false;
                return Err(ExecError::Sink("simulated sink failure".to_string()));
            }
        }

        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event.clone());
        Ok(())
    }
}

// =============================================================================
// Manual Clock
// =============================================================================

/// Clock whose local time of day is set by the test.
///
/// `now()` still follows real time so fills keep distinct timestamps.
pub struct ManualClock {
    local_time: RwLock<NaiveTime>,
}

impl ManualClock {
    pub fn new(local_time: NaiveTime) -> Self {
        Self {
            local_time: RwLock::new(local_time),
        }
    }

    /// Clock pinned to `hh:mm`.
    pub fn at(hour: u32, minute: u32) -> Self {
        Self::new(NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN))
    }

    pub fn set(&self, local_time: NaiveTime) {
        *self.local_time.write().unwrap_or_else(|e| e.into_inner()) = local_time;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_time(&self) -> NaiveTime {
        *self.local_time.read().unwrap_or_else(|e| e.into_inner())
    }
}

// =============================================================================
// Tests
// =============================================================================
