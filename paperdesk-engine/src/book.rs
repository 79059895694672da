//! Position book and order state machine.
//!
//! The book owns the ledger, the one-position-per-symbol store and the trade
//! statistics. `apply_order` is the only way fills reach it; each call either
//! commits every change it computed or none of them.
//!
//! Order transitions for a symbol:
//!
//! ```text
//! Flat       + order          -> Opened
//! Long/Short + same side      -> Added      (weighted average entry)
//! Long/Short + opposite, q < held -> PartiallyClosed
//! Long/Short + opposite, q = held -> Closed
//! Long/Short + opposite, q > held -> Reversed (close, then open remainder)
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use paperdesk_domain::{
    ExitReason, OrderSide, Position, PositionId, Price, Quantity, Side, Symbol, TradeEvent, TradeStatus,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::ledger::Ledger;
use crate::policy::OrderPolicy;
use crate::stats::TradeStats;

// =============================================================================
// Orders
// =============================================================================

/// A fill request against the book.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub quantity: Quantity,
    pub price: Price,
    pub stop_loss: Option<Price>,
    pub target: Option<Price>,
    /// Reason recorded on any exit fill this order produces
    pub reason: ExitReason,
    /// When set, the order must act on this exact position
    pub expected_position: Option<PositionId>,
    /// When false, orders that open, add or reverse are rejected
    pub allow_new_exposure: bool,
}

impl OrderRequest {
    /// A manual order with no protection levels.
    pub fn new(symbol: Symbol, side: OrderSide, quantity: Quantity, price: Price) -> Self {
        Self {
            symbol,
            side,
            quantity,
            price,
            stop_loss: None,
            target: None,
            reason: ExitReason::Manual,
            expected_position: None,
            allow_new_exposure: true,
        }
    }

    pub fn with_protection(mut self, stop_loss: Option<Price>, target: Option<Price>) -> Self {
        self.stop_loss = stop_loss;
        self.target = target;
        self
    }

    pub fn with_reason(mut self, reason: ExitReason) -> Self {
        self.reason = reason;
        self
    }

    /// Pin the order to a position observed earlier.
    pub fn expecting(mut self, id: PositionId) -> Self {
        self.expected_position = Some(id);
        self
    }

    pub fn with_exposure_allowed(mut self, allowed: bool) -> Self {
        self.allow_new_exposure = allowed;
        self
    }
}

/// Which transition an order took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Transition {
    Opened,
    Added,
    PartiallyClosed,
    Closed,
    Reversed,
}

/// Result of a committed order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderOutcome {
    pub transition: Transition,
    /// Events in fill order (exit before entry on a reversal)
    pub events: Vec<TradeEvent>,
    pub realized_pnl: Decimal,
    /// Position held for the symbol after the order, if any
    pub position: Option<Position>,
}

// =============================================================================
// Snapshots
// =============================================================================

/// Read-only view of the book for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub cash: Decimal,
    pub used_margin: Decimal,
    pub available_margin: Decimal,
    pub leverage: Decimal,
    pub positions: Vec<Position>,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    pub stats: TradeStats,
    pub win_rate: Decimal,
}

/// Persistable state of the book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookState {
    pub ledger: Ledger,
    pub positions: Vec<Position>,
    #[serde(default)]
    pub stats: TradeStats,
}

// =============================================================================
// Book
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    ledger: Ledger,
    positions: BTreeMap<Symbol, Position>,
    stats: TradeStats,
}

impl Book {
    /// An empty book over `ledger`.
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger,
            positions: BTreeMap::new(),
            stats: TradeStats::default(),
        }
    }

    /// Rebuild a book from persisted state.
    ///
    /// # Errors
    /// `InvariantViolation` if a symbol appears twice, a position carries
    /// negative margin, or committed margins do not sum to the ledger's
    /// `used_margin`.
    pub fn from_state(state: BookState) -> EngineResult<Self> {
        let mut positions = BTreeMap::new();
        let mut committed = Decimal::ZERO;
        for position in state.positions {
            if position.margin < Decimal::ZERO {
                return Err(EngineError::InvariantViolation(format!(
                    "negative margin on {}",
                    position.symbol
                )));
            }
            committed = committed.checked_add(position.margin).ok_or_else(|| {
                EngineError::InvariantViolation(format!("margin on {} is out of range", position.symbol))
            })?;
            let symbol = position.symbol.clone();
            if positions.insert(symbol.clone(), position).is_some() {
                return Err(EngineError::InvariantViolation(format!(
                    "duplicate position for {}",
                    symbol
                )));
            }
        }
        if committed != state.ledger.used_margin() {
            return Err(EngineError::InvariantViolation(format!(
                "positions commit {} but ledger holds {}",
                committed,
                state.ledger.used_margin()
            )));
        }
        Ok(Self {
            ledger: state.ledger,
            positions,
            stats: state.stats,
        })
    }

    pub fn state(&self) -> BookState {
        BookState {
            ledger: self.ledger,
            positions: self.positions.values().cloned().collect(),
            stats: self.stats.clone(),
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn stats(&self) -> &TradeStats {
        &self.stats
    }

    pub fn position(&self, symbol: &Symbol) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Open positions ordered by symbol.
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn is_flat(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn snapshot(&self) -> BookSnapshot {
        let positions: Vec<Position> = self.positions.values().cloned().collect();
        let unrealized_pnl = positions.iter().map(Position::unrealized_pnl).sum();
        BookSnapshot {
            cash: self.ledger.cash(),
            used_margin: self.ledger.used_margin(),
            available_margin: self.ledger.available_margin(),
            leverage: self.ledger.leverage().as_decimal(),
            positions,
            unrealized_pnl,
            realized_pnl: self.stats.realized_pnl,
            stats: self.stats.clone(),
            win_rate: self.stats.win_rate(),
        }
    }

    /// Update the mark of an open position. Returns the marked position.
    pub fn mark(&mut self, symbol: &Symbol, price: Price, now: DateTime<Utc>) -> Option<&Position> {
        let position = self.positions.get_mut(symbol)?;
        position.mark(price, now);
        Some(position)
    }

    /// Apply one fill.
    ///
    /// # Errors
    /// - `Validation` when the order would add exposure and
    ///   `allow_new_exposure` is false
    /// - `InsufficientMargin` when the new exposure does not fit
    /// - `SuspectPrice` when the exit price is a provider fallback value
    /// - `NoOpenPosition` / `PositionChanged` when `expected_position` no
    ///   longer matches
    ///
    /// On any error the book is unchanged.
    pub fn apply_order(
        &mut self,
        order: &OrderRequest,
        policy: &OrderPolicy,
        now: DateTime<Utc>,
    ) -> EngineResult<OrderOutcome> {
        let order_side = order.side.position_side();

        let current = self.positions.get(&order.symbol);
        if let Some(expected) = order.expected_position {
            match current {
                None => return Err(EngineError::NoOpenPosition(order.symbol.clone())),
                Some(position) if position.id != expected => {
                    return Err(EngineError::PositionChanged {
                        symbol: order.symbol.clone(),
                        expected,
                        actual: position.id,
                    });
                }
                Some(_) => {}
            }
        }

        let mut scratch = Scratch {
            ledger: self.ledger,
            stats: self.stats.clone(),
            events: Vec::new(),
            realized_pnl: Decimal::ZERO,
        };

        let (transition, next) = match current {
            None => {
                let opened = scratch.open(order, order_side, order.quantity, policy, now)?;
                (Transition::Opened, Some(opened))
            }
            Some(position) if position.side == order_side => {
                let added = scratch.add(position, order, now)?;
                (Transition::Added, Some(added))
            }
            Some(position) => {
                policy
                    .suspect_prices
                    .check(&order.symbol, order.price, position.avg_price)?;

                match order.quantity.minus(position.quantity) {
                    // Order exceeds the holding: flip to the other side
                    Some(remainder) => {
                        scratch.reduce(position, position.quantity, order, now)?;
                        let opened = scratch.open(order, order_side, remainder, policy, now)?;
                        (Transition::Reversed, Some(opened))
                    }
                    None => {
                        let rest = scratch.reduce(position, order.quantity, order, now)?;
                        match rest {
                            Some(rest) => (Transition::PartiallyClosed, Some(rest)),
                            None => (Transition::Closed, None),
                        }
                    }
                }
            }
        };

        // Commit
        self.ledger = scratch.ledger;
        self.stats = scratch.stats;
        match &next {
            Some(position) => {
                self.positions.insert(order.symbol.clone(), position.clone());
            }
            None => {
                self.positions.remove(&order.symbol);
            }
        }

        debug!(
            symbol = %order.symbol,
            side = %order.side,
            quantity = %order.quantity,
            price = %order.price,
            transition = ?transition,
            realized_pnl = %scratch.realized_pnl,
            cash = %self.ledger.cash(),
            used_margin = %self.ledger.used_margin(),
            "Order applied"
        );

        Ok(OrderOutcome {
            transition,
            events: scratch.events,
            realized_pnl: scratch.realized_pnl,
            position: next,
        })
    }
}

/// `quantity * price`, or `Validation` when it leaves `Decimal` range.
fn order_value(quantity: Quantity, price: Price) -> EngineResult<Decimal> {
    quantity
        .as_decimal()
        .checked_mul(price.as_decimal())
        .ok_or_else(|| EngineError::Validation(format!("Order value {} x {} is out of range", quantity, price)))
}

fn out_of_range(order: &OrderRequest) -> EngineError {
    EngineError::Validation(format!(
        "Order {} {} @ {} is out of range",
        order.symbol, order.quantity, order.price
    ))
}

/// Working copy mutated by one order before it is committed.
struct Scratch {
    ledger: Ledger,
    stats: TradeStats,
    events: Vec<TradeEvent>,
    realized_pnl: Decimal,
}

impl Scratch {
    fn open(
        &mut self,
        order: &OrderRequest,
        side: Side,
        quantity: Quantity,
        policy: &OrderPolicy,
        now: DateTime<Utc>,
    ) -> EngineResult<Position> {
        ensure_exposure_allowed(order)?;

        let notional = order_value(quantity, order.price)?;
        self.ledger.ensure_buying_power(notional)?;
        let margin = self.ledger.margin_for(notional);
        self.ledger.reserve_margin(margin)?;

        let stop_loss = match order.stop_loss {
            Some(stop) => Some(stop),
            None => policy.protection.stop_for(side, order.price)?,
        };
        let target = match order.target {
            Some(target) => Some(target),
            None => policy.protection.target_for(side, order.price)?,
        };

        let position = Position::open(
            order.symbol.clone(),
            side,
            quantity,
            order.price,
            stop_loss,
            target,
            margin,
            now,
        );
        self.events.push(TradeEvent::entry(&position, quantity));
        Ok(position)
    }

    fn add(&mut self, position: &Position, order: &OrderRequest, now: DateTime<Utc>) -> EngineResult<Position> {
        ensure_exposure_allowed(order)?;

        let notional = order_value(order.quantity, order.price)?;
        self.ledger.ensure_buying_power(notional)?;
        let margin = self.ledger.margin_for(notional);
        self.ledger.reserve_margin(margin)?;

        let quantity = position.quantity.plus(order.quantity);
        let cost = position
            .cost_basis()
            .checked_add(notional)
            .ok_or_else(|| out_of_range(order))?;
        let avg = cost / quantity.as_decimal();

        let mut added = position.clone();
        added.quantity = quantity;
        added.avg_price = Price::new(avg)?;
        added.margin += margin;
        added.mark(order.price, now);
        if order.stop_loss.is_some() {
            added.stop_loss = order.stop_loss;
        }
        if order.target.is_some() {
            added.target = order.target;
        }

        self.events.push(TradeEvent::entry(&added, order.quantity));
        Ok(added)
    }

    /// Close `quantity` of `position`; returns what remains open.
    fn reduce(
        &mut self,
        position: &Position,
        quantity: Quantity,
        order: &OrderRequest,
        now: DateTime<Utc>,
    ) -> EngineResult<Option<Position>> {
        let pnl = position.side.pnl(position.avg_price, order.price, quantity);
        let remaining = position.quantity.minus(quantity);

        let released = match remaining {
            Some(_) => position.margin * quantity.as_decimal() / position.quantity.as_decimal(),
            None => position.margin,
        };
        self.ledger.release_margin(released)?;
        self.ledger.apply_pnl(pnl)?;
        self.stats.record(pnl);
        self.realized_pnl += pnl;

        let status = if remaining.is_some() {
            TradeStatus::Partial
        } else {
            TradeStatus::Closed
        };
        self.events.push(TradeEvent::exit(
            position,
            quantity,
            order.price,
            pnl,
            status,
            order.reason,
            now,
        ));

        Ok(remaining.map(|rest| {
            let mut reduced = position.clone();
            reduced.quantity = rest;
            reduced.margin -= released;
            reduced.mark(order.price, now);
            reduced
        }))
    }
}

fn ensure_exposure_allowed(order: &OrderRequest) -> EngineResult<()> {
    if !order.allow_new_exposure {
        return Err(EngineError::Validation(format!(
            "session closed: {} order for {} would add exposure",
            order.side, order.symbol
        )));
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
