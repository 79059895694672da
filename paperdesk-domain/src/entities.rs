//! Domain Entities for Paperdesk
//!
//! Core business entities with lifecycle management.

use crate::value_objects::{Price, Quantity, Side, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a Position
pub type PositionId = Uuid;

// =============================================================================
// Position
// =============================================================================

/// The one open position held for a symbol.
///
/// A position only exists while it holds a positive quantity; it is created
/// by the first fill for a symbol and removed when that quantity is fully
/// closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Quantity,
    /// Quantity-weighted average of every same-direction fill
    pub avg_price: Price,
    /// Last mark (fill price until the first live quote arrives)
    pub current_price: Price,
    pub stop_loss: Option<Price>,
    pub target: Option<Price>,
    /// Margin committed against this position in the ledger
    pub margin: Decimal,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// Open a new position filled at `price`.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        symbol: Symbol,
        side: Side,
        quantity: Quantity,
        price: Price,
        stop_loss: Option<Price>,
        target: Option<Price>,
        margin: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            symbol,
            side,
            quantity,
            avg_price: price,
            current_price: price,
            stop_loss,
            target,
            margin,
            opened_at: now,
            updated_at: now,
        }
    }

    /// Notional value at the average entry price.
    pub fn cost_basis(&self) -> Decimal {
        self.avg_price.as_decimal() * self.quantity.as_decimal()
    }

    /// Unrealized P&L at the current mark.
    pub fn unrealized_pnl(&self) -> Decimal {
        self.side.pnl(self.avg_price, self.current_price, self.quantity)
    }

    /// Unrealized P&L as a percentage of cost basis.
    pub fn unrealized_pnl_pct(&self) -> Decimal {
        pnl_percent(self.unrealized_pnl(), self.avg_price, self.quantity)
    }

    /// Update the mark price.
    pub fn mark(&mut self, price: Price, now: DateTime<Utc>) {
        self.current_price = price;
        self.updated_at = now;
    }

    /// Check whether `price` breaches the stop-loss or target.
    ///
    /// LONG: stop when `price <= stop`, target when `price >= target`.
    /// SHORT: stop when `price >= stop`, target when `price <= target`.
    /// The stop is evaluated first.
    pub fn exit_trigger(&self, price: Price) -> Option<ExitReason> {
        let stop_hit = self.stop_loss.is_some_and(|stop| match self.side {
            Side::Long => price <= stop,
            Side::Short => price >= stop,
        });
        if stop_hit {
            return Some(ExitReason::StopLoss);
        }

        let target_hit = self.target.is_some_and(|target| match self.side {
            Side::Long => price >= target,
            Side::Short => price <= target,
        });
        if target_hit {
            return Some(ExitReason::Target);
        }

        None
    }
}

/// `pnl / (entry_price * qty) * 100`
pub fn pnl_percent(pnl: Decimal, entry_price: Price, quantity: Quantity) -> Decimal {
    let basis = entry_price.as_decimal() * quantity.as_decimal();
    // Both factors are strictly positive by construction.
    pnl / basis * Decimal::ONE_HUNDRED
}

// =============================================================================
// Exit Reason
// =============================================================================

/// Why a position (or part of it) was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    /// Caller-initiated close (UI, CLI, strategy)
    Manual,
    /// Stop-loss breached
    StopLoss,
    /// Target reached
    Target,
    /// End-of-day forced square-off
    AutoExit,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Manual => write!(f, "MANUAL"),
            ExitReason::StopLoss => write!(f, "STOP_LOSS"),
            ExitReason::Target => write!(f, "TARGET"),
            ExitReason::AutoExit => write!(f, "AUTO_EXIT"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
