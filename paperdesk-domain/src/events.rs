//! Trade lifecycle events
//!
//! Emitted by the ledger for every fill and handed to the trade event sink.
//! The shape is flat so a sink can write it as a row without knowing the
//! domain.

use crate::entities::{pnl_percent, ExitReason, Position, PositionId};
use crate::value_objects::{Price, Quantity, Side, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status carried by a [`TradeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeStatus {
    /// Position opened or added to
    Open,
    /// Position reduced, still open
    Partial,
    /// Position fully closed
    Closed,
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeStatus::Open => write!(f, "OPEN"),
            TradeStatus::Partial => write!(f, "PARTIAL"),
            TradeStatus::Closed => write!(f, "CLOSED"),
        }
    }
}

/// A structured record of one fill against a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEvent {
    /// Id of the position this fill belongs to
    pub id: PositionId,
    pub symbol: Symbol,
    pub side: Side,
    /// Quantity filled by this event
    pub quantity: Quantity,
    pub entry_price: Price,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<Price>,
    pub entry_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_time: Option<DateTime<Utc>>,
    pub stoploss: Option<Price>,
    pub target: Option<Price>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl_pct: Option<Decimal>,
    pub status: TradeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ExitReason>,
}

impl TradeEvent {
    /// Entry (or add) fill: `quantity` was bought/sold into `position`.
    ///
    /// `position` is the state after the fill, so `entry_price` is the new
    /// average.
    pub fn entry(position: &Position, quantity: Quantity) -> Self {
        Self {
            id: position.id,
            symbol: position.symbol.clone(),
            side: position.side,
            quantity,
            entry_price: position.avg_price,
            exit_price: None,
            entry_time: position.opened_at,
            exit_time: None,
            stoploss: position.stop_loss,
            target: position.target,
            pnl: None,
            pnl_pct: None,
            status: TradeStatus::Open,
            reason: None,
        }
    }

    /// Exit fill of `quantity` from `position` (state before the fill).
    pub fn exit(
        position: &Position,
        quantity: Quantity,
        exit_price: Price,
        pnl: Decimal,
        status: TradeStatus,
        reason: ExitReason,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: position.id,
            symbol: position.symbol.clone(),
            side: position.side,
            quantity,
            entry_price: position.avg_price,
            exit_price: Some(exit_price),
            entry_time: position.opened_at,
            exit_time: Some(at),
            stoploss: position.stop_loss,
            target: position.target,
            pnl: Some(pnl),
            pnl_pct: Some(pnl_percent(pnl, position.avg_price, quantity)),
            status,
            reason: Some(reason),
        }
    }

    /// Whether this event realized P&L.
    pub fn is_exit(&self) -> bool {
        !matches!(self.status, TradeStatus::Open)
    }
}
