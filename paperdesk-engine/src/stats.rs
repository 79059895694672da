//! Realized trade statistics.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Running totals over every exit fill (partial or full).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TradeStats {
    pub realized_pnl: Decimal,
    pub closed_trades: u64,
    pub winning_trades: u64,
    pub losing_trades: u64,
    pub largest_win: Decimal,
    pub largest_loss: Decimal,
}

impl TradeStats {
    /// Record the P&L of one exit fill. Break-even fills count as trades only.
    pub fn record(&mut self, pnl: Decimal) {
        self.realized_pnl += pnl;
        self.closed_trades += 1;
        if pnl > Decimal::ZERO {
            self.winning_trades += 1;
            self.largest_win = self.largest_win.max(pnl);
        } else if pnl < Decimal::ZERO {
            self.losing_trades += 1;
            self.largest_loss = self.largest_loss.min(pnl);
        }
    }

    /// Winning fills as a percentage of all exit fills; zero before any exit.
    pub fn win_rate(&self) -> Decimal {
        if self.closed_trades == 0 {
            return Decimal::ZERO;
        }
        Decimal::from(self.winning_trades) / Decimal::from(self.closed_trades) * Decimal::ONE_HUNDRED
    }
}
