//! Margin ledger: cash, committed margin and leverage.

use paperdesk_domain::Leverage;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Cash and margin bookkeeping for one paper account.
///
/// # Invariants
/// - `used_margin >= 0`
/// - Every reservation is all-or-nothing.
///
/// Cash starts in `0..=MAX_CASH` but may go negative afterwards: leveraged
/// losses can exceed the account while margin is still committed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    cash: Decimal,
    used_margin: Decimal,
    leverage: Leverage,
}

impl Ledger {
    /// Largest opening balance.
    pub const MAX_CASH: Decimal = Decimal::from_parts(0xA4C6_8000, 0x3_8D7E, 0, false, 0); // 1_000_000_000_000_000

    /// Create a ledger with no margin in use.
    ///
    /// # Errors
    /// Returns `EngineError::Validation` if `cash` is negative or above `MAX_CASH`.
    pub fn new(cash: Decimal, leverage: Leverage) -> EngineResult<Self> {
        if cash < Decimal::ZERO || cash > Self::MAX_CASH {
            return Err(EngineError::Validation(format!(
                "Initial cash must be within 0..={}, got {}",
                Self::MAX_CASH,
                cash
            )));
        }
        Self::from_parts(cash, Decimal::ZERO, leverage)
    }

    /// Rebuild a ledger from persisted values.
    ///
    /// Negative cash is accepted here since realized losses can produce it.
    pub fn from_parts(cash: Decimal, used_margin: Decimal, leverage: Leverage) -> EngineResult<Self> {
        if used_margin < Decimal::ZERO {
            return Err(EngineError::InvariantViolation(format!(
                "used margin must be >= 0, got {}",
                used_margin
            )));
        }
        Ok(Self {
            cash,
            used_margin,
            leverage,
        })
    }

    /// Cash balance (moves only with realized P&L).
    pub fn cash(&self) -> Decimal {
        self.cash
    }

    /// Margin committed to open positions.
    pub fn used_margin(&self) -> Decimal {
        self.used_margin
    }

    /// Leverage multiplier.
    pub fn leverage(&self) -> Leverage {
        self.leverage
    }

    /// `max(0, cash * leverage - used_margin)`, saturating at `Decimal::MAX`.
    pub fn available_margin(&self) -> Decimal {
        match self
            .cash
            .checked_mul(self.leverage.as_decimal())
            .and_then(|power| power.checked_sub(self.used_margin))
        {
            Some(available) => available.max(Decimal::ZERO),
            None if self.cash > Decimal::ZERO => Decimal::MAX,
            None => Decimal::ZERO,
        }
    }

    /// Margin an order of `notional` value commits.
    pub fn margin_for(&self, notional: Decimal) -> Decimal {
        self.leverage.margin_for(notional)
    }

    /// Fail unless `notional` fits in the current buying power.
    pub fn ensure_buying_power(&self, notional: Decimal) -> EngineResult<()> {
        let available = self.available_margin();
        if notional > available {
            return Err(EngineError::InsufficientMargin {
                required: notional,
                available,
            });
        }
        Ok(())
    }

    /// Commit `amount` of margin.
    ///
    /// # Errors
    /// `InsufficientMargin` if `amount > available_margin()`; nothing changes.
    pub fn reserve_margin(&mut self, amount: Decimal) -> EngineResult<()> {
        if amount < Decimal::ZERO {
            return Err(EngineError::Validation(format!("Cannot reserve negative margin {}", amount)));
        }
        let available = self.available_margin();
        if amount > available {
            return Err(EngineError::InsufficientMargin {
                required: amount,
                available,
            });
        }
        self.used_margin += amount;
        Ok(())
    }

    /// Return `amount` of committed margin.
    pub fn release_margin(&mut self, amount: Decimal) -> EngineResult<()> {
        if amount < Decimal::ZERO || amount > self.used_margin {
            return Err(EngineError::InvariantViolation(format!(
                "release of {} with {} in use",
                amount, self.used_margin
            )));
        }
        self.used_margin -= amount;
        Ok(())
    }

    /// Credit (or debit, when negative) realized P&L to cash.
    ///
    /// # Errors
    /// Returns `EngineError::Validation` if the balance would leave `Decimal` range.
    pub fn apply_pnl(&mut self, amount: Decimal) -> EngineResult<()> {
        self.cash = self.cash.checked_add(amount).ok_or_else(|| {
            EngineError::Validation(format!("Realized P&L {} overflows cash {}", amount, self.cash))
        })?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
