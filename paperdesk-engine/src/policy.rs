//! Order policies: default protection levels and suspect-price screening.

use paperdesk_domain::{Price, Side, Symbol};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Protection Defaults
// =============================================================================

/// Percent offsets used when an order omits stop-loss or target.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProtectionDefaults {
    /// Stop distance from the fill price, in percent
    pub stop_loss_pct: Option<Decimal>,
    /// Target distance from the fill price, in percent
    pub target_pct: Option<Decimal>,
}

impl ProtectionDefaults {
    /// No defaults: positions without explicit levels are never triggered.
    pub fn none() -> Self {
        Self::default()
    }

    /// Derive a stop from `price` for a position on `side`.
    ///
    /// LONG stops sit below the fill, SHORT stops above.
    pub fn stop_for(&self, side: Side, price: Price) -> EngineResult<Option<Price>> {
        self.stop_loss_pct
            .map(|pct| {
                let signed = match side {
                    Side::Long => -pct,
                    Side::Short => pct,
                };
                price.offset_pct(signed).map_err(EngineError::from)
            })
            .transpose()
    }

    /// Derive a target from `price` for a position on `side`.
    pub fn target_for(&self, side: Side, price: Price) -> EngineResult<Option<Price>> {
        self.target_pct
            .map(|pct| {
                let signed = match side {
                    Side::Long => pct,
                    Side::Short => -pct,
                };
                price.offset_pct(signed).map_err(EngineError::from)
            })
            .transpose()
    }
}

// =============================================================================
// Suspect Prices
// =============================================================================

/// Quotes a data provider is known to return when it has no real price.
///
/// A quote equal to one of these values is treated as bogus unless it also
/// equals the position's entry price.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SuspectPricePolicy {
    sentinels: Vec<Decimal>,
}

impl SuspectPricePolicy {
    pub fn new(sentinels: impl IntoIterator<Item = Decimal>) -> Self {
        Self {
            sentinels: sentinels.into_iter().collect(),
        }
    }

    /// Accept every quote.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn sentinels(&self) -> &[Decimal] {
        &self.sentinels
    }

    pub fn is_suspect(&self, price: Price, entry: Price) -> bool {
        price != entry && self.sentinels.contains(&price.as_decimal())
    }

    /// Reject a close of `symbol` at `price` if the quote is suspect.
    pub fn check(&self, symbol: &Symbol, price: Price, entry: Price) -> EngineResult<()> {
        if self.is_suspect(price, entry) {
            return Err(EngineError::SuspectPrice {
                symbol: symbol.clone(),
                price: price.as_decimal(),
                entry: entry.as_decimal(),
            });
        }
        Ok(())
    }
}

/// Everything `Book::apply_order` needs besides the order itself.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OrderPolicy {
    pub protection: ProtectionDefaults,
    pub suspect_prices: SuspectPricePolicy,
}

// =============================================================================
// Tests
// =============================================================================
