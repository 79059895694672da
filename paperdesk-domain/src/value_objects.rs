//! Value Objects for the Paperdesk Domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain errors for value object validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Price must be positive
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Quantity must be positive
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Symbol must be a valid ticker
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Side must be LONG/SHORT (or BUY/SELL)
    #[error("Invalid side: {0}")]
    InvalidSide(String),

    /// Leverage must be at least 1x
    #[error("Invalid leverage: {0}")]
    InvalidLeverage(String),

    /// Percentage out of range
    #[error("Invalid percentage: {0}")]
    InvalidPercentage(String),
}

// =============================================================================
// Price
// =============================================================================

/// Price represents a positive decimal price
///
/// # Invariants
/// - Must be > 0
/// - Must be <= `Price::MAX`
///
/// A price feed that has no quote must say so with an error, never with a
/// zero price; this type makes a zero mark unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Largest accepted price; keeps `price * quantity` well inside `Decimal` range.
    pub const MAX: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0); // 1_000_000_000_000

    /// Create a new Price with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPrice` if value <= 0 or above `Price::MAX`
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value <= Decimal::ZERO {
            return Err(DomainError::InvalidPrice(format!("Price must be positive, got {}", value)));
        }
        if value > Self::MAX {
            return Err(DomainError::InvalidPrice(format!(
                "Price must be <= {}, got {}",
                Self::MAX,
                value
            )));
        }
        Ok(Self(value))
    }

    /// Get the underlying Decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Scale this price by `1 + pct/100` (use a negative pct to scale down).
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPrice` if the result is not positive.
    pub fn offset_pct(&self, pct: Decimal) -> Result<Self, DomainError> {
        Self::new(self.0 * (Decimal::ONE + pct / Decimal::ONE_HUNDRED))
    }
}

impl TryFrom<Decimal> for Price {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Quantity
// =============================================================================

/// Quantity represents a positive decimal quantity
///
/// # Invariants
/// - Must be > 0
/// - Must be <= `Quantity::MAX`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Quantity(Decimal);

impl Quantity {
    /// Largest accepted quantity.
    pub const MAX: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0); // 1_000_000_000_000

    /// Create a new Quantity with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidQuantity` if value <= 0 or above `Quantity::MAX`
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value <= Decimal::ZERO {
            return Err(DomainError::InvalidQuantity(format!(
                "Quantity must be positive, got {}",
                value
            )));
        }
        if value > Self::MAX {
            return Err(DomainError::InvalidQuantity(format!(
                "Quantity must be <= {}, got {}",
                Self::MAX,
                value
            )));
        }
        Ok(Self(value))
    }

    /// Get the underlying Decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Add two quantities.
    pub fn plus(&self, other: Quantity) -> Quantity {
        Quantity(self.0 + other.0)
    }

    /// Subtract `other`, returning `None` when nothing would remain.
    pub fn minus(&self, other: Quantity) -> Option<Quantity> {
        let rest = self.0 - other.0;
        if rest > Decimal::ZERO {
            Some(Quantity(rest))
        } else {
            None
        }
    }
}

impl TryFrom<Decimal> for Quantity {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for Decimal {
    fn from(quantity: Quantity) -> Self {
        quantity.0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Symbol
// =============================================================================

/// Symbol represents an exchange ticker (e.g., RELIANCE, TCS, M&M)
///
/// # Invariants
/// - Non-empty, at most 32 characters
/// - Uppercase ASCII letters, digits, and `-`, `_`, `&`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Maximum ticker length accepted.
    pub const MAX_LEN: usize = 32;

    /// Create a Symbol from a ticker string.
    ///
    /// Input is trimmed and upper-cased.
    ///
    /// # Examples
    /// ```
    /// # use paperdesk_domain::value_objects::Symbol;
    /// let symbol = Symbol::new("reliance").unwrap();
    /// assert_eq!(symbol.as_str(), "RELIANCE");
    /// ```
    ///
    /// # Errors
    /// Returns `DomainError::InvalidSymbol` if the ticker is empty, too long,
    /// or contains unsupported characters.
    pub fn new(ticker: &str) -> Result<Self, DomainError> {
        let ticker = ticker.trim().to_ascii_uppercase();

        if ticker.is_empty() {
            return Err(DomainError::InvalidSymbol("Symbol must be non-empty".to_string()));
        }
        if ticker.len() > Self::MAX_LEN {
            return Err(DomainError::InvalidSymbol(format!(
                "Symbol longer than {} characters: {}",
                Self::MAX_LEN,
                ticker
            )));
        }
        if !ticker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '&'))
        {
            return Err(DomainError::InvalidSymbol(format!("Unsupported characters in {}", ticker)));
        }

        Ok(Self(ticker))
    }

    /// Get the ticker as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Symbol {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

impl FromStr for Symbol {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Side / OrderSide
// =============================================================================

/// Side represents the direction of an open position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Long position (buy low, sell high)
    Long,
    /// Short position (sell high, buy low)
    Short,
}

impl Side {
    /// Get the entry action for this side
    ///
    /// Long → Buy, Short → Sell
    pub fn entry_action(&self) -> OrderSide {
        match self {
            Side::Long => OrderSide::Buy,
            Side::Short => OrderSide::Sell,
        }
    }

    /// Get the exit action for this side
    ///
    /// Long → Sell, Short → Buy
    pub fn exit_action(&self) -> OrderSide {
        match self {
            Side::Long => OrderSide::Sell,
            Side::Short => OrderSide::Buy,
        }
    }

    /// The other direction.
    pub fn opposite(&self) -> Side {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// Side-aware P&L of moving `quantity` from `entry` to `exit`.
    ///
    /// LONG: `(exit - entry) * qty`, SHORT: `(entry - exit) * qty`.
    pub fn pnl(&self, entry: Price, exit: Price, quantity: Quantity) -> Decimal {
        let qty = quantity.as_decimal();
        match self {
            Side::Long => (exit.as_decimal() - entry.as_decimal()) * qty,
            Side::Short => (entry.as_decimal() - exit.as_decimal()) * qty,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

impl FromStr for Side {
    type Err = DomainError;

    /// Accepts LONG/SHORT as well as the order verbs BUY/SELL.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LONG" | "BUY" => Ok(Side::Long),
            "SHORT" | "SELL" => Ok(Side::Short),
            other => Err(DomainError::InvalidSide(format!(
                "{}. Expected: LONG, SHORT, BUY or SELL",
                other
            ))),
        }
    }
}

/// OrderSide represents the order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    /// Buy order
    Buy,
    /// Sell order
    Sell,
}

impl OrderSide {
    /// The position direction this order opens or adds to.
    pub fn position_side(&self) -> Side {
        match self {
            OrderSide::Buy => Side::Long,
            OrderSide::Sell => Side::Short,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

// =============================================================================
// Leverage
// =============================================================================

/// Leverage multiplier applied to cash to obtain buying power
///
/// # Invariants
/// - Must be >= 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Leverage(Decimal);

impl Leverage {
    /// Create a leverage multiplier.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidLeverage` if value < 1
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value < Decimal::ONE {
            return Err(DomainError::InvalidLeverage(format!("Leverage must be >= 1, got {}", value)));
        }
        Ok(Self(value))
    }

    /// Get the underlying Decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Margin committed against `notional` at this leverage.
    pub fn margin_for(&self, notional: Decimal) -> Decimal {
        notional / self.0
    }
}

impl TryFrom<Decimal> for Leverage {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Leverage> for Decimal {
    fn from(leverage: Leverage) -> Self {
        leverage.0
    }
}

impl fmt::Display for Leverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.0)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // Price tests
    #[test]
    fn test_price_validation() {
        assert!(Price::new(dec!(100.0)).is_ok());
        assert!(Price::new(dec!(0.01)).is_ok());
        assert!(Price::new(dec!(-1.0)).is_err());
        assert!(Price::new(dec!(0.0)).is_err());
    }

    #[test]
    fn test_price_offset_pct() {
        let price = Price::new(dec!(100)).unwrap();
        assert_eq!(price.offset_pct(dec!(-2)).unwrap().as_decimal(), dec!(98));
        assert_eq!(price.offset_pct(dec!(4)).unwrap().as_decimal(), dec!(104));
        assert!(price.offset_pct(dec!(-100)).is_err());
    }

    #[test]
    fn test_price_deserialize_rejects_zero() {
        assert!(serde_json::from_str::<Price>("\"0\"").is_err());
        assert!(serde_json::from_str::<Price>("0").is_err());
        let price: Price = serde_json::from_str("\"2895.5\"").unwrap();
        assert_eq!(price.as_decimal(), dec!(2895.5));
    }

    // Quantity tests
    #[test]
    fn test_quantity_validation() {
        assert!(Quantity::new(dec!(1)).is_ok());
        assert!(Quantity::new(dec!(100.0)).is_ok());
        assert!(Quantity::new(dec!(-0.1)).is_err());
        assert!(Quantity::new(dec!(0.0)).is_err());
        assert!(Quantity::new(Quantity::MAX).is_ok());
        assert!(Quantity::new(Decimal::MAX).is_err());
    }

    #[test]
    fn test_price_upper_bound() {
        assert!(Price::new(Price::MAX).is_ok());
        assert!(Price::new(Decimal::MAX).is_err());
        assert!(serde_json::from_str::<Price>("\"79228162514264337593543950335\"").is_err());
    }

    #[test]
    fn test_quantity_minus() {
        let ten = Quantity::new(dec!(10)).unwrap();
        let four = Quantity::new(dec!(4)).unwrap();
        assert_eq!(ten.minus(four).unwrap().as_decimal(), dec!(6));
        assert!(ten.minus(ten).is_none());
        assert!(four.minus(ten).is_none());
        assert_eq!(ten.plus(four).as_decimal(), dec!(14));
    }

    // Symbol tests
    #[test]
    fn test_symbol_normalizes() {
        let symbol = Symbol::new("  tcs ").unwrap();
        assert_eq!(symbol.as_str(), "TCS");
        assert_eq!(Symbol::new("M&M").unwrap().to_string(), "M&M");
        assert_eq!(Symbol::new("BAJAJ-AUTO").unwrap().as_str(), "BAJAJ-AUTO");
    }

    #[test]
    fn test_symbol_invalid() {
        assert!(Symbol::new("").is_err());
        assert!(Symbol::new("   ").is_err());
        assert!(Symbol::new("NSE:TCS").is_err());
        assert!(Symbol::new(&"X".repeat(33)).is_err());
    }

    // Side tests
    #[test]
    fn test_side_actions() {
        assert_eq!(Side::Long.entry_action(), OrderSide::Buy);
        assert_eq!(Side::Long.exit_action(), OrderSide::Sell);
        assert_eq!(Side::Short.entry_action(), OrderSide::Sell);
        assert_eq!(Side::Short.exit_action(), OrderSide::Buy);
        assert_eq!(OrderSide::Sell.position_side(), Side::Short);
    }

    #[test]
    fn test_side_parse() {
        assert_eq!("buy".parse::<Side>().unwrap(), Side::Long);
        assert_eq!("SHORT".parse::<Side>().unwrap(), Side::Short);
        assert!("hold".parse::<Side>().is_err());
    }

    #[test]
    fn test_side_aware_pnl() {
        let qty = Quantity::new(dec!(10)).unwrap();
        let p100 = Price::new(dec!(100)).unwrap();
        let p110 = Price::new(dec!(110)).unwrap();
        let p90 = Price::new(dec!(90)).unwrap();

        assert_eq!(Side::Long.pnl(p100, p110, qty), dec!(100));
        assert_eq!(Side::Short.pnl(p100, p90, qty), dec!(100));
        assert_eq!(Side::Short.pnl(p100, p110, qty), dec!(-100));
    }

    // Leverage tests
    #[test]
    fn test_leverage_validation() {
        assert!(Leverage::new(dec!(1)).is_ok());
        assert!(Leverage::new(dec!(0.5)).is_err());
        let lev = Leverage::new(dec!(5)).unwrap();
        assert_eq!(lev.margin_for(dec!(600000)), dec!(120000));
    }
}
