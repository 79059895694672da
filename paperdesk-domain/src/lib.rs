//! Paperdesk Domain Layer
//!
//! Pure domain logic with zero I/O dependencies.
//! Contains entities, value objects, and trade events.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
#[allow(missing_docs)]
pub mod entities;
#[allow(missing_docs)]
pub mod events;
pub mod value_objects;

// Re-export commonly used types
pub use entities::{pnl_percent, ExitReason, Position, PositionId};
pub use events::{TradeEvent, TradeStatus};
pub use value_objects::{DomainError, Leverage, OrderSide, Price, Quantity, Side, Symbol};
