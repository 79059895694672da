//! Paperdesk Engine Layer
//!
//! Pure bookkeeping, deterministic, no I/O.
//! Takes an order and the current book, returns the committed outcome.

#![warn(clippy::all)]

pub mod book;
pub mod error;
pub mod ledger;
pub mod policy;
pub mod session;
pub mod stats;

pub use book::{Book, BookSnapshot, BookState, OrderOutcome, OrderRequest, Transition};
pub use error::{EngineError, EngineResult};
pub use ledger::Ledger;
pub use policy::{OrderPolicy, ProtectionDefaults, SuspectPricePolicy};
pub use session::{SessionPhase, SessionSchedule};
pub use stats::TradeStats;
