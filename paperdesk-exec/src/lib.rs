//! Paperdesk Execution Layer
//!
//! Single-lock order execution against the shared book.
//!
//! # Architecture
//!
//! ```text
//! Manual order / Monitor trigger → Executor → Book → TradeEventSink
//! ```
//!
//! # Components
//!
//! - **Ports**: Traits for the price feed, the trade log and the clock
//! - **Fetcher**: Bounded-retry price lookups with exponential backoff
//! - **Executor**: The one critical section every fill goes through
//! - **Stub**: Test implementations for development
//!
//! # Example
//!
//! ```rust,ignore
//! use paperdesk_exec::{Executor, MemorySink, SystemClock};
//! use paperdesk_engine::{Book, Ledger, OrderPolicy};
//! use std::sync::Arc;
//!
//! let executor = Executor::new(
//!     Book::new(ledger),
//!     OrderPolicy::default(),
//!     Arc::new(MemorySink::new()),
//!     Arc::new(SystemClock),
//! );
//!
//! let outcome = executor.execute(order).await?;
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod executor;
pub mod fetcher;
pub mod ports;
pub mod stub;

// Re-exports for convenience
pub use error::{ExecError, ExecResult};
pub use executor::Executor;
pub use fetcher::{fetch_price, RetryPolicy};
pub use ports::{Clock, NullSink, PriceSource, SystemClock, TradeEventSink};
pub use stub::{ManualClock, MemorySink, StubPriceSource};
