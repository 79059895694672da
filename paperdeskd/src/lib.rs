//! Paperdesk Daemon Library
//!
//! Runtime for the paper trading ledger.
//!
//! # Architecture
//!
//! ```text
//! CLI / GUI → API Server → Trading Engine → Executor → Book (ledger + positions)
//!                               ↑               │
//!                            Monitor            └→ Event Bus (fills, exits)
//!                               ↑
//!                          Price Source
//! ```
//!
//! # Components
//!
//! - **Daemon**: Main runtime orchestrator
//! - **Trading Engine**: Orders, closes, square-off, snapshot, monitor control
//! - **Monitor**: Stop-loss/target exits and the end-of-day cutoff
//! - **Event Bus**: Internal communication (fills, marks, exits)
//! - **API**: HTTP endpoints
//! - **Price Feed**: HTTP quote source
//! - **Config**: Environment-based configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use paperdeskd::{Config, Daemon};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let daemon = Daemon::new_stub(config)?;
//!     daemon.run().await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod daemon;
pub mod engine;
pub mod error;
pub mod event_bus;
pub mod monitor;
pub mod price_feed;

// Re-exports for convenience
pub use config::{ApiConfig, Config, EngineConfig, Environment, MonitorConfig, PriceFeedConfig};
pub use daemon::Daemon;
pub use engine::{SquareOff, SquareOffOutcome, TradingEngine};
pub use error::{DaemonError, DaemonResult};
pub use event_bus::{BusSink, DaemonEvent, EventBus, MonitorStopReason};
pub use monitor::{CycleReport, Monitor};
pub use price_feed::HttpPriceSource;
