//! Paperdesk Daemon
//!
//! Paper trading ledger with live stop-loss/target monitoring and an
//! end-of-day square-off.
//!
//! # Usage
//!
//! ```bash
//! # Start with default configuration
//! cargo run -p paperdeskd
//!
//! # Persist the book and log as JSON
//! PAPERDESK_SNAPSHOT_PATH=book.json PAPERDESK_LOG_JSON=1 cargo run -p paperdeskd
//! ```
//!
//! # Environment Variables
//!
//! - `PAPERDESK_ENV`: Environment (test, development, production)
//! - `PAPERDESK_API_HOST` / `PAPERDESK_API_PORT`: API bind address (default: 0.0.0.0:8080)
//! - `PAPERDESK_INITIAL_CASH`: Starting cash (default: 100000)
//! - `PAPERDESK_LEVERAGE`: Margin multiplier (default: 5)
//! - `PAPERDESK_DEFAULT_STOP_LOSS_PCT` / `PAPERDESK_DEFAULT_TARGET_PCT`: Protection when omitted (default: 2 / 4)
//! - `PAPERDESK_SUSPECT_PRICES`: Comma-separated placeholder quotes to distrust (default: 1000)
//! - `PAPERDESK_POLL_INTERVAL_SECS` / `PAPERDESK_PRE_CLOSE_INTERVAL_SECS`: Monitor cadence (default: 10 / 2)
//! - `PAPERDESK_PRE_CLOSE_TIME` / `PAPERDESK_CUTOFF_TIME`: Local session times (default: 15:10 / 15:15)
//! - `PAPERDESK_PRICE_RETRY_ATTEMPTS` / `PAPERDESK_PRICE_RETRY_BACKOFF_MS`: Quote retries per fetch (default: 3 / 500)
//! - `PAPERDESK_SQUARE_OFF_ATTEMPTS`: Cutoff square-off rounds before giving up (default: 5)
//! - `PAPERDESK_MONITOR_JOIN_TIMEOUT_SECS`: Wait for the monitor to stop (default: 5)
//! - `PAPERDESK_PRICE_URL`: Quote endpoint with a `{symbol}` placeholder (default: stub feed)
//! - `PAPERDESK_PRICE_TIMEOUT_SECS`: Quote request timeout (default: 10)
//! - `PAPERDESK_SNAPSHOT_PATH`: JSON snapshot file (default: in memory only)
//! - `PAPERDESK_LOG_JSON`: Emit JSON log lines when set to 1
//! - `RUST_LOG`: Log filter

use paperdeskd::{Config, Daemon};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let filter = EnvFilter::from_default_env().add_directive("paperdeskd=info".parse()?);
    let json = std::env::var("PAPERDESK_LOG_JSON").is_ok_and(|v| v == "1");
    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry().with(fmt::layer()).with(filter).init();
    }

    // Load configuration
    let config = Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        api_host = %config.api.host,
        api_port = config.api.port,
        initial_cash = %config.engine.initial_cash,
        leverage = %config.engine.leverage,
        "Paperdesk daemon"
    );

    // Create and run daemon
    let daemon = Daemon::from_config(config)?;
    daemon.run().await?;

    Ok(())
}
