//! Daemon: Main runtime orchestrator.
//!
//! The Daemon ties together all components:
//! - Trading Engine (ledger, positions, orders)
//! - Monitor (stop-loss, target and cutoff exits)
//! - Event Bus (internal communication)
//! - API Server (HTTP endpoints)
//! - Snapshot Store (state across restarts)
//!
//! # Lifecycle
//!
//! 1. Load configuration
//! 2. Initialize components
//! 3. Restore the book from the last snapshot
//! 4. Start API server
//! 5. Start the monitor
//! 6. Main event loop (log fills, exits, square-off failures)
//! 7. Graceful shutdown on SIGINT: stop the monitor, persist

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use paperdesk_exec::{Clock, PriceSource, StubPriceSource, SystemClock};
use paperdesk_store::{JsonFileStore, MemorySnapshotStore, SnapshotStore};

use crate::api::{create_router, ApiState};
use crate::config::Config;
use crate::engine::TradingEngine;
use crate::error::{DaemonError, DaemonResult};
use crate::event_bus::{BusSink, DaemonEvent, EventBus};
use crate::price_feed::HttpPriceSource;

// =============================================================================
// Daemon
// =============================================================================

/// The paper trading daemon.
pub struct Daemon {
    /// Configuration
    config: Config,
    /// Trading engine
    engine: Arc<TradingEngine>,
    /// Live quotes for the monitor and manual closes
    price_source: Arc<dyn PriceSource>,
    /// Event bus
    event_bus: Arc<EventBus>,
}

impl Daemon {
    /// Create a daemon reading quotes from `price_source`.
    pub fn new(config: Config, price_source: Arc<dyn PriceSource>) -> DaemonResult<Self> {
        Self::with_clock(config, price_source, Arc::new(SystemClock))
    }

    /// Create a daemon whose session schedule follows `clock`.
    pub fn with_clock(config: Config, price_source: Arc<dyn PriceSource>, clock: Arc<dyn Clock>) -> DaemonResult<Self> {
        let event_bus = Arc::new(EventBus::new(1000));
        let sink = Arc::new(BusSink::new(event_bus.clone()));

        let store: Arc<dyn SnapshotStore> = match &config.snapshot_path {
            Some(path) => Arc::new(JsonFileStore::new(path.clone())),
            None => Arc::new(MemorySnapshotStore::new()),
        };

        let engine = TradingEngine::new(
            &config,
            price_source.clone(),
            sink,
            clock,
            event_bus.clone(),
        )?
        .with_store(store);

        Ok(Self {
            config,
            engine: Arc::new(engine),
            price_source,
            event_bus,
        })
    }

    /// Create a daemon with the HTTP quote feed from `config`, falling back to
    /// the stub feed when none is configured.
    pub fn from_config(config: Config) -> DaemonResult<Self> {
        match config.price_feed.clone() {
            Some(feed) => {
                info!(url = %feed.url_template, "Using HTTP price feed");
                Self::new(config, Arc::new(HttpPriceSource::new(feed)))
            },
            None => {
                warn!("PAPERDESK_PRICE_URL not set, using the stub price feed");
                Self::new_stub(config)
            },
        }
    }

    /// Create a daemon with an empty stub quote feed (for testing/development).
    pub fn new_stub(config: Config) -> DaemonResult<Self> {
        Self::new(config, Arc::new(StubPriceSource::new()))
    }

    pub fn engine(&self) -> &Arc<TradingEngine> {
        &self.engine
    }

    /// Run the daemon.
    ///
    /// This method blocks until shutdown is requested (SIGINT).
    pub async fn run(self) -> DaemonResult<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            "Starting paperdesk daemon"
        );

        // 1. Restore book
        self.restore().await?;

        // 2. Start API server
        let api_addr = self.start_api_server().await?;
        info!(%api_addr, "API server started");

        // 3. Subscribe before the monitor can publish
        let mut event_receiver = self.event_bus.subscribe();

        // 4. Start monitor
        self.engine.start_monitor(self.price_source.clone()).await?;

        // 5. Main event loop
        info!("Entering main event loop");
        loop {
            tokio::select! {
                received = event_receiver.recv() => {
                    match received {
                        Ok(event) => {
                            if let Err(e) = self.handle_event(event) {
                                if matches!(e, DaemonError::Shutdown) {
                                    break;
                                }
                                error!(error = %e, "Error handling event");
                            }
                        },
                        Err(RecvError::Lagged(missed)) => {
                            warn!(missed, "Event receiver lagged");
                        },
                        Err(RecvError::Closed) => break,
                    }
                },

                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                },
            }
        }

        // 6. Graceful shutdown
        self.shutdown().await
    }

    /// Restore the book from the snapshot store.
    async fn restore(&self) -> DaemonResult<()> {
        if self.engine.restore().await? {
            let snapshot = self.engine.snapshot().await;
            info!(
                positions = snapshot.positions.len(),
                cash = %snapshot.cash,
                used_margin = %snapshot.used_margin,
                "Resuming with restored book"
            );
        } else {
            info!(initial_cash = %self.config.engine.initial_cash, "Starting with a fresh paper account");
        }
        Ok(())
    }

    /// Start the API server.
    async fn start_api_server(&self) -> DaemonResult<SocketAddr> {
        let state = Arc::new(ApiState {
            engine: self.engine.clone(),
            price_source: self.price_source.clone(),
        });

        let router = create_router(state);
        let addr = format!("{}:{}", self.config.api.host, self.config.api.port);

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| DaemonError::Config(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| DaemonError::Config(format!("Failed to get local address: {}", e)))?;

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!(error = %e, "API server error");
            }
        });

        Ok(local_addr)
    }

    /// Handle an event from the event bus.
    fn handle_event(&self, event: DaemonEvent) -> DaemonResult<()> {
        match event {
            DaemonEvent::Trade(trade) => {
                info!(
                    position_id = %trade.id,
                    symbol = %trade.symbol,
                    side = %trade.side,
                    quantity = %trade.quantity,
                    status = %trade.status,
                    pnl = ?trade.pnl,
                    reason = ?trade.reason,
                    "Trade recorded"
                );
            },

            DaemonEvent::PriceMarked {
                symbol,
                price,
                unrealized_pnl,
                ..
            } => {
                debug!(%symbol, %price, %unrealized_pnl, "Position marked");
            },

            DaemonEvent::ExitTriggered {
                position_id,
                symbol,
                reason,
                price,
            } => {
                info!(%position_id, %symbol, %reason, %price, "Exit triggered");
            },

            DaemonEvent::SquareOffFailed { symbol, error } => {
                error!(%symbol, %error, "Position left open after cutoff, manual intervention required");
            },

            DaemonEvent::MonitorStopped { reason } => {
                info!(?reason, "Monitor stopped");
            },

            DaemonEvent::Shutdown => {
                info!("Shutdown event received");
                return Err(DaemonError::Shutdown);
            },
        }

        Ok(())
    }

    /// Graceful shutdown.
    async fn shutdown(&self) -> DaemonResult<()> {
        info!("Initiating graceful shutdown");

        if let Err(e) = self.engine.stop_monitor().await {
            error!(error = %e, "Monitor did not shut down cleanly");
        }

        self.engine.persist().await?;
        self.event_bus.send(DaemonEvent::Shutdown);

        let snapshot = self.engine.snapshot().await;
        info!(
            open_positions = snapshot.positions.len(),
            cash = %snapshot.cash,
            realized_pnl = %snapshot.realized_pnl,
            "Shutdown complete"
        );

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
