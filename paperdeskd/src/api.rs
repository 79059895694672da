//! HTTP API for the paper trading daemon.
//!
//! Provides REST endpoints for:
//! - Health check
//! - Book snapshot
//! - Orders (open, add, reduce, close, reverse)
//! - Closing one or all positions
//! - Starting and stopping the monitor
//! - Resetting the paper account

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use paperdesk_domain::{ExitReason, OrderSide, Position, Price, Quantity, Symbol, TradeEvent};
use paperdesk_engine::{BookSnapshot, EngineError, Transition};
use paperdesk_exec::{ExecError, PriceSource};

use crate::engine::{SquareOff, TradingEngine};
use crate::error::DaemonError;
use crate::event_bus::MonitorStopReason;

// =============================================================================
// API State
// =============================================================================

/// Shared state for API handlers.
pub struct ApiState {
    pub engine: Arc<TradingEngine>,
    /// Quote feed handed to the monitor when started over HTTP
    pub price_source: Arc<dyn PriceSource>,
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub monitor_running: bool,
}

/// Request to place an order.
#[derive(Debug, Deserialize)]
pub struct OrderRequestBody {
    pub symbol: String,
    pub side: String,
    pub quantity: Decimal,
    pub price: Decimal,
    #[serde(default)]
    pub stop_loss: Option<Decimal>,
    #[serde(default)]
    pub target: Option<Decimal>,
}

/// Response after an order was applied.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub transition: Transition,
    pub realized_pnl: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    pub events: Vec<TradeEvent>,
}

/// Response after closing every position.
#[derive(Debug, Serialize)]
pub struct CloseAllResponse {
    pub results: Vec<SquareOff>,
    pub closed: usize,
    /// Gone before this call reached them
    pub already_closed: usize,
    pub failed: usize,
}

impl CloseAllResponse {
    fn new(results: Vec<SquareOff>) -> Self {
        let closed = results.iter().filter(|r| r.is_closed()).count();
        let failed = results.iter().filter(|r| r.is_failed()).count();
        Self {
            already_closed: results.len() - closed - failed,
            closed,
            failed,
            results,
        }
    }
}

/// Monitor status change.
#[derive(Debug, Serialize)]
pub struct MonitorResponse {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

/// Request to reset the paper account.
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub initial_cash: Decimal,
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ErrorResponse>)>;

// =============================================================================
// Router
// =============================================================================

/// Create the API router.
pub fn create_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/snapshot", get(snapshot_handler))
        .route("/orders", post(order_handler))
        .route("/positions/close-all", post(close_all_handler))
        .route("/positions/:symbol/close", post(close_handler))
        .route("/monitor/start", post(start_monitor_handler))
        .route("/monitor/stop", post(stop_monitor_handler))
        .route("/account/reset", post(reset_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint.
async fn health_handler(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        monitor_running: state.engine.is_monitor_running().await,
    })
}

/// Ledger, positions and P&L.
async fn snapshot_handler(State(state): State<Arc<ApiState>>) -> Json<BookSnapshot> {
    Json(state.engine.snapshot().await)
}

/// Place an order.
async fn order_handler(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<OrderRequestBody>,
) -> ApiResult<(StatusCode, Json<OrderResponse>)> {
    let symbol = Symbol::new(&req.symbol).map_err(|e| bad_request(format!("Invalid symbol: {}", e)))?;

    let side = match req.side.to_uppercase().as_str() {
        "BUY" | "LONG" => OrderSide::Buy,
        "SELL" | "SHORT" => OrderSide::Sell,
        _ => {
            return Err(bad_request(format!("Invalid side: {}. Expected: BUY or SELL", req.side)));
        },
    };

    let quantity = Quantity::new(req.quantity).map_err(|e| bad_request(format!("Invalid quantity: {}", e)))?;
    let price = Price::new(req.price).map_err(|e| bad_request(format!("Invalid price: {}", e)))?;
    let stop_loss = optional_price(req.stop_loss, "stop loss")?;
    let target = optional_price(req.target, "target")?;

    let outcome = state
        .engine
        .open_or_adjust(symbol, side, quantity, price, stop_loss, target)
        .await
        .map_err(to_error_response)?;

    Ok((
        StatusCode::CREATED,
        Json(OrderResponse {
            transition: outcome.transition,
            realized_pnl: outcome.realized_pnl,
            position: outcome.position,
            events: outcome.events,
        }),
    ))
}

/// Close one position at the live price.
async fn close_handler(
    State(state): State<Arc<ApiState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<OrderResponse>> {
    let symbol = Symbol::new(&symbol).map_err(|e| bad_request(format!("Invalid symbol: {}", e)))?;

    let outcome = state
        .engine
        .close_position(&symbol, ExitReason::Manual)
        .await
        .map_err(to_error_response)?;

    Ok(Json(OrderResponse {
        transition: outcome.transition,
        realized_pnl: outcome.realized_pnl,
        position: outcome.position,
        events: outcome.events,
    }))
}

/// Close every position at the live price.
async fn close_all_handler(State(state): State<Arc<ApiState>>) -> Json<CloseAllResponse> {
    let results = state.engine.close_all(ExitReason::Manual).await;
    Json(CloseAllResponse::new(results))
}

async fn start_monitor_handler(State(state): State<Arc<ApiState>>) -> ApiResult<Json<MonitorResponse>> {
    state
        .engine
        .start_monitor(state.price_source.clone())
        .await
        .map_err(to_error_response)?;

    Ok(Json(MonitorResponse {
        running: true,
        stop_reason: None,
    }))
}

async fn stop_monitor_handler(State(state): State<Arc<ApiState>>) -> ApiResult<Json<MonitorResponse>> {
    let reason = state.engine.stop_monitor().await.map_err(to_error_response)?;

    Ok(Json(MonitorResponse {
        running: false,
        stop_reason: reason.map(|r| match r {
            MonitorStopReason::Cancelled => "cancelled".to_string(),
            MonitorStopReason::SessionClosed => "session_closed".to_string(),
        }),
    }))
}

/// Start over with a fresh account. Refused while the monitor runs.
async fn reset_handler(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<ResetRequest>,
) -> ApiResult<Json<BookSnapshot>> {
    state.engine.reset(req.initial_cash).await.map_err(to_error_response)?;
    Ok(Json(state.engine.snapshot().await))
}

// =============================================================================
// Helpers
// =============================================================================

fn optional_price(value: Option<Decimal>, field: &str) -> ApiResult<Option<Price>> {
    value
        .map(Price::new)
        .transpose()
        .map_err(|e| bad_request(format!("Invalid {}: {}", field, e)))
}

fn bad_request(error: String) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error }))
}

fn to_error_response(error: DaemonError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &error {
        DaemonError::MonitorAlreadyRunning | DaemonError::MonitorRunning(_) => StatusCode::CONFLICT,
        DaemonError::Exec(ExecError::PriceUnavailable { .. }) => StatusCode::SERVICE_UNAVAILABLE,
        DaemonError::Config(_) | DaemonError::Store(_) | DaemonError::MonitorJoinTimeout(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        },
        _ => match error.engine_error() {
            Some(EngineError::NoOpenPosition(_)) => StatusCode::NOT_FOUND,
            Some(EngineError::PositionChanged { .. }) => StatusCode::CONFLICT,
            Some(EngineError::InsufficientMargin { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::BAD_REQUEST,
        },
    };

    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::SquareOffOutcome;
    use crate::event_bus::EventBus;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use paperdesk_exec::{ManualClock, MemorySink, StubPriceSource};
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn create_test_app() -> (Router, Arc<StubPriceSource>) {
        let prices = Arc::new(StubPriceSource::new());
        let engine = TradingEngine::new(
            &Config::test(),
            prices.clone(),
            Arc::new(MemorySink::new()),
            Arc::new(ManualClock::at(10, 0)),
            Arc::new(EventBus::new(100)),
        )
        .unwrap();

        let state = Arc::new(ApiState {
            engine: Arc::new(engine),
            price_source: prices.clone(),
        });

        (create_router(state), prices)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _) = create_test_app();

        let (status, body) = send(&app, "GET", "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["monitor_running"], false);
    }

    #[tokio::test]
    async fn test_order_then_snapshot() {
        let (app, _) = create_test_app();

        let (status, body) = send(
            &app,
            "POST",
            "/orders",
            Some(json!({"symbol": "infy", "side": "BUY", "quantity": "10", "price": "1500"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["transition"], "OPENED");
        assert_eq!(body["events"].as_array().unwrap().len(), 1);

        let (status, snapshot) = send(&app, "GET", "/snapshot", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["positions"].as_array().unwrap().len(), 1);
        assert_eq!(snapshot["positions"][0]["symbol"], "INFY");
    }

    #[tokio::test]
    async fn test_order_rejections() {
        let (app, _) = create_test_app();

        let (status, _) = send(
            &app,
            "POST",
            "/orders",
            Some(json!({"symbol": "INFY", "side": "HOLD", "quantity": "1", "price": "1500"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            "POST",
            "/orders",
            Some(json!({"symbol": "INFY", "side": "BUY", "quantity": "400", "price": "1500"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["error"].as_str().unwrap().contains("margin"));
    }

    #[tokio::test]
    async fn test_close_endpoints() {
        let (app, prices) = create_test_app();
        send(
            &app,
            "POST",
            "/orders",
            Some(json!({"symbol": "TCS", "side": "SELL", "quantity": "2", "price": "3000"})),
        )
        .await;

        let (status, _) = send(&app, "POST", "/positions/TCS/close", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        prices.set_price(&Symbol::new("TCS").unwrap(), dec!(2990));
        let (status, body) = send(&app, "POST", "/positions/TCS/close", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transition"], "CLOSED");

        let (status, _) = send(&app, "POST", "/positions/TCS/close", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, "POST", "/positions/close-all", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["closed"], 0);
        assert_eq!(body["failed"], 0);
    }

    #[tokio::test]
    async fn test_monitor_endpoints() {
        let (app, _) = create_test_app();

        let (status, _) = send(&app, "POST", "/monitor/start", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, "POST", "/monitor/start", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        let (status, _) = send(&app, "POST", "/account/reset", Some(json!({"initial_cash": "5000"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(&app, "POST", "/monitor/stop", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stop_reason"], "cancelled");

        let (status, body) = send(&app, "POST", "/account/reset", Some(json!({"initial_cash": "5000"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cash"], "5000");
    }

    #[test]
    fn test_close_all_counts_only_fresh_closes() {
        let entry = |symbol: &str, outcome: SquareOffOutcome| SquareOff {
            symbol: Symbol::new(symbol).unwrap(),
            outcome,
        };
        let response = CloseAllResponse::new(vec![
            entry(
                "INFY",
                SquareOffOutcome::Closed {
                    exit_price: Price::new(dec!(1510)).unwrap(),
                    pnl: dec!(100),
                },
            ),
            entry("ITC", SquareOffOutcome::AlreadyClosed),
            entry(
                "TCS",
                SquareOffOutcome::Failed {
                    error: "no quote".to_string(),
                },
            ),
        ]);

        assert_eq!(response.closed, 1);
        assert_eq!(response.already_closed, 1);
        assert_eq!(response.failed, 1);
    }

    #[tokio::test]
    async fn test_reset_rejects_unbounded_cash() {
        let (app, _) = create_test_app();

        let (status, body) = send(
            &app,
            "POST",
            "/account/reset",
            Some(json!({"initial_cash": "79228162514264337593543950335"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("Initial cash"));

        let (status, snapshot) = send(&app, "GET", "/snapshot", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(snapshot["cash"], "100000");
    }
}
