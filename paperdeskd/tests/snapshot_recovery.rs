//! Restart tests: the book survives a daemon restart through the JSON
//! snapshot file, and a snapshot that breaks the ledger invariants is
//! refused.

use std::sync::Arc;

use paperdesk_domain::{ExitReason, OrderSide, Price, Quantity, Symbol};
use paperdesk_exec::{ManualClock, MemorySink, StubPriceSource};
use paperdesk_store::{JsonFileStore, SnapshotStore};
use paperdeskd::{Config, DaemonError, EventBus, TradingEngine};
use rust_decimal_macros::dec;

fn engine_with_file(path: &std::path::Path, prices: Arc<StubPriceSource>) -> TradingEngine {
    TradingEngine::new(
        &Config::test(),
        prices,
        Arc::new(MemorySink::new()),
        Arc::new(ManualClock::at(9, 45)),
        Arc::new(EventBus::new(100)),
    )
    .unwrap()
    .with_store(Arc::new(JsonFileStore::new(path)))
}

fn sym(s: &str) -> Symbol {
    Symbol::new(s).unwrap()
}

#[tokio::test]
async fn test_restart_resumes_positions_and_stats() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("book.json");
    let prices = Arc::new(StubPriceSource::new());

    let first = engine_with_file(&path, prices.clone());
    first
        .open_or_adjust(
            sym("INFY"),
            OrderSide::Buy,
            Quantity::new(dec!(10)).unwrap(),
            Price::new(dec!(1500)).unwrap(),
            Some(Price::new(dec!(1450)).unwrap()),
            None,
        )
        .await
        .unwrap();
    first
        .open_or_adjust(
            sym("TCS"),
            OrderSide::Sell,
            Quantity::new(dec!(5)).unwrap(),
            Price::new(dec!(3000)).unwrap(),
            None,
            None,
        )
        .await
        .unwrap();
    prices.set_price(&sym("TCS"), dec!(2980));
    first.close_position(&sym("TCS"), ExitReason::Manual).await.unwrap();
    first.persist().await.unwrap();
    let before = first.snapshot().await;
    drop(first);

    let second = engine_with_file(&path, prices);
    assert!(second.restore().await.unwrap());

    let after = second.snapshot().await;
    assert_eq!(after.cash, dec!(100100));
    assert_eq!(after.used_margin, dec!(3000));
    assert_eq!(after.stats.closed_trades, 1);
    assert_eq!(after.positions, before.positions);
    assert_eq!(after.positions[0].stop_loss, Some(Price::new(dec!(1450)).unwrap()));

    // The restored position keeps its id, so stale-close protection still holds
    let reduced = second
        .open_or_adjust(
            sym("INFY"),
            OrderSide::Sell,
            Quantity::new(dec!(4)).unwrap(),
            Price::new(dec!(1510)).unwrap(),
            None,
            None,
        )
        .await
        .unwrap();
    assert_eq!(reduced.position.unwrap().id, before.positions[0].id);
}

#[tokio::test]
async fn test_missing_snapshot_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_with_file(&dir.path().join("absent.json"), Arc::new(StubPriceSource::new()));

    assert!(!engine.restore().await.unwrap());
    assert_eq!(engine.snapshot().await.cash, dec!(100000));
}

#[tokio::test]
async fn test_inconsistent_snapshot_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("book.json");
    let prices = Arc::new(StubPriceSource::new());

    let engine = engine_with_file(&path, prices.clone());
    engine
        .open_or_adjust(
            sym("ITC"),
            OrderSide::Buy,
            Quantity::new(dec!(100)).unwrap(),
            Price::new(dec!(400)).unwrap(),
            None,
            None,
        )
        .await
        .unwrap();

    // Positions without the margin that backs them
    let store = JsonFileStore::new(&path);
    let mut state = engine.executor().state().await;
    state.ledger = paperdesk_engine::Ledger::new(dec!(100000), state.ledger.leverage()).unwrap();
    store.save(&state).await.unwrap();

    let restarted = engine_with_file(&path, prices);
    let err = restarted.restore().await.unwrap_err();
    assert!(matches!(err, DaemonError::Engine(_)));
    assert!(restarted.snapshot().await.positions.is_empty());
}
