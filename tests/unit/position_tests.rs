use exchange_core::prelude::*;

#[tokio::test]
async fn test_position_reversal_scenario() {
    // From flat: buy 10 @ 50, sell 15 @ 60.
    let service = RiskService::builder().build().unwrap();
    service.update_position("A", "BTC/USD", 10, 50.0).await.unwrap();
    let position = service.update_position("A", "BTC/USD", -15, 60.0).await.unwrap();

    assert_eq!(position.quantity, -5);
    assert!((position.average_entry_price - 60.0).abs() < 1e-9);
    assert!((position.realized_pnl - 100.0).abs() < 1e-9);

    service.shutdown().await;
}

#[tokio::test]
async fn test_get_position_not_found() {
    let service = RiskService::builder().build().unwrap();
    let result = service.get_position("nobody", "BTC/USD");
    assert!(matches!(result, Err(RiskError::PositionNotFound { .. })));
    assert!(service.list_positions("nobody").is_empty());
    service.shutdown().await;
}

#[tokio::test]
async fn test_mark_price_updates_unrealized() {
    let service = RiskService::builder().build().unwrap();
    service.update_position("A", "BTC/USD", 10, 100.0).await.unwrap();
    service.update_position("B", "BTC/USD", -10, 100.0).await.unwrap();

    assert_eq!(service.mark_price("BTC/USD", 110.0), 2);
    let long = service.get_position("A", "BTC/USD").unwrap();
    let short = service.get_position("B", "BTC/USD").unwrap();
    assert!((long.unrealized_pnl - 100.0).abs() < 1e-9);
    assert!((short.unrealized_pnl + 100.0).abs() < 1e-9);

    service.shutdown().await;
}

#[tokio::test]
async fn test_positions_survive_restart_through_store() {
    use std::sync::Arc;
    let store = Arc::new(MemoryPositionStore::new());

    let service = RiskService::builder()
        .position_store(store.clone())
        .build()
        .unwrap();
    service.update_position("A", "BTC/USD", 7, 100.0).await.unwrap();
    service.shutdown().await;

    let revived = RiskService::builder()
        .position_store(store)
        .build()
        .unwrap();
    let position = revived.get_position("A", "BTC/USD").unwrap();
    assert_eq!(position.quantity, 7);
    revived.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_observer_keeps_positions_balanced() {
    // Full loop: engine trades drive positions through the observer.
    let engine = MatchingEngine::new();
    let service = RiskService::builder().build().unwrap();
    let observer = TradeObserver::new(service.coordinator(), service.breakers());
    observer.attach(&engine, "BTC/USD");

    for (side, quantity, price) in [
        (Side::Sell, 10, 100),
        (Side::Buy, 4, 100),
        (Side::Buy, 6, 100),
        (Side::Sell, 3, 99),
    ] {
        let user = if side == Side::Buy { "buyer" } else { "seller" };
        let order = Order::limit(user, "BTC/USD", side, quantity, price, TimeInForce::Gtc);
        engine.process_order(order).unwrap();
    }

    // Give the coordinator a few ticks to drain the observer's updates.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let buyer = service.get_position("buyer", "BTC/USD").unwrap();
    let seller = service.get_position("seller", "BTC/USD").unwrap();
    assert_eq!(buyer.quantity + seller.quantity, 0);
    assert_eq!(buyer.quantity, 10);

    service.shutdown().await;
}
