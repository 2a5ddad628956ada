use exchange_core::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_check_risk_passes_without_limits() {
    let service = RiskService::builder().build().unwrap();
    let result = service
        .check_risk("A", "BTC/USD", RiskCheckContext::default())
        .await
        .unwrap();
    assert!(result.passed);
    service.shutdown().await;
}

#[tokio::test]
async fn test_order_size_limit_rejects() {
    let service = RiskService::builder().build().unwrap();
    service
        .add_limit(RiskLimit::new("A", LimitKind::OrderSize, 100.0))
        .await
        .unwrap();

    let ctx = RiskCheckContext {
        order_size: 150.0,
        ..RiskCheckContext::default()
    };
    let result = service.check_risk("A", "BTC/USD", ctx).await.unwrap();
    assert!(!result.passed);
    assert_eq!(result.failed_kind, Some(LimitKind::OrderSize));
    assert_eq!(result.current_value, 150.0);
    assert_eq!(result.limit_value, 100.0);

    service.shutdown().await;
}

#[tokio::test]
async fn test_exposure_limit_sees_live_positions() {
    let service = RiskService::builder().build().unwrap();
    service
        .add_limit(RiskLimit::new("A", LimitKind::Exposure, 1_000.0))
        .await
        .unwrap();
    service.update_position("A", "BTC/USD", 20, 100.0).await.unwrap();

    let ctx = RiskCheckContext {
        current_price: 100.0,
        ..RiskCheckContext::default()
    };
    let result = service.check_risk("A", "BTC/USD", ctx).await.unwrap();
    assert!(!result.passed);
    assert_eq!(result.failed_kind, Some(LimitKind::Exposure));
    assert_eq!(result.current_value, 2_000.0);

    service.shutdown().await;
}

#[tokio::test]
async fn test_limits_scoped_to_other_symbols_are_ignored() {
    let service = RiskService::builder().build().unwrap();
    service
        .add_limit(RiskLimit::new("A", LimitKind::OrderSize, 1.0).for_symbol("ETH/USD"))
        .await
        .unwrap();

    let ctx = RiskCheckContext {
        order_size: 50.0,
        ..RiskCheckContext::default()
    };
    let btc = service.check_risk("A", "BTC/USD", ctx.clone()).await.unwrap();
    assert!(btc.passed);
    let eth = service.check_risk("A", "ETH/USD", ctx).await.unwrap();
    assert!(!eth.passed);

    service.shutdown().await;
}

#[tokio::test]
async fn test_limits_load_from_store_at_startup() {
    let store = Arc::new(MemoryLimitStore::with_limits(vec![RiskLimit::new(
        "A",
        LimitKind::TradeFrequency,
        1.0,
    )]));
    let service = RiskService::builder().limit_store(store).build().unwrap();

    let ctx = RiskCheckContext {
        trade_count: 120,
        time_window: Duration::from_secs(60),
        ..RiskCheckContext::default()
    };
    let result = service.check_risk("A", "BTC/USD", ctx).await.unwrap();
    assert!(!result.passed);
    assert_eq!(result.failed_kind, Some(LimitKind::TradeFrequency));

    service.shutdown().await;
}

#[tokio::test(flavor = "current_thread")]
async fn test_queue_full_backpressure_scenario() {
    // Fill the coordinator's bounded queue (capacity 1,000) before its
    // worker gets a chance to run; the 1,001st submission must fail fast.
    let service = RiskService::builder().build().unwrap();
    let coordinator = service.coordinator();

    let op = |i: i64| RiskOp::UpdatePosition {
        user_id: "A".to_string(),
        symbol: "BTC/USD".to_string(),
        delta: 1,
        price: i as f64,
    };

    let mut replies = Vec::new();
    for i in 0..1_000 {
        replies.push(coordinator.try_submit(op(i)).unwrap());
    }
    assert!(matches!(
        coordinator.try_submit(op(1_000)),
        Err(RiskError::QueueFull)
    ));

    // Every accepted op completes once the worker runs.
    for reply in replies {
        assert!(reply.await.unwrap().is_ok());
    }
    let position = service.get_position("A", "BTC/USD").unwrap();
    assert_eq!(position.quantity, 1_000);

    service.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_surfaces_transient_error() {
    let service = RiskService::builder().build().unwrap();
    service.shutdown().await;

    let err = service
        .check_risk("A", "BTC/USD", RiskCheckContext::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RiskError::ShuttingDown));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_check_timeout_maps_to_timeout_error() {
    let service = RiskService::builder().build().unwrap();
    let coordinator = service.coordinator();

    // A zero deadline elapses before the batch tick can answer.
    let result = coordinator
        .submit_with_timeout(
            RiskOp::CheckLimit {
                user_id: "A".to_string(),
                symbol: "BTC/USD".to_string(),
                ctx: RiskCheckContext::default(),
            },
            Duration::from_millis(0),
        )
        .await;
    assert!(matches!(result, Err(RiskError::Timeout)));

    service.shutdown().await;
}
