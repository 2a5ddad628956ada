use exchange_core::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn breaker_config() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        max_volatility: 0.01,
        max_price_move: 10.0,
        max_volume_spike: 1_000.0,
        volatility_window: Duration::from_secs(60),
        price_move_window: Duration::from_secs(60),
        volume_window: Duration::from_secs(60),
        min_recovery_time: Duration::from_secs(30),
        max_recovery_time: Duration::from_secs(600),
        recovery_test_orders: 3,
    }
}

fn service_with_manual_clock() -> (Arc<ManualClock>, RiskService) {
    let clock = Arc::new(ManualClock::new(1_000_000));
    let service = RiskService::builder()
        .breaker_config(breaker_config())
        .clock(clock.clone())
        .build()
        .unwrap();
    (clock, service)
}

fn feed(service: &RiskService, clock: &ManualClock, prices: &[f64]) {
    for &price in prices {
        clock.advance(1_000);
        service.ingest(PricePoint {
            symbol: "BTC/USD".to_string(),
            price,
            volume: 1.0,
            timestamp: clock.now_millis(),
        });
    }
}

#[tokio::test]
async fn test_volatility_halt_blocks_risk_checks_then_recovers() {
    let (clock, service) = service_with_manual_clock();

    // Return variance of this sequence is ~0.036, well over the 0.01 cap.
    feed(&service, &clock, &[100.0, 120.0, 96.0, 115.2]);
    assert!(service.is_halted("BTC/USD"));

    let check = service
        .check_risk("A", "BTC/USD", RiskCheckContext::default())
        .await
        .unwrap();
    assert!(!check.passed);
    assert!(check.message.contains("circuit breaker"));

    // Unrelated symbols stay tradable.
    assert!(!service.is_halted("ETH/USD"));

    // After the minimum recovery time, once stable prices have pushed the
    // spiky samples out of the volatility window, the breaker probes
    // half-open; three successful test orders then close it.
    feed(&service, &clock, &[100.0; 70]);
    assert!(!service.is_halted("BTC/USD"));
    assert_eq!(service.test_order("BTC/USD"), BreakerState::HalfOpen);
    assert_eq!(service.test_order("BTC/USD"), BreakerState::HalfOpen);
    assert_eq!(service.test_order("BTC/USD"), BreakerState::Closed);

    let check = service
        .check_risk("A", "BTC/USD", RiskCheckContext::default())
        .await
        .unwrap();
    assert!(check.passed);

    service.shutdown().await;
}

#[tokio::test]
async fn test_manual_halt_and_resume() {
    let (_clock, service) = service_with_manual_clock();

    service.halt("BTC/USD", HaltReason::Regulatory);
    assert!(service.is_halted("BTC/USD"));

    // Halting an already-open breaker is a no-op.
    service.halt("BTC/USD", HaltReason::Manual);

    service.resume("BTC/USD").unwrap();
    assert!(!service.is_halted("BTC/USD"));

    // Resuming a closed breaker fails.
    assert!(matches!(
        service.resume("BTC/USD"),
        Err(RiskError::BreakerNotHalted { .. })
    ));

    service.shutdown().await;
}

#[tokio::test]
async fn test_global_halt_blocks_every_symbol() {
    let (_clock, service) = service_with_manual_clock();

    service.global_halt(HaltReason::SystemError);
    assert!(service.is_halted("BTC/USD"));
    assert!(service.is_halted("ETH/USD"));

    let check = service
        .check_risk("A", "ETH/USD", RiskCheckContext::default())
        .await
        .unwrap();
    assert!(!check.passed);

    service.global_resume();
    assert!(!service.is_halted("ETH/USD"));
    let check = service
        .check_risk("A", "ETH/USD", RiskCheckContext::default())
        .await
        .unwrap();
    assert!(check.passed);

    service.shutdown().await;
}
