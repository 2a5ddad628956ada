use exchange_core::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn gtc(user: &str, side: Side, quantity: u64, price: u128) -> Order {
    Order::limit(user, "BTC/USD", side, quantity, price, TimeInForce::Gtc)
}

#[test]
fn test_engine_assigns_unique_monotonic_ids() {
    let engine = MatchingEngine::new();
    let mut last = OrderId::UNASSIGNED;
    for i in 0..10 {
        let outcome = engine
            .process_order(gtc("A", Side::Buy, 1, 90 + i as u128))
            .unwrap();
        assert!(outcome.taker.id > last);
        last = outcome.taker.id;
    }
}

#[test]
fn test_cancel_order_emits_canceled_event() {
    let engine = MatchingEngine::new();
    let kinds = Arc::new(Mutex::new(Vec::new()));
    let sink = kinds.clone();
    engine.subscribe_order_book(
        "BTC/USD",
        Arc::new(move |event: &OrderEvent| {
            sink.lock().unwrap().push(event.kind);
        }),
    );

    let outcome = engine.process_order(gtc("A", Side::Buy, 5, 100)).unwrap();
    let canceled = engine.cancel_order(outcome.taker.id).unwrap();
    assert_eq!(canceled.status, OrderStatus::Canceled);

    let seen = kinds.lock().unwrap().clone();
    assert_eq!(seen, vec![OrderEventKind::Created, OrderEventKind::Canceled]);
}

#[test]
fn test_cancel_after_fill_is_not_found() {
    let engine = MatchingEngine::new();
    let resting = engine.process_order(gtc("A", Side::Sell, 5, 100)).unwrap();
    engine.process_order(gtc("B", Side::Buy, 5, 100)).unwrap();

    assert!(matches!(
        engine.cancel_order(resting.taker.id),
        Err(EngineError::OrderNotFound(_))
    ));
}

#[test]
fn test_trade_events_arrive_in_sequence_order() {
    let engine = MatchingEngine::new();
    let sequences = Arc::new(Mutex::new(Vec::new()));
    let sink = sequences.clone();
    engine.subscribe_trades(
        "BTC/USD",
        Arc::new(move |event: &TradeEvent| {
            sink.lock().unwrap().push(event.trade.sequence);
        }),
    );

    engine.process_order(gtc("A", Side::Sell, 2, 100)).unwrap();
    engine.process_order(gtc("A", Side::Sell, 2, 101)).unwrap();
    engine.process_order(gtc("B", Side::Buy, 4, 101)).unwrap();

    let seen = sequences.lock().unwrap().clone();
    assert_eq!(seen, vec![1, 2]);
}

#[test]
fn test_multiple_subscribers_all_receive_events() {
    let engine = MatchingEngine::new();
    let count = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let counter = count.clone();
        engine.subscribe_trades(
            "BTC/USD",
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
    }

    engine.process_order(gtc("A", Side::Sell, 1, 100)).unwrap();
    engine.process_order(gtc("B", Side::Buy, 1, 100)).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 3);
}

#[test]
fn test_metrics_counters_are_monotonic() {
    let engine = MatchingEngine::new();
    engine.process_order(gtc("A", Side::Sell, 5, 100)).unwrap();
    let first = engine.metrics();
    engine.process_order(gtc("B", Side::Buy, 5, 100)).unwrap();
    let second = engine.metrics();

    assert!(second.orders_processed > first.orders_processed);
    assert!(second.trades_executed > first.trades_executed);
    assert_eq!(second.active_orders, 0);
}

#[test]
fn test_stop_is_transient_and_restartable() {
    let engine = MatchingEngine::new();
    engine.stop();
    let err = engine.process_order(gtc("A", Side::Buy, 1, 100)).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Transient);
    assert!(err.is_retryable());

    engine.start();
    assert!(engine.process_order(gtc("A", Side::Buy, 1, 100)).is_ok());
}

#[test]
fn test_duplicate_external_id_is_rejected() {
    let engine = MatchingEngine::new();
    let mut order = gtc("A", Side::Buy, 5, 100);
    order.id = OrderId(777);
    engine.process_order(order.clone()).unwrap();

    let result = engine.process_order(order);
    assert!(matches!(
        result,
        Err(EngineError::Book(OrderBookError::DuplicateOrder(OrderId(777))))
    ));
}

#[test]
fn test_duplicate_external_id_across_symbols_is_rejected() {
    let engine = MatchingEngine::new();
    let mut first = gtc("A", Side::Buy, 5, 100);
    first.id = OrderId(901);
    engine.process_order(first).unwrap();

    // Same id routed at a different symbol must not reach that book.
    let mut second = Order::limit("A", "ETH/USD", Side::Buy, 5, 100, TimeInForce::Gtc);
    second.id = OrderId(901);
    assert!(matches!(
        engine.process_order(second),
        Err(EngineError::Book(OrderBookError::DuplicateOrder(OrderId(901))))
    ));
    assert!(engine.book("ETH/USD").is_none());

    // The original keeps its cancel path.
    let canceled = engine.cancel_order(OrderId(901)).unwrap();
    assert_eq!(canceled.symbol, "BTC/USD");
}

#[test]
fn test_external_id_is_reusable_after_cancel() {
    let engine = MatchingEngine::new();
    let mut order = gtc("A", Side::Buy, 5, 100);
    order.id = OrderId(555);
    engine.process_order(order.clone()).unwrap();
    engine.cancel_order(OrderId(555)).unwrap();

    order.symbol = "ETH/USD".to_string();
    assert!(engine.process_order(order).is_ok());
}

#[test]
fn test_concurrent_submissions_across_symbols() {
    let engine = Arc::new(MatchingEngine::new());
    let mut handles = Vec::new();
    for worker in 0..4 {
        let engine = engine.clone();
        handles.push(std::thread::spawn(move || {
            let symbol = if worker % 2 == 0 { "BTC/USD" } else { "ETH/USD" };
            for i in 0..50u64 {
                let side = if i % 2 == 0 { Side::Sell } else { Side::Buy };
                let order =
                    Order::limit(format!("user-{worker}"), symbol, side, 1, 100, TimeInForce::Gtc);
                let _ = engine.process_order(order);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let metrics = engine.metrics();
    assert_eq!(metrics.orders_processed, 200);
    // Snapshot aggregates must agree with the books' resting counts.
    for symbol in ["BTC/USD", "ETH/USD"] {
        let snapshot = engine.get_order_book(symbol, Some(100)).unwrap();
        let resting: u64 = snapshot.bids.iter().chain(snapshot.asks.iter()).map(|l| l.quantity).sum();
        assert_eq!(resting as usize, engine.book(symbol).unwrap().open_orders());
    }
}
