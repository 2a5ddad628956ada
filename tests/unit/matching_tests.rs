use exchange_core::prelude::*;

fn gtc(user: &str, side: Side, quantity: u64, price: u128) -> Order {
    Order::limit(user, "BTC/USD", side, quantity, price, TimeInForce::Gtc)
}

#[test]
fn test_crossing_match_scenario() {
    // Empty book. SELL 10 @ 100 (A), then BUY 4 @ 101 (B).
    let engine = MatchingEngine::new();
    let resting = engine.process_order(gtc("A", Side::Sell, 10, 100)).unwrap();
    let outcome = engine.process_order(gtc("B", Side::Buy, 4, 101)).unwrap();

    assert_eq!(outcome.trades.len(), 1);
    let trade = &outcome.trades[0];
    assert_eq!(trade.price, 100);
    assert_eq!(trade.quantity, 4);
    assert_eq!(trade.maker_order_id, resting.taker.id);
    assert_eq!(trade.taker_order_id, outcome.taker.id);
    assert_eq!(trade.taker_side, Side::Buy);
    assert_eq!(trade.buy_user_id, "B");
    assert_eq!(trade.sell_user_id, "A");
    assert_eq!(trade.value, 400);

    assert_eq!(outcome.taker.status, OrderStatus::Filled);
    let maker = engine
        .book("BTC/USD")
        .unwrap()
        .get_order(resting.taker.id)
        .unwrap();
    assert_eq!(maker.status, OrderStatus::PartiallyFilled);
    assert_eq!(maker.remaining_quantity(), 6);
}

#[test]
fn test_price_time_priority_scenario() {
    // SELL 5 @ 100 (A), SELL 5 @ 100 (C), then BUY 6 @ 100 (B).
    let engine = MatchingEngine::new();
    let first = engine.process_order(gtc("A", Side::Sell, 5, 100)).unwrap();
    let second = engine.process_order(gtc("C", Side::Sell, 5, 100)).unwrap();
    let outcome = engine.process_order(gtc("B", Side::Buy, 6, 100)).unwrap();

    assert_eq!(outcome.trades.len(), 2);
    assert_eq!(outcome.trades[0].quantity, 5);
    assert_eq!(outcome.trades[0].maker_order_id, first.taker.id);
    assert_eq!(outcome.trades[1].quantity, 1);
    assert_eq!(outcome.trades[1].maker_order_id, second.taker.id);

    let book = engine.book("BTC/USD").unwrap();
    assert!(book.get_order(first.taker.id).is_none());
    let later = book.get_order(second.taker.id).unwrap();
    assert_eq!(later.status, OrderStatus::PartiallyFilled);
    assert_eq!(later.remaining_quantity(), 4);
}

#[test]
fn test_fok_rejection_scenario() {
    // Book has SELL 3 @ 100. FOK BUY 5 @ 100 must reject untouched.
    let engine = MatchingEngine::new();
    engine.process_order(gtc("A", Side::Sell, 3, 100)).unwrap();
    let before = engine.get_order_book("BTC/USD", None).unwrap();

    let mut fok = gtc("B", Side::Buy, 5, 100);
    fok.time_in_force = TimeInForce::Fok;
    let result = engine.process_order(fok);
    assert!(matches!(
        result,
        Err(EngineError::Book(OrderBookError::FillOrKillUnfillable { .. }))
    ));

    let after = engine.get_order_book("BTC/USD", None).unwrap();
    assert_eq!(before.bids, after.bids);
    assert_eq!(before.asks, after.asks);
    assert_eq!(before.sequence, after.sequence);
}

#[test]
fn test_conservation_of_quantity() {
    let engine = MatchingEngine::new();
    engine.process_order(gtc("A", Side::Sell, 7, 100)).unwrap();
    engine.process_order(gtc("C", Side::Sell, 5, 101)).unwrap();
    let outcome = engine.process_order(gtc("B", Side::Buy, 10, 101)).unwrap();

    let traded: u64 = outcome.trades.iter().map(|t| t.quantity).sum();
    assert_eq!(traded, 10);
    assert_eq!(outcome.taker.filled_quantity, traded);

    // Maker fills across the two resting orders sum to the same total.
    let maker_filled: u64 = outcome
        .completed
        .iter()
        .map(|order| order.filled_quantity)
        .sum::<u64>()
        + engine
            .book("BTC/USD")
            .unwrap()
            .get_order(OrderId(2))
            .map(|order| order.filled_quantity)
            .unwrap_or(0);
    assert_eq!(maker_filled, traded);
}

#[test]
fn test_no_trade_through_for_limit_takers() {
    let engine = MatchingEngine::new();
    engine.process_order(gtc("A", Side::Sell, 5, 100)).unwrap();
    engine.process_order(gtc("A", Side::Sell, 5, 103)).unwrap();

    let buy = engine.process_order(gtc("B", Side::Buy, 10, 101)).unwrap();
    assert!(buy.trades.iter().all(|trade| trade.price <= 101));

    engine.process_order(gtc("A", Side::Buy, 5, 95)).unwrap();
    let sell = engine.process_order(gtc("B", Side::Sell, 8, 94)).unwrap();
    assert!(sell.trades.iter().all(|trade| trade.price >= 94));
}

#[test]
fn test_process_then_cancel_restores_depth() {
    let engine = MatchingEngine::new();
    engine.process_order(gtc("A", Side::Buy, 10, 95)).unwrap();
    engine.process_order(gtc("A", Side::Sell, 10, 105)).unwrap();
    let before = engine.get_order_book("BTC/USD", None).unwrap();

    let outcome = engine.process_order(gtc("B", Side::Buy, 3, 96)).unwrap();
    engine.cancel_order(outcome.taker.id).unwrap();

    let after = engine.get_order_book("BTC/USD", None).unwrap();
    assert_eq!(before.bids, after.bids);
    assert_eq!(before.asks, after.asks);
}

#[test]
fn test_snapshot_is_stable_without_mutations() {
    let engine = MatchingEngine::new();
    engine.process_order(gtc("A", Side::Buy, 10, 95)).unwrap();
    engine.process_order(gtc("A", Side::Sell, 4, 105)).unwrap();

    let first = engine.get_order_book("BTC/USD", Some(5)).unwrap();
    let second = engine.get_order_book("BTC/USD", Some(5)).unwrap();
    assert!(first.same_depth(&second));
}

#[test]
fn test_market_rules_reject_before_any_mutation() {
    let engine = MatchingEngine::with_config(MatchingConfig {
        tick_size: 10,
        lot_size: 5,
        ..MatchingConfig::default()
    });

    let off_tick = gtc("A", Side::Buy, 5, 101);
    assert!(matches!(
        engine.process_order(off_tick),
        Err(EngineError::Book(OrderBookError::InvalidTickSize { .. }))
    ));

    let off_lot = gtc("A", Side::Buy, 7, 100);
    assert!(matches!(
        engine.process_order(off_lot),
        Err(EngineError::Book(OrderBookError::InvalidLotSize { .. }))
    ));

    let metrics = engine.metrics();
    assert_eq!(metrics.active_orders, 0);
}

#[test]
fn test_ioc_partial_fills_stay_committed() {
    let engine = MatchingEngine::new();
    engine.process_order(gtc("A", Side::Sell, 5, 100)).unwrap();

    let mut ioc = gtc("B", Side::Buy, 8, 100);
    ioc.time_in_force = TimeInForce::Ioc;
    let outcome = engine.process_order(ioc).unwrap();

    assert_eq!(outcome.trades.len(), 1);
    assert_eq!(outcome.taker.status, OrderStatus::Canceled);
    assert_eq!(outcome.taker.filled_quantity, 5);
    // Nothing rested on either side.
    let snapshot = engine.get_order_book("BTC/USD", None).unwrap();
    assert!(snapshot.bids.is_empty());
    assert!(snapshot.asks.is_empty());
}

#[test]
fn test_trade_sequences_strictly_increase_per_symbol() {
    let engine = MatchingEngine::new();
    let mut sequences = Vec::new();
    for round in 0..5u64 {
        engine
            .process_order(gtc("A", Side::Sell, 2, 100 + round as u128))
            .unwrap();
        let outcome = engine
            .process_order(gtc("B", Side::Buy, 2, 100 + round as u128))
            .unwrap();
        sequences.extend(outcome.trades.iter().map(|trade| trade.sequence));
    }
    assert_eq!(sequences.len(), 5);
    assert!(sequences.windows(2).all(|pair| pair[1] > pair[0]));
}

#[test]
fn test_books_are_independent_across_symbols() {
    let engine = MatchingEngine::new();
    engine
        .process_order(Order::limit("A", "BTC/USD", Side::Sell, 5, 100, TimeInForce::Gtc))
        .unwrap();
    engine
        .process_order(Order::limit("A", "ETH/USD", Side::Sell, 5, 100, TimeInForce::Gtc))
        .unwrap();

    let outcome = engine
        .process_order(Order::limit("B", "BTC/USD", Side::Buy, 5, 100, TimeInForce::Gtc))
        .unwrap();
    assert_eq!(outcome.trades.len(), 1);

    let eth = engine.get_order_book("ETH/USD", None).unwrap();
    assert_eq!(eth.asks.len(), 1);
    assert_eq!(eth.asks[0].quantity, 5);
}
