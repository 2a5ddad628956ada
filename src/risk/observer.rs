//! Bridges the matching engine's trade stream into the risk pipeline.

use crate::engine::{MatchingEngine, TradeEvent, TradeListener};
use crate::orderbook::Trade;
use crate::risk::circuit_breaker::{CircuitBreakerSystem, PricePoint};
use crate::risk::coordinator::{RiskCoordinator, RiskOp};
use std::sync::Arc;
use tracing::warn;

/// Subscribes to trade events and drives position and volatility updates.
///
/// Per trade it enqueues two position updates, buyer `+q` then seller
/// `-q`, both at the trade price, and feeds a `(price, volume)` sample
/// to the circuit-breaker system. The observer is best-effort: a full
/// risk queue is logged and dropped, never letting risk backpressure
/// stall matching.
pub struct TradeObserver {
    coordinator: Arc<RiskCoordinator>,
    breakers: Arc<CircuitBreakerSystem>,
}

impl TradeObserver {
    /// Creates an observer over the given risk components.
    pub fn new(coordinator: Arc<RiskCoordinator>, breakers: Arc<CircuitBreakerSystem>) -> Self {
        Self {
            coordinator,
            breakers,
        }
    }

    /// Subscribes this observer to one symbol's trade stream.
    pub fn attach(&self, engine: &MatchingEngine, symbol: &str) {
        engine.subscribe_trades(symbol, self.listener());
    }

    /// The trade listener closure backing [`TradeObserver::attach`].
    pub fn listener(&self) -> TradeListener {
        let observer = Self::new(self.coordinator.clone(), self.breakers.clone());
        Arc::new(move |event: &TradeEvent| observer.on_trade(&event.trade))
    }

    /// Processes one trade.
    pub fn on_trade(&self, trade: &Trade) {
        let quantity = trade.quantity as i64;
        let price = trade.price as f64;
        let updates = [
            (trade.buy_user_id.as_str(), quantity),
            (trade.sell_user_id.as_str(), -quantity),
        ];
        for (user_id, delta) in updates {
            let op = RiskOp::UpdatePosition {
                user_id: user_id.to_string(),
                symbol: trade.symbol.clone(),
                delta,
                price,
            };
            match self.coordinator.try_submit(op) {
                // The reply is intentionally dropped; results surface
                // through the position book.
                Ok(_reply) => {}
                Err(error) => warn!(
                    "dropped position update for {} on {}: {}",
                    user_id, trade.symbol, error
                ),
            }
        }

        self.breakers.ingest(PricePoint {
            symbol: trade.symbol.clone(),
            price,
            volume: trade.quantity as f64,
            timestamp: trade.timestamp,
        });
    }
}
