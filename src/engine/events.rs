//! Event types published by the matching engine.

use crate::order::Order;
use crate::orderbook::Trade;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// What happened to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderEventKind {
    /// The order was accepted by the engine.
    Created,
    /// The order was removed from the book.
    Canceled,
    /// The order reached full execution.
    Filled,
}

impl fmt::Display for OrderEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderEventKind::Created => write!(f, "created"),
            OrderEventKind::Canceled => write!(f, "canceled"),
            OrderEventKind::Filled => write!(f, "filled"),
        }
    }
}

/// An order lifecycle event with a deep-copied order snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct OrderEvent {
    /// What happened.
    pub kind: OrderEventKind,
    /// State of the order when the event was published.
    pub order: Order,
    /// Publication timestamp, milliseconds since the epoch.
    pub timestamp: u64,
}

/// A trade execution event.
#[derive(Debug, Clone, Serialize)]
pub struct TradeEvent {
    /// The executed trade.
    pub trade: Trade,
    /// Publication timestamp, milliseconds since the epoch.
    pub timestamp: u64,
}

/// Callback invoked for order lifecycle events on a subscribed symbol.
///
/// Listeners run after book mutations commit and outside every engine
/// lock; they must not block.
pub type OrderBookListener = Arc<dyn Fn(&OrderEvent) + Send + Sync>;

/// Callback invoked for each trade on a subscribed symbol, in ascending
/// trade sequence order.
pub type TradeListener = Arc<dyn Fn(&TradeEvent) + Send + Sync>;
