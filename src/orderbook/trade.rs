//! The immutable trade record produced by matching.

use crate::order::{Order, OrderId, Side};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A single execution between one maker and one taker.
///
/// Trades are immutable once emitted. `sequence` is strictly increasing
/// within a symbol; `value` is always `price * quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Unique trade identifier.
    pub id: Uuid,
    /// Symbol the trade printed on.
    pub symbol: String,
    /// Execution price; always the maker's resting price.
    pub price: u128,
    /// Executed quantity in lots.
    pub quantity: u64,
    /// Notional value, `price * quantity`.
    pub value: u128,
    /// The buy-side order.
    pub buy_order_id: OrderId,
    /// The sell-side order.
    pub sell_order_id: OrderId,
    /// Owner of the buy-side order.
    pub buy_user_id: String,
    /// Owner of the sell-side order.
    pub sell_user_id: String,
    /// The resting order whose liquidity was consumed.
    pub maker_order_id: OrderId,
    /// The incoming order that consumed liquidity.
    pub taker_order_id: OrderId,
    /// Side of the incoming order.
    pub taker_side: Side,
    /// When the trade printed, milliseconds since the epoch.
    pub timestamp: u64,
    /// Monotonic per-symbol sequence number.
    pub sequence: u64,
}

impl Trade {
    /// Builds a trade from the taker, the maker it hit, and the fill terms.
    pub(crate) fn from_fill(
        taker: &Order,
        maker: &Order,
        price: u128,
        quantity: u64,
        sequence: u64,
        timestamp: u64,
    ) -> Self {
        let (buy, sell) = match taker.side {
            Side::Buy => (taker, maker),
            Side::Sell => (maker, taker),
        };
        Self {
            id: Uuid::new_v4(),
            symbol: taker.symbol.clone(),
            price,
            quantity,
            value: price.saturating_mul(quantity as u128),
            buy_order_id: buy.id,
            sell_order_id: sell.id,
            buy_user_id: buy.user_id.clone(),
            sell_user_id: sell.user_id.clone(),
            maker_order_id: maker.id,
            taker_order_id: taker.id,
            taker_side: taker.side,
            timestamp,
            sequence,
        }
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}@{} taker {} ({}) maker {} seq {}",
            self.symbol,
            self.quantity,
            self.price,
            self.taker_order_id,
            self.taker_side,
            self.maker_order_id,
            self.sequence
        )
    }
}
