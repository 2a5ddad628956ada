//! The order record.

use crate::order::{OrderKind, OrderStatus, Side, TimeInForce};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Engine-assigned order identifier.
///
/// Ids are allocated from a single process-wide monotonic counter, so an id
/// maps to at most one book and duplicate ids across symbols are impossible.
/// `OrderId(0)` means "not yet assigned".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct OrderId(pub u64);

impl OrderId {
    /// Sentinel for orders that have not passed through the engine yet.
    pub const UNASSIGNED: OrderId = OrderId(0);

    /// True until the engine assigns a real id.
    pub fn is_unassigned(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single order: immutable identity plus mutable lifecycle state.
///
/// Prices are fixed-point integers in minor units (see
/// [`crate::config::PRICE_SCALE`]); quantities are integer lots.
/// `filled_quantity` never decreases and `remaining_quantity()` is always
/// `quantity - filled_quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Engine-assigned unique id, monotonic per process.
    pub id: OrderId,
    /// Optional user-scoped idempotency key.
    pub client_order_id: Option<String>,
    /// Owner of the order.
    pub user_id: String,
    /// Trading symbol, e.g. `"BTC/USD"`.
    pub symbol: String,
    /// Buy or sell.
    pub side: Side,
    /// Market, limit, or a stop variant.
    pub kind: OrderKind,
    /// How long the order stays eligible for matching.
    pub time_in_force: TimeInForce,
    /// Original quantity in lots. Always > 0 for a valid order.
    pub quantity: u64,
    /// Quantity filled so far.
    pub filled_quantity: u64,
    /// Limit price in price units. Ignored for market orders.
    pub price: u128,
    /// Trigger price for stop variants.
    pub stop_price: Option<u128>,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Creation timestamp, milliseconds since the epoch.
    pub created_at: u64,
    /// Last mutation timestamp.
    pub updated_at: u64,
    /// Optional expiry timestamp.
    pub expires_at: Option<u64>,
}

impl Order {
    /// Builds a limit order in `Pending` state with an unassigned id.
    pub fn limit(
        user_id: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        quantity: u64,
        price: u128,
        time_in_force: TimeInForce,
    ) -> Self {
        Self {
            id: OrderId::UNASSIGNED,
            client_order_id: None,
            user_id: user_id.into(),
            symbol: symbol.into(),
            side,
            kind: OrderKind::Limit,
            time_in_force,
            quantity,
            filled_quantity: 0,
            price,
            stop_price: None,
            status: OrderStatus::Pending,
            created_at: 0,
            updated_at: 0,
            expires_at: None,
        }
    }

    /// Builds a market order. Market orders never rest, so the
    /// time-in-force is fixed to IOC semantics.
    pub fn market(
        user_id: impl Into<String>,
        symbol: impl Into<String>,
        side: Side,
        quantity: u64,
    ) -> Self {
        Self {
            kind: OrderKind::Market,
            time_in_force: TimeInForce::Ioc,
            ..Self::limit(user_id, symbol, side, quantity, 0, TimeInForce::Ioc)
        }
    }

    /// Attaches a client order id.
    pub fn with_client_order_id(mut self, client_order_id: impl Into<String>) -> Self {
        self.client_order_id = Some(client_order_id.into());
        self
    }

    /// Quantity still open. Zero once fully filled.
    pub fn remaining_quantity(&self) -> u64 {
        self.quantity.saturating_sub(self.filled_quantity)
    }

    /// True once the order can never change again.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Records a fill of `quantity` lots.
    ///
    /// Moves status to `Filled` when nothing remains, `PartiallyFilled`
    /// otherwise. Fills are clamped to the remaining quantity so
    /// `filled_quantity` can never exceed `quantity`.
    pub(crate) fn apply_fill(&mut self, quantity: u64, now: u64) {
        let fill = quantity.min(self.remaining_quantity());
        self.filled_quantity += fill;
        self.status = if self.remaining_quantity() == 0 {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.updated_at = now;
    }

    /// Cancels whatever is still open. Partial fills stay committed.
    pub(crate) fn cancel(&mut self, now: u64) {
        if self.status.can_transition_to(OrderStatus::Canceled) {
            self.status = OrderStatus::Canceled;
            self.updated_at = now;
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}@{} ({})",
            self.id, self.symbol, self.kind, self.side, self.quantity, self.price, self.status
        )
    }
}
