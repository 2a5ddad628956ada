//! Core order book: price levels for one symbol plus the indexes needed
//! for fast cancellation and top-of-book reads.

use crate::config::MatchingConfig;
use crate::order::{Order, OrderId, OrderKind, Side};
use crate::orderbook::error::OrderBookError;
use crate::orderbook::price_level::PriceLevel;
use crossbeam::atomic::AtomicCell;
use crossbeam_skiplist::SkipMap;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

/// A limit order book for one symbol.
///
/// Both sides are `SkipMap`s keyed by price, so the matching walk iterates
/// levels in price order without ever sorting; within a level resting
/// orders queue FIFO. An order-id index gives O(log P) cancellation, P
/// being the number of price levels.
///
/// Mutations (`process`, `cancel`) and depth snapshots are serialised by a
/// per-book gate so multi-level walks and fill-or-kill pre-checks are
/// atomic with respect to this book. Top-of-book reads go through atomic
/// aggregates and take no lock.
pub struct OrderBook {
    /// The symbol this book trades.
    pub(super) symbol: String,

    /// Bid side, keyed by price. Best bid is the highest key.
    pub(super) bids: SkipMap<u128, Arc<PriceLevel>>,

    /// Ask side, keyed by price. Best ask is the lowest key.
    pub(super) asks: SkipMap<u128, Arc<PriceLevel>>,

    /// Resting order id -> (price, side) for direct cancellation.
    pub(super) order_locations: DashMap<OrderId, (u128, Side)>,

    /// Serialises mutations and snapshots of this book.
    pub(super) gate: Mutex<()>,

    /// Incremented on every mutation of the book.
    pub(super) sequence: AtomicU64,

    /// Monotonic per-symbol trade sequence.
    pub(super) trade_sequence: AtomicU64,

    /// Price of the most recent trade.
    pub(super) last_trade_price: AtomicCell<u128>,

    /// Whether any trade has printed on this book.
    pub(super) has_traded: AtomicBool,

    /// Minimum price increment. Prices must be exact multiples.
    tick_size: u128,

    /// Minimum quantity increment. Quantities must be exact multiples.
    lot_size: u64,

    /// Optional cap on resting orders.
    max_open_orders: Option<usize>,
}

impl OrderBook {
    /// Creates a book with tick and lot size 1 (every positive integer
    /// price and quantity accepted).
    pub fn new(symbol: &str) -> Self {
        Self::with_market_rules(symbol, 1, 1)
    }

    /// Creates a book enforcing the given tick and lot sizes.
    ///
    /// A zero tick or lot size is promoted to 1 so the modulo checks stay
    /// well-defined.
    pub fn with_market_rules(symbol: &str, tick_size: u128, lot_size: u64) -> Self {
        Self {
            symbol: symbol.to_string(),
            bids: SkipMap::new(),
            asks: SkipMap::new(),
            order_locations: DashMap::new(),
            gate: Mutex::new(()),
            sequence: AtomicU64::new(0),
            trade_sequence: AtomicU64::new(0),
            last_trade_price: AtomicCell::new(0),
            has_traded: AtomicBool::new(false),
            tick_size: tick_size.max(1),
            lot_size: lot_size.max(1),
            max_open_orders: None,
        }
    }

    /// Creates a book from the engine's matching configuration.
    pub fn from_config(symbol: &str, config: &MatchingConfig) -> Self {
        let mut book = Self::with_market_rules(symbol, config.tick_size, config.lot_size);
        book.max_open_orders = config.max_orders_per_symbol;
        book
    }

    /// The symbol this book trades.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// The configured minimum price increment.
    pub fn tick_size(&self) -> u128 {
        self.tick_size
    }

    /// The configured minimum quantity increment.
    pub fn lot_size(&self) -> u64 {
        self.lot_size
    }

    /// Current mutation sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    /// Number of orders currently resting in the book.
    pub fn open_orders(&self) -> usize {
        self.order_locations.len()
    }

    /// Price of the last trade, if any trade has printed.
    pub fn last_trade_price(&self) -> Option<u128> {
        if self.has_traded.load(Ordering::Acquire) {
            Some(self.last_trade_price.load())
        } else {
            None
        }
    }

    /// Best bid as (price, aggregate quantity).
    ///
    /// O(1): the SkipMap keeps prices sorted, the highest bid is the last
    /// entry, and level aggregates are atomics.
    pub fn best_bid(&self) -> Option<(u128, u64)> {
        self.bids
            .iter()
            .next_back()
            .map(|entry| (*entry.key(), entry.value().total_quantity()))
    }

    /// Best ask as (price, aggregate quantity).
    pub fn best_ask(&self) -> Option<(u128, u64)> {
        self.asks
            .iter()
            .next()
            .map(|entry| (*entry.key(), entry.value().total_quantity()))
    }

    /// Copies a resting order out of the book.
    pub fn get_order(&self, order_id: OrderId) -> Option<Order> {
        let location = self.order_locations.get(&order_id)?;
        let (price, side) = *location.value();
        drop(location);
        self.side_levels(side).get(&price)?.value().get(order_id)
    }

    /// Removes a resting order from its price level.
    ///
    /// The price level is dropped once its queue empties. Orders that are
    /// not resting (unknown, already filled, already canceled) fail with
    /// [`OrderBookError::OrderNotFound`].
    pub fn cancel(&self, order_id: OrderId, now: u64) -> Result<Order, OrderBookError> {
        let _guard = self.lock_gate();

        let (price, side) = self
            .order_locations
            .get(&order_id)
            .map(|location| *location.value())
            .ok_or(OrderBookError::OrderNotFound(order_id))?;

        let side_map = self.side_levels(side);
        let entry = side_map
            .get(&price)
            .ok_or(OrderBookError::OrderNotFound(order_id))?;
        let level = entry.value().clone();

        let mut order = level
            .remove(order_id)
            .ok_or(OrderBookError::OrderNotFound(order_id))?;
        self.order_locations.remove(&order_id);
        if level.is_empty() {
            side_map.remove(&price);
        }

        order.cancel(now);
        self.sequence.fetch_add(1, Ordering::AcqRel);
        trace!("canceled order {} on {} at {}", order_id, self.symbol, price);
        Ok(order)
    }

    /// Validates an order's structure against this book's market rules.
    ///
    /// Pure field checks only; admission checks that read book state
    /// live in [`OrderBook::check_admission`]. Rejections leave the book
    /// untouched.
    pub(super) fn validate(&self, order: &Order) -> Result<(), OrderBookError> {
        if order.user_id.is_empty() {
            return Err(OrderBookError::MissingField("user_id"));
        }
        if order.symbol != self.symbol {
            return Err(OrderBookError::InvalidOrder {
                message: format!(
                    "order symbol {} does not match book {}",
                    order.symbol, self.symbol
                ),
            });
        }
        if !order.kind.is_executable() {
            return Err(OrderBookError::UnsupportedOrderKind(order.kind));
        }
        if order.quantity == 0 {
            return Err(OrderBookError::InvalidQuantity {
                quantity: order.quantity,
            });
        }
        if order.quantity % self.lot_size != 0 {
            return Err(OrderBookError::InvalidLotSize {
                quantity: order.quantity,
                lot_size: self.lot_size,
            });
        }
        if order.kind == OrderKind::Limit {
            if order.price == 0 {
                return Err(OrderBookError::InvalidPrice { price: order.price });
            }
            if order.price % self.tick_size != 0 {
                return Err(OrderBookError::InvalidTickSize {
                    price: order.price,
                    tick_size: self.tick_size,
                });
            }
        }
        Ok(())
    }

    /// Admission checks that read live book state.
    ///
    /// Reads `order_locations`, which every mutation path writes, so the
    /// caller must already hold the book gate; checking before taking it
    /// would let two orders carrying the same id race past the duplicate
    /// check and corrupt the location index.
    pub(super) fn check_admission(&self, order: &Order) -> Result<(), OrderBookError> {
        if let Some(max_orders) = self.max_open_orders {
            if self.order_locations.len() >= max_orders {
                return Err(OrderBookError::BookCapacityExceeded { max_orders });
            }
        }
        if self.order_locations.contains_key(&order.id) {
            return Err(OrderBookError::DuplicateOrder(order.id));
        }
        Ok(())
    }

    /// The side map holding orders of the given side.
    pub(super) fn side_levels(&self, side: Side) -> &SkipMap<u128, Arc<PriceLevel>> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    /// The side map an incoming order of `side` matches against.
    pub(super) fn opposite_levels(&self, side: Side) -> &SkipMap<u128, Arc<PriceLevel>> {
        self.side_levels(side.opposite())
    }

    pub(super) fn lock_gate(&self) -> MutexGuard<'_, ()> {
        self.gate
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
