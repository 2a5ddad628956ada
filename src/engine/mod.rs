//! Multi-symbol matching engine: owns every order book, assigns order
//! ids, and fans out order and trade events to subscribers.

mod events;
mod metrics;

pub use events::{OrderBookListener, OrderEvent, OrderEventKind, TradeEvent, TradeListener};
pub use metrics::MetricsSnapshot;

use crate::config::MatchingConfig;
use crate::errors::EngineError;
use crate::order::{Order, OrderId};
use crate::orderbook::{MatchOutcome, OrderBook, OrderBookError, OrderBookSnapshot};
use crate::utils::current_time_millis;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use metrics::EngineMetrics;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{error, info, trace};

/// The matching engine.
///
/// Books are created lazily per symbol; the symbol map is only touched for
/// lookup and insert, never held across a book operation. Every order id,
/// engine-assigned (one process-wide monotonic counter) or supplied by the
/// caller, is reserved in the id→symbol index before it reaches a book, so
/// a live id maps to at most one book.
pub struct MatchingEngine {
    /// Order books keyed by symbol.
    books: DashMap<String, Arc<OrderBook>>,

    /// Secondary index: resting order id -> owning symbol.
    order_index: DashMap<OrderId, String>,

    /// Source of engine-assigned order ids.
    next_order_id: AtomicU64,

    /// Per-symbol order event subscribers.
    order_listeners: RwLock<HashMap<String, Vec<OrderBookListener>>>,

    /// Per-symbol trade event subscribers.
    trade_listeners: RwLock<HashMap<String, Vec<TradeListener>>>,

    metrics: EngineMetrics,
    config: MatchingConfig,
    running: AtomicBool,
}

impl MatchingEngine {
    /// Creates an engine with default configuration, ready to accept
    /// orders.
    pub fn new() -> Self {
        Self::with_config(MatchingConfig::default())
    }

    /// Creates an engine with explicit matching configuration.
    pub fn with_config(config: MatchingConfig) -> Self {
        Self {
            books: DashMap::new(),
            order_index: DashMap::new(),
            next_order_id: AtomicU64::new(0),
            order_listeners: RwLock::new(HashMap::new()),
            trade_listeners: RwLock::new(HashMap::new()),
            metrics: EngineMetrics::default(),
            config,
            running: AtomicBool::new(true),
        }
    }

    /// Resumes order intake. Idempotent.
    pub fn start(&self) {
        if !self.running.swap(true, Ordering::AcqRel) {
            info!("matching engine started");
        }
    }

    /// Stops order intake. In-flight book state is preserved; resting
    /// orders stay cancellable after a restart.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            info!("matching engine stopped");
        }
    }

    /// Whether the engine currently accepts orders.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// The configuration this engine runs with.
    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    /// Returns the book for `symbol`, creating it on first use.
    pub fn get_or_create_book(&self, symbol: &str) -> Arc<OrderBook> {
        if let Some(book) = self.books.get(symbol) {
            return book.value().clone();
        }
        self.books
            .entry(symbol.to_string())
            .or_insert_with(|| {
                info!("created order book for {}", symbol);
                Arc::new(OrderBook::from_config(symbol, &self.config))
            })
            .value()
            .clone()
    }

    /// Returns the book for `symbol` if it exists.
    pub fn book(&self, symbol: &str) -> Option<Arc<OrderBook>> {
        self.books.get(symbol).map(|entry| entry.value().clone())
    }

    /// Symbols with live books.
    pub fn symbols(&self) -> Vec<String> {
        self.books.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Processes an order end to end.
    ///
    /// Assigns an id when the order carries none, routes it to its
    /// symbol's book, then publishes, after the mutation committed and
    /// outside every lock, one `created` event, one trade event per
    /// execution in ascending sequence order, and a `filled` event for
    /// each order the match completed.
    ///
    /// # Errors
    /// [`EngineError::EngineStopped`] when stopped; an externally-assigned
    /// id that is still live in any book is rejected with
    /// [`OrderBookError::DuplicateOrder`]; other book rejections pass
    /// through as [`EngineError::Book`] and never mutate any state.
    pub fn process_order(&self, mut order: Order) -> Result<MatchOutcome, EngineError> {
        if !self.is_running() {
            return Err(EngineError::EngineStopped);
        }
        let started = Instant::now();

        let symbol = order.symbol.clone();
        if order.id.is_unassigned() {
            // Allocate from the monotonic counter, skipping any id an
            // externally-assigned order already occupies.
            loop {
                let candidate = OrderId(self.next_order_id.fetch_add(1, Ordering::AcqRel) + 1);
                if let Entry::Vacant(vacant) = self.order_index.entry(candidate) {
                    vacant.insert(symbol.clone());
                    order.id = candidate;
                    break;
                }
            }
        } else {
            // An externally-assigned id must map to at most one book.
            // Reserving it before routing closes the window where the
            // same id could land in two books concurrently.
            match self.order_index.entry(order.id) {
                Entry::Occupied(_) => {
                    return Err(EngineError::Book(OrderBookError::DuplicateOrder(order.id)));
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(symbol.clone());
                }
            }
        }
        let order_id = order.id;
        let book = self.get_or_create_book(&symbol);
        let outcome = match book.process(order) {
            Ok(outcome) => outcome,
            Err(error) => {
                self.order_index.remove(&order_id);
                return Err(error.into());
            }
        };

        // The reservation becomes the live index entry for resting
        // orders and is dropped for everything terminal.
        if !outcome.rested() {
            self.order_index.remove(&order_id);
        }
        for completed in &outcome.completed {
            self.order_index.remove(&completed.id);
        }

        let now = current_time_millis();
        self.publish_order_event(&symbol, OrderEventKind::Created, outcome.taker.clone(), now);
        for trade in &outcome.trades {
            self.publish_trade_event(
                &symbol,
                TradeEvent {
                    trade: trade.clone(),
                    timestamp: now,
                },
            );
        }
        for completed in &outcome.completed {
            self.publish_order_event(&symbol, OrderEventKind::Filled, completed.clone(), now);
        }
        if outcome.taker.remaining_quantity() == 0 && !outcome.trades.is_empty() {
            self.publish_order_event(&symbol, OrderEventKind::Filled, outcome.taker.clone(), now);
        }

        self.metrics.record_order(
            started.elapsed().as_nanos() as u64,
            outcome.trades.len() as u64,
        );
        trace!(
            "order {} on {} produced {} trades",
            outcome.taker.id,
            symbol,
            outcome.trades.len()
        );
        Ok(outcome)
    }

    /// Cancels a resting order, wherever it rests.
    ///
    /// Routing goes through the id→symbol index, so lookup cost does not
    /// grow with the number of books. Publishes a `canceled` event on
    /// success.
    pub fn cancel_order(&self, order_id: OrderId) -> Result<Order, EngineError> {
        let symbol = self
            .order_index
            .get(&order_id)
            .map(|entry| entry.value().clone())
            .ok_or(EngineError::OrderNotFound(order_id))?;
        let book = self
            .book(&symbol)
            .ok_or_else(|| EngineError::SymbolNotFound(symbol.clone()))?;

        let now = current_time_millis();
        let order = book.cancel(order_id, now)?;
        self.order_index.remove(&order_id);
        self.publish_order_event(&symbol, OrderEventKind::Canceled, order.clone(), now);
        Ok(order)
    }

    /// Captures a depth snapshot of one symbol's book.
    ///
    /// `depth` of `None` uses the configured default.
    pub fn get_order_book(
        &self,
        symbol: &str,
        depth: Option<usize>,
    ) -> Result<OrderBookSnapshot, EngineError> {
        let book = self
            .book(symbol)
            .ok_or_else(|| EngineError::SymbolNotFound(symbol.to_string()))?;
        Ok(book.snapshot(depth.unwrap_or(self.config.snapshot_depth)))
    }

    /// Subscribes to order lifecycle events for one symbol.
    pub fn subscribe_order_book(&self, symbol: &str, listener: OrderBookListener) {
        write_lock(&self.order_listeners)
            .entry(symbol.to_string())
            .or_default()
            .push(listener);
    }

    /// Subscribes to trade events for one symbol.
    pub fn subscribe_trades(&self, symbol: &str, listener: TradeListener) {
        write_lock(&self.trade_listeners)
            .entry(symbol.to_string())
            .or_default()
            .push(listener);
    }

    /// Current engine metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.order_index.len() as u64)
    }

    fn publish_order_event(&self, symbol: &str, kind: OrderEventKind, order: Order, now: u64) {
        // Copy the listener list out under the read lock, invoke outside it.
        let listeners = read_lock(&self.order_listeners)
            .get(symbol)
            .cloned()
            .unwrap_or_default();
        if listeners.is_empty() {
            return;
        }
        let event = OrderEvent {
            kind,
            order,
            timestamp: now,
        };
        for listener in listeners {
            // A misbehaving subscriber must not starve the others.
            if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| listener(&event)))
                .is_err()
            {
                error!("order event subscriber for {} panicked", symbol);
            }
        }
    }

    fn publish_trade_event(&self, symbol: &str, event: TradeEvent) {
        let listeners = read_lock(&self.trade_listeners)
            .get(symbol)
            .cloned()
            .unwrap_or_default();
        for listener in listeners {
            if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| listener(&event)))
                .is_err()
            {
                error!("trade event subscriber for {} panicked", symbol);
            }
        }
    }
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
