//! A single price level: a FIFO queue of resting orders plus aggregate
//! counters that can be read without taking the queue lock.

use crate::order::{Order, OrderId, OrderStatus};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// One fill taken from the front of a level's queue.
#[derive(Debug, Clone)]
pub(crate) struct LevelFill {
    /// Snapshot of the maker order after the fill was applied.
    pub maker: Order,
    /// Quantity consumed from the maker by this fill.
    pub quantity: u64,
}

/// Result of consuming liquidity from one level.
#[derive(Debug, Default)]
pub(crate) struct LevelExecution {
    /// Total quantity executed at this level.
    pub executed: u64,
    /// Individual maker fills in FIFO order.
    pub fills: Vec<LevelFill>,
}

/// All orders resting at one price, in arrival order.
///
/// Aggregates (`total_quantity`, `order_count`) are kept in atomics updated
/// alongside every queue mutation so top-of-book and snapshot reads never
/// contend with the queue lock. Structural mutation is serialised by the
/// owning book's gate.
#[derive(Debug)]
pub(crate) struct PriceLevel {
    price: u128,
    quantity: AtomicU64,
    order_count: AtomicU64,
    queue: Mutex<VecDeque<Order>>,
}

impl PriceLevel {
    pub(crate) fn new(price: u128) -> Self {
        Self {
            price,
            quantity: AtomicU64::new(0),
            order_count: AtomicU64::new(0),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn price(&self) -> u128 {
        self.price
    }

    /// Aggregate open quantity at this level.
    pub(crate) fn total_quantity(&self) -> u64 {
        self.quantity.load(Ordering::Acquire)
    }

    /// Number of resting orders at this level.
    pub(crate) fn order_count(&self) -> u64 {
        self.order_count.load(Ordering::Acquire)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order_count() == 0
    }

    /// Appends an order at the FIFO tail.
    pub(crate) fn push_back(&self, order: Order) {
        let remaining = order.remaining_quantity();
        let mut queue = lock(&self.queue);
        queue.push_back(order);
        self.quantity.fetch_add(remaining, Ordering::AcqRel);
        self.order_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Consumes up to `quantity` lots from the FIFO head.
    ///
    /// Fully filled makers are removed from the queue; a partially filled
    /// head stays in place with its updated state. Returns every fill so
    /// the book can emit trades and completion events.
    pub(crate) fn consume(&self, quantity: u64, now: u64) -> LevelExecution {
        let mut execution = LevelExecution::default();
        let mut remaining = quantity;
        let mut queue = lock(&self.queue);

        while remaining > 0 {
            let Some(maker) = queue.front_mut() else {
                break;
            };
            let fill = remaining.min(maker.remaining_quantity());
            maker.apply_fill(fill, now);
            remaining -= fill;
            execution.executed += fill;
            self.quantity.fetch_sub(fill, Ordering::AcqRel);

            let snapshot = maker.clone();
            if snapshot.status == OrderStatus::Filled {
                queue.pop_front();
                self.order_count.fetch_sub(1, Ordering::AcqRel);
            }
            execution.fills.push(LevelFill {
                maker: snapshot,
                quantity: fill,
            });
        }

        execution
    }

    /// Removes a resting order by id, returning it if present.
    pub(crate) fn remove(&self, order_id: OrderId) -> Option<Order> {
        let mut queue = lock(&self.queue);
        let index = queue.iter().position(|order| order.id == order_id)?;
        let order = queue.remove(index)?;
        self.quantity
            .fetch_sub(order.remaining_quantity(), Ordering::AcqRel);
        self.order_count.fetch_sub(1, Ordering::AcqRel);
        Some(order)
    }

    /// Copies a single resting order out of the queue.
    pub(crate) fn get(&self, order_id: OrderId) -> Option<Order> {
        lock(&self.queue)
            .iter()
            .find(|order| order.id == order_id)
            .cloned()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
