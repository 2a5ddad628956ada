//! Per-(user, symbol) position accounting with realized and
//! mark-to-market PnL.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// One account's position in one symbol.
///
/// `quantity` is signed (long > 0, short < 0). `average_entry_price` is the
/// volume-weighted entry of the open quantity and is zero exactly when the
/// position is flat. Reducing fills realize PnL against the prior average;
/// a fill that crosses through zero re-opens the far side at the fill
/// price.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Account owning the position.
    pub user_id: String,
    /// Symbol the position is in.
    pub symbol: String,
    /// Signed open quantity in lots.
    pub quantity: i64,
    /// Volume-weighted average entry price in price units.
    pub average_entry_price: f64,
    /// PnL booked by reducing fills.
    pub realized_pnl: f64,
    /// Mark-to-market PnL of the open quantity.
    pub unrealized_pnl: f64,
    /// Timestamp of the last mutation, milliseconds since the epoch.
    pub last_updated: u64,
}

impl Position {
    fn new(user_id: &str, symbol: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            symbol: symbol.to_string(),
            ..Self::default()
        }
    }

    /// True when no quantity is open.
    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    /// Absolute notional of the open quantity at `price`.
    pub fn notional(&self, price: f64) -> f64 {
        self.quantity.unsigned_abs() as f64 * price
    }

    /// Applies a signed fill.
    ///
    /// Same-sign fills (or fills into a flat book) extend the position and
    /// reweight the average entry. Opposing fills first close against the
    /// average entry, realizing `closed * (fill - avg)` signed by the side
    /// being closed; any surplus opens the opposite side at `fill_price`.
    fn apply_fill(&mut self, delta: i64, fill_price: f64, now: u64) {
        if delta != 0 {
            let prior = self.quantity;
            if prior == 0 || (prior > 0) == (delta > 0) {
                let open = prior.unsigned_abs() as f64;
                let added = delta.unsigned_abs() as f64;
                self.average_entry_price =
                    (open * self.average_entry_price + added * fill_price) / (open + added);
                self.quantity = prior + delta;
            } else {
                let closed = prior.unsigned_abs().min(delta.unsigned_abs()) as f64;
                let per_lot = if prior > 0 {
                    fill_price - self.average_entry_price
                } else {
                    self.average_entry_price - fill_price
                };
                self.realized_pnl += closed * per_lot;
                self.quantity = prior + delta;
                if self.quantity == 0 {
                    self.average_entry_price = 0.0;
                } else if (self.quantity > 0) != (prior > 0) {
                    // Crossed through zero: the surplus opens fresh.
                    self.average_entry_price = fill_price;
                }
            }
        }
        self.last_updated = now;
    }

    /// Recomputes unrealized PnL against a mark price.
    fn mark(&mut self, price: f64, now: u64) {
        self.unrealized_pnl = if self.quantity == 0 {
            0.0
        } else {
            self.quantity as f64 * (price - self.average_entry_price)
        };
        self.last_updated = now;
    }
}

/// All positions, owned behind a single reader/writer lock.
///
/// The risk coordinator is the sole fill writer; readers take the read
/// lock for point lookups and listings. Updates create missing positions,
/// so fill application never fails.
#[derive(Debug, Default)]
pub struct PositionBook {
    inner: RwLock<HashMap<String, HashMap<String, Position>>>,
}

impl PositionBook {
    /// Creates an empty position book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one signed fill, creating the position if absent.
    ///
    /// In the assembled system the risk coordinator is the sole caller;
    /// the method is the accumulator's single mutation entry point.
    pub fn apply_fill(
        &self,
        user_id: &str,
        symbol: &str,
        delta: i64,
        fill_price: f64,
        now: u64,
    ) -> Position {
        let mut inner = write(&self.inner);
        let position = inner
            .entry(user_id.to_string())
            .or_default()
            .entry(symbol.to_string())
            .or_insert_with(|| Position::new(user_id, symbol));
        position.apply_fill(delta, fill_price, now);
        position.clone()
    }

    /// Applies a batch of fills under one write-lock acquisition.
    ///
    /// Entries are `(user_id, symbol, delta, fill_price)` applied in
    /// order; the returned positions line up with the input.
    pub(crate) fn apply_fills(
        &self,
        fills: &[(String, String, i64, f64)],
        now: u64,
    ) -> Vec<Position> {
        let mut inner = write(&self.inner);
        fills
            .iter()
            .map(|(user_id, symbol, delta, fill_price)| {
                let position = inner
                    .entry(user_id.clone())
                    .or_default()
                    .entry(symbol.clone())
                    .or_insert_with(|| Position::new(user_id, symbol));
                position.apply_fill(*delta, *fill_price, now);
                position.clone()
            })
            .collect()
    }

    /// Recomputes unrealized PnL for every holder of `symbol`.
    ///
    /// Returns the number of positions updated.
    pub fn mark(&self, symbol: &str, price: f64, now: u64) -> usize {
        let mut inner = write(&self.inner);
        let mut updated = 0;
        for positions in inner.values_mut() {
            if let Some(position) = positions.get_mut(symbol) {
                position.mark(price, now);
                updated += 1;
            }
        }
        updated
    }

    /// Point lookup. `None` when the user never traded the symbol.
    pub fn get(&self, user_id: &str, symbol: &str) -> Option<Position> {
        read(&self.inner).get(user_id)?.get(symbol).cloned()
    }

    /// Every position the user holds, flat ones included.
    pub fn list(&self, user_id: &str) -> Vec<Position> {
        read(&self.inner)
            .get(user_id)
            .map(|positions| positions.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Total absolute notional across the user's positions at `price`.
    pub fn exposure(&self, user_id: &str, price: f64) -> f64 {
        read(&self.inner)
            .get(user_id)
            .map(|positions| {
                positions
                    .values()
                    .map(|position| position.notional(price))
                    .sum()
            })
            .unwrap_or(0.0)
    }

    /// Net open quantity across all users of `symbol`. Matched flow nets
    /// to zero.
    pub fn net_quantity(&self, symbol: &str) -> i64 {
        read(&self.inner)
            .values()
            .filter_map(|positions| positions.get(symbol))
            .map(|position| position.quantity)
            .sum()
    }

    /// Seeds the book from persisted state. Replaces existing entries.
    pub(crate) fn load(&self, positions: Vec<Position>) {
        let mut inner = write(&self.inner);
        for position in positions {
            inner
                .entry(position.user_id.clone())
                .or_default()
                .insert(position.symbol.clone(), position);
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
