//! The matching pass: price-time priority execution against resting
//! liquidity, with time-in-force handling for the remainder.

use crate::order::{Order, OrderKind, OrderStatus, Side, TimeInForce};
use crate::orderbook::book::OrderBook;
use crate::orderbook::error::OrderBookError;
use crate::orderbook::price_level::PriceLevel;
use crate::orderbook::trade::Trade;
use crate::utils::current_time_millis;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::trace;

/// Everything one call to [`OrderBook::process`] produced.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    /// Final state of the incoming order.
    pub taker: Order,
    /// Trades printed by this match, in execution order.
    pub trades: Vec<Trade>,
    /// Resting orders fully filled by this match.
    pub completed: Vec<Order>,
}

impl MatchOutcome {
    /// Total quantity the taker executed.
    pub fn executed_quantity(&self) -> u64 {
        self.trades.iter().map(|trade| trade.quantity).sum()
    }

    /// True when the taker's remainder rested in the book.
    pub fn rested(&self) -> bool {
        !self.taker.is_terminal() && self.taker.remaining_quantity() > 0
    }
}

impl OrderBook {
    /// Matches an incoming order and applies its time-in-force policy.
    ///
    /// The walk consumes opposite levels in price order (the SkipMap keeps
    /// them sorted, so the happy single-level fill is O(log N)) and orders
    /// within a level in FIFO arrival order. Every trade prints at the
    /// maker's resting price.
    ///
    /// Remainder handling:
    /// - GTC limit remainders rest at the limit price, appended at the
    ///   FIFO tail.
    /// - IOC remainders are canceled; partial fills stay committed.
    /// - FOK is simulated first: if the full quantity cannot execute at
    ///   acceptable prices the order is rejected and the book is untouched.
    /// - Market remainders are canceled; a market order that matches
    ///   nothing is rejected with `InsufficientLiquidity`.
    ///
    /// # Errors
    /// Validation failures ([`OrderBookError::InvalidTickSize`] and
    /// friends), [`OrderBookError::FillOrKillUnfillable`], and
    /// [`OrderBookError::InsufficientLiquidity`] all leave the book
    /// unchanged.
    pub fn process(&self, mut order: Order) -> Result<MatchOutcome, OrderBookError> {
        self.validate(&order)?;
        let now = current_time_millis();
        if order.created_at == 0 {
            order.created_at = now;
            order.updated_at = now;
        }

        let _guard = self.lock_gate();
        self.check_admission(&order)?;

        let limit_price = match order.kind {
            OrderKind::Limit => Some(order.price),
            _ => None,
        };

        if order.time_in_force == TimeInForce::Fok {
            let available = self.available_quantity(order.side, order.quantity, limit_price);
            if available < order.quantity {
                return Err(OrderBookError::FillOrKillUnfillable {
                    requested: order.quantity,
                    available,
                });
            }
        }

        let mut trades = Vec::new();
        let mut completed = Vec::new();
        let mut empty_levels: Vec<u128> = Vec::new();
        let opposite = self.opposite_levels(order.side);

        let price_iter: Box<dyn Iterator<Item = _>> = match order.side {
            Side::Buy => Box::new(opposite.iter()),
            Side::Sell => Box::new(opposite.iter().rev()),
        };

        for entry in price_iter {
            if order.remaining_quantity() == 0 {
                break;
            }
            let price = *entry.key();
            if let Some(limit) = limit_price {
                match order.side {
                    Side::Buy if price > limit => break,
                    Side::Sell if price < limit => break,
                    _ => {}
                }
            }

            let level = entry.value();
            let execution = level.consume(order.remaining_quantity(), now);
            for fill in execution.fills {
                order.apply_fill(fill.quantity, now);
                let sequence = self.trade_sequence.fetch_add(1, Ordering::AcqRel) + 1;
                trades.push(Trade::from_fill(
                    &order,
                    &fill.maker,
                    price,
                    fill.quantity,
                    sequence,
                    now,
                ));
                if fill.maker.status == OrderStatus::Filled {
                    self.order_locations.remove(&fill.maker.id);
                    completed.push(fill.maker);
                }
            }
            if execution.executed > 0 {
                self.last_trade_price.store(price);
                self.has_traded.store(true, Ordering::Release);
            }
            if level.is_empty() {
                empty_levels.push(price);
            }
        }

        for price in &empty_levels {
            opposite.remove(price);
        }

        self.settle_remainder(&mut order, &trades, now)?;

        if !trades.is_empty() || (order.remaining_quantity() > 0 && !order.is_terminal()) {
            self.sequence.fetch_add(1, Ordering::AcqRel);
        }
        trace!(
            "processed order {} on {}: {} trades, remaining {}",
            order.id,
            self.symbol,
            trades.len(),
            order.remaining_quantity()
        );

        if order.remaining_quantity() == 0 && order.status != OrderStatus::Filled {
            // Fully consumed takers must read as filled regardless of path.
            order.status = OrderStatus::Filled;
        }

        Ok(MatchOutcome {
            taker: order,
            trades,
            completed,
        })
    }

    /// Applies the time-in-force policy to whatever the match left open.
    fn settle_remainder(
        &self,
        order: &mut Order,
        trades: &[Trade],
        now: u64,
    ) -> Result<(), OrderBookError> {
        if order.remaining_quantity() == 0 {
            return Ok(());
        }
        match (order.kind, order.time_in_force) {
            (OrderKind::Market, _) => {
                if trades.is_empty() {
                    return Err(OrderBookError::InsufficientLiquidity {
                        side: order.side,
                        requested: order.quantity,
                        available: 0,
                    });
                }
                order.cancel(now);
            }
            (OrderKind::Limit, TimeInForce::Gtc) => {
                self.rest(order.clone());
            }
            (OrderKind::Limit, TimeInForce::Ioc) => {
                order.cancel(now);
            }
            // FOK reaching here with a remainder would mean the pre-check
            // lied; the pre-check and the walk run under the same gate.
            (OrderKind::Limit, TimeInForce::Fok) => {
                debug_assert!(false, "FOK remainder after positive pre-check");
                order.cancel(now);
            }
            (kind, _) => return Err(OrderBookError::UnsupportedOrderKind(kind)),
        }
        Ok(())
    }

    /// Appends the order at the FIFO tail of its limit price level.
    fn rest(&self, order: Order) {
        let side_map = self.side_levels(order.side);
        let level = side_map
            .get_or_insert(order.price, Arc::new(PriceLevel::new(order.price)))
            .value()
            .clone();
        self.order_locations
            .insert(order.id, (order.price, order.side));
        trace!(
            "resting order {} {} {}@{} on {}",
            order.id, order.side, order.quantity, order.price, self.symbol
        );
        level.push_back(order);
    }

    /// Quantity executable for `side` up to `quantity` at prices no worse
    /// than `limit_price` (`None` means any price).
    ///
    /// Pure read; used by the fill-or-kill pre-check and exposed as a
    /// pre-trade liquidity probe.
    pub fn available_quantity(
        &self,
        side: Side,
        quantity: u64,
        limit_price: Option<u128>,
    ) -> u64 {
        let opposite = self.opposite_levels(side);
        let price_iter: Box<dyn Iterator<Item = _>> = match side {
            Side::Buy => Box::new(opposite.iter()),
            Side::Sell => Box::new(opposite.iter().rev()),
        };

        let mut available = 0u64;
        for entry in price_iter {
            if available >= quantity {
                break;
            }
            let price = *entry.key();
            if let Some(limit) = limit_price {
                match side {
                    Side::Buy if price > limit => break,
                    Side::Sell if price < limit => break,
                    _ => {}
                }
            }
            available = available.saturating_add(entry.value().total_quantity());
        }
        available.min(quantity)
    }
}
