//! # Exchange Core
//!
//! A multi-symbol, multi-asset limit-order matching engine with pre-trade
//! risk gating, trading halts, and position/PnL tracking: the core of an
//! exchange-facing trading platform.
//!
//! ## Subsystems
//!
//! - **Matching engine** ([`MatchingEngine`]): per-symbol order books with
//!   price-time priority matching, market/limit orders, GTC/IOC/FOK
//!   time-in-force, cancellation by id, depth snapshots, and ordered
//!   order/trade event fan-out.
//! - **Risk pipeline** ([`RiskService`]): a single-writer batching
//!   coordinator that validates orders against per-user position,
//!   order-size, exposure, drawdown, and trade-frequency limits, and
//!   enforces per-symbol and venue-wide circuit breakers driven by return
//!   variance, price moves, and volume spikes.
//! - **Position accumulator** ([`PositionBook`]): per-(user, symbol)
//!   signed positions with weighted-average entry, realized PnL on
//!   reducing fills, and mark-to-market unrealized PnL.
//!
//! The [`TradeObserver`] ties the three together: it subscribes to the
//! engine's trade stream, enqueues position updates for both sides of
//! every trade, and feeds (price, volume) samples to the breakers.
//!
//! ## Design notes
//!
//! - Book sides are concurrent skip lists, so the matching walk consumes
//!   price levels in sorted order without sorting: O(M log N) for M
//!   levels touched out of N.
//! - Each book serialises its mutations behind one gate; top-of-book
//!   reads go through atomic aggregates and never take it.
//! - Prices are fixed-point integers ([`config::PRICE_SCALE`] units per
//!   whole), quantities are integer lots; tick and lot sizes are enforced
//!   at validation.
//! - Every trade prints at the maker's resting price.
//! - External capabilities, persistence ([`PositionStore`],
//!   [`LimitStore`]) and time ([`Clock`]), are injected by construction,
//!   never reached for globally.
//!
//! ## Example
//!
//! ```
//! use exchange_core::prelude::*;
//!
//! let engine = MatchingEngine::new();
//! let sell = Order::limit("maker", "BTC/USD", Side::Sell, 10, 10_000, TimeInForce::Gtc);
//! engine.process_order(sell).unwrap();
//!
//! let buy = Order::limit("taker", "BTC/USD", Side::Buy, 4, 10_100, TimeInForce::Gtc);
//! let outcome = engine.process_order(buy).unwrap();
//! assert_eq!(outcome.trades.len(), 1);
//! assert_eq!(outcome.trades[0].price, 10_000); // maker price rule
//! ```

pub mod config;
pub mod engine;
pub mod errors;
pub mod order;
pub mod orderbook;
pub mod prelude;
pub mod risk;
pub mod store;
mod utils;

pub use config::{CoordinatorConfig, EnginePreset, MatchingConfig};
pub use engine::{
    MatchingEngine, MetricsSnapshot, OrderBookListener, OrderEvent, OrderEventKind, TradeEvent,
    TradeListener,
};
pub use errors::{EngineError, ErrorClass};
pub use order::{Order, OrderId, OrderKind, OrderStatus, Side, TimeInForce};
pub use orderbook::{
    LevelSnapshot, MatchOutcome, OrderBook, OrderBookError, OrderBookSnapshot,
    OrderBookSnapshotPackage, Trade,
};
pub use risk::{
    BreakerState, BreakerStatus, CircuitBreakerConfig, CircuitBreakerSystem, HaltReason,
    LimitKind, Position, PositionBook, PricePoint, RiskCheckContext, RiskCheckResult,
    RiskCoordinator, RiskError, RiskLimit, RiskOp, RiskOutcome, RiskService, TradeObserver,
};
pub use store::{
    LimitStore, MemoryLimitStore, MemoryPositionStore, PositionStore, StoreError,
};
pub use utils::{Clock, ManualClock, SystemClock, current_time_millis};
