//! One-stop imports for the common surface of the crate.
//!
//! ```
//! use exchange_core::prelude::*;
//!
//! let engine = MatchingEngine::new();
//! let order = Order::limit("alice", "BTC/USD", Side::Buy, 1, 10_000, TimeInForce::Gtc);
//! engine.process_order(order).unwrap();
//! ```

pub use crate::config::{CoordinatorConfig, EnginePreset, MatchingConfig, PRICE_SCALE};
pub use crate::engine::{
    MatchingEngine, MetricsSnapshot, OrderBookListener, OrderEvent, OrderEventKind, TradeEvent,
    TradeListener,
};
pub use crate::errors::{EngineError, ErrorClass};
pub use crate::order::{Order, OrderId, OrderKind, OrderStatus, Side, TimeInForce};
pub use crate::orderbook::{
    LevelSnapshot, MatchOutcome, OrderBook, OrderBookError, OrderBookSnapshot,
    OrderBookSnapshotPackage, Trade,
};
pub use crate::risk::{
    BreakerState, BreakerStatus, CircuitBreakerConfig, CircuitBreakerSystem, HaltReason,
    LimitKind, Position, PositionBook, PricePoint, RiskCheckContext, RiskCheckResult,
    RiskCoordinator, RiskError, RiskLimit, RiskOp, RiskOutcome, RiskService, RiskServiceBuilder,
    TradeObserver,
};
pub use crate::store::{
    LimitStore, MemoryLimitStore, MemoryPositionStore, PositionStore, StoreError,
};
pub use crate::utils::{Clock, ManualClock, SystemClock, current_time_millis};
