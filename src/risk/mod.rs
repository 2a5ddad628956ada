//! Pre-trade risk: positions, limits, circuit breakers, the batching
//! coordinator, and the service facade tying them together.

mod circuit_breaker;
mod coordinator;
mod error;
mod limits;
mod observer;
mod position;
mod service;

pub use circuit_breaker::{
    BreakerState, BreakerStatus, CircuitBreakerConfig, CircuitBreakerSystem, HaltReason,
    PricePoint,
};
pub use coordinator::{RiskCoordinator, RiskOp, RiskOutcome};
pub use error::RiskError;
pub use limits::{LimitKind, LimitRegistry, RiskCheckContext, RiskCheckResult, RiskLimit};
pub use observer::TradeObserver;
pub use position::{Position, PositionBook};
pub use service::{RiskService, RiskServiceBuilder};
