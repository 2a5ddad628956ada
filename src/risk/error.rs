//! Risk subsystem error types.

use crate::errors::ErrorClass;
use crate::risk::limits::LimitKind;
use crate::store::StoreError;
use thiserror::Error;

/// Failures raised by the risk pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RiskError {
    /// A pre-trade check failed on a configured limit.
    #[error("risk limit exceeded: {kind} value {current} over limit {limit}")]
    LimitExceeded {
        /// Kind of the failing limit.
        kind: LimitKind,
        /// Observed value.
        current: f64,
        /// Configured threshold.
        limit: f64,
    },

    /// The symbol (or the venue) is halted.
    #[error("circuit breaker triggered for {symbol}")]
    CircuitBreakerTriggered {
        /// The halted symbol.
        symbol: String,
    },

    /// Resume was requested for a breaker that is not halted.
    #[error("circuit breaker for {symbol} is not halted")]
    BreakerNotHalted {
        /// The symbol whose breaker was already closed.
        symbol: String,
    },

    /// The user has never traded the symbol.
    #[error("no position for user {user_id} in {symbol}")]
    PositionNotFound {
        /// The user queried.
        user_id: String,
        /// The symbol queried.
        symbol: String,
    },

    /// The coordinator's submission queue is at capacity.
    #[error("risk queue full")]
    QueueFull,

    /// The coordinator is shutting down and accepts no new ops.
    #[error("risk coordinator shutting down")]
    ShuttingDown,

    /// The submission was not answered within the caller's deadline.
    #[error("risk operation timed out")]
    Timeout,

    /// A persistence capability failed.
    #[error("store: {0}")]
    Store(#[from] StoreError),

    /// A defect inside the risk pipeline.
    #[error("internal risk error: {0}")]
    Internal(String),
}

impl RiskError {
    /// The handling class of this failure.
    pub fn class(&self) -> ErrorClass {
        match self {
            RiskError::LimitExceeded { .. }
            | RiskError::CircuitBreakerTriggered { .. }
            | RiskError::BreakerNotHalted { .. } => ErrorClass::Business,
            RiskError::PositionNotFound { .. } => ErrorClass::NotFound,
            RiskError::QueueFull | RiskError::ShuttingDown | RiskError::Timeout => {
                ErrorClass::Transient
            }
            RiskError::Store(_) | RiskError::Internal(_) => ErrorClass::Internal,
        }
    }

    /// Whether a caller may retry with backoff.
    pub fn is_retryable(&self) -> bool {
        self.class().is_retryable()
    }
}
