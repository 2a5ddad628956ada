//! Crate-wide error classification and the engine-level error type.

use crate::order::OrderId;
use crate::orderbook::OrderBookError;
use crate::risk::RiskError;
use thiserror::Error;

/// Coarse failure class used to pick a handling policy.
///
/// Validation and business failures must never be retried; transient
/// failures may be retried with backoff; internal failures are logged at
/// critical severity and surface as rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The request itself is malformed. No state was changed.
    Validation,
    /// The referenced entity does not exist.
    NotFound,
    /// The request is well-formed but refused by a business rule.
    Business,
    /// A capacity or lifecycle condition that may clear; retryable.
    Transient,
    /// A defect inside the engine.
    Internal,
}

impl ErrorClass {
    /// Only transient failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorClass::Transient)
    }
}

/// Failures surfaced at the matching-engine boundary.
///
/// Book-level and risk-level failures pass through unchanged so callers
/// always see the originating component in the message.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// A failure raised by a symbol's order book.
    #[error("order book: {0}")]
    Book(#[from] OrderBookError),

    /// A failure raised by the risk subsystem.
    #[error("risk: {0}")]
    Risk(#[from] RiskError),

    /// No book exists for the requested symbol.
    #[error("engine: unknown symbol {0}")]
    SymbolNotFound(String),

    /// The order id is not tracked by any book.
    #[error("engine: order {0} not found")]
    OrderNotFound(OrderId),

    /// The engine has been stopped and accepts no new work.
    #[error("engine: stopped, not accepting orders")]
    EngineStopped,

    /// Matching failed for an internal reason; the order was rejected.
    #[error("engine: matching failed: {message}")]
    MatchingFailed {
        /// What went wrong.
        message: String,
    },
}

impl EngineError {
    /// The handling class of this failure.
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::Book(err) => err.class(),
            EngineError::Risk(err) => err.class(),
            EngineError::SymbolNotFound(_) | EngineError::OrderNotFound(_) => ErrorClass::NotFound,
            EngineError::EngineStopped => ErrorClass::Transient,
            EngineError::MatchingFailed { .. } => ErrorClass::Internal,
        }
    }

    /// Whether a caller may retry this operation with backoff.
    pub fn is_retryable(&self) -> bool {
        self.class().is_retryable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(ErrorClass::Transient.is_retryable());
        assert!(!ErrorClass::Validation.is_retryable());
        assert!(!ErrorClass::Business.is_retryable());
        assert!(!ErrorClass::NotFound.is_retryable());
        assert!(!ErrorClass::Internal.is_retryable());
    }

    #[test]
    fn test_engine_stopped_is_transient() {
        assert_eq!(EngineError::EngineStopped.class(), ErrorClass::Transient);
        assert!(EngineError::EngineStopped.is_retryable());
    }

    #[test]
    fn test_book_error_class_passes_through() {
        let err = EngineError::Book(OrderBookError::OrderNotFound(OrderId(7)));
        assert_eq!(err.class(), ErrorClass::NotFound);
        let shown = format!("{err}");
        assert!(shown.contains("order book:"));
    }
}
