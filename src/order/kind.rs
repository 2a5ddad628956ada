//! Order kinds accepted at the engine boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The execution style of an order.
///
/// The matching core executes `Market` and `Limit` orders. `Stop` and
/// `StopLimit` exist so boundary types are complete, but triggering them is
/// the responsibility of a layer above the book; submitting one directly is
/// rejected as unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    /// Execute immediately against resting liquidity at any price.
    Market,
    /// Execute at `price` or better; the remainder may rest.
    Limit,
    /// Becomes a market order once `stop_price` is touched.
    Stop,
    /// Becomes a limit order once `stop_price` is touched.
    StopLimit,
}

impl OrderKind {
    /// True for kinds the matching core executes directly.
    pub fn is_executable(&self) -> bool {
        matches!(self, OrderKind::Market | OrderKind::Limit)
    }

    /// True when the kind carries a meaningful limit price.
    pub fn requires_price(&self) -> bool {
        matches!(self, OrderKind::Limit | OrderKind::StopLimit)
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderKind::Market => write!(f, "MARKET"),
            OrderKind::Limit => write!(f, "LIMIT"),
            OrderKind::Stop => write!(f, "STOP"),
            OrderKind::StopLimit => write!(f, "STOP_LIMIT"),
        }
    }
}

impl FromStr for OrderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MARKET" => Ok(OrderKind::Market),
            "LIMIT" => Ok(OrderKind::Limit),
            "STOP" => Ok(OrderKind::Stop),
            "STOP_LIMIT" => Ok(OrderKind::StopLimit),
            other => Err(format!("unknown order kind: {other}")),
        }
    }
}
