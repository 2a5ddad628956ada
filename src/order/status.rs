//! Order lifecycle status.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where an order stands in its lifecycle.
///
/// Transitions form a DAG: `Pending` and `PartiallyFilled` are live,
/// everything else is terminal and admits no further transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Accepted, nothing filled yet.
    #[default]
    Pending,
    /// Some quantity filled, remainder still live.
    PartiallyFilled,
    /// Fully filled.
    Filled,
    /// Canceled by the user or by time-in-force policy; may carry partial
    /// fills.
    Canceled,
    /// Refused before touching the book.
    Rejected,
    /// Lapsed past its expiry timestamp.
    Expired,
}

impl OrderStatus {
    /// True once no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Canceled
                | OrderStatus::Rejected
                | OrderStatus::Expired
        )
    }

    /// Whether moving from `self` to `next` is a legal lifecycle edge.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match self {
            OrderStatus::Pending => next != OrderStatus::Pending,
            OrderStatus::PartiallyFilled => matches!(
                next,
                OrderStatus::PartiallyFilled
                    | OrderStatus::Filled
                    | OrderStatus::Canceled
                    | OrderStatus::Expired
            ),
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Expired => "EXPIRED",
        };
        write!(f, "{s}")
    }
}
