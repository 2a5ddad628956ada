//! Time-in-force policies.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How long an order stays eligible for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    /// Good-till-canceled: any non-marketable remainder rests in the book.
    #[default]
    Gtc,
    /// Immediate-or-cancel: take whatever is available, cancel the rest.
    Ioc,
    /// Fill-or-kill: execute the full quantity immediately or reject with
    /// no fills at all.
    Fok,
}

impl TimeInForce {
    /// True when a remainder of this order may rest in the book.
    pub fn may_rest(&self) -> bool {
        matches!(self, TimeInForce::Gtc)
    }
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeInForce::Gtc => write!(f, "GTC"),
            TimeInForce::Ioc => write!(f, "IOC"),
            TimeInForce::Fok => write!(f, "FOK"),
        }
    }
}

impl FromStr for TimeInForce {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GTC" => Ok(TimeInForce::Gtc),
            "IOC" => Ok(TimeInForce::Ioc),
            "FOK" => Ok(TimeInForce::Fok),
            other => Err(format!("unknown time in force: {other}")),
        }
    }
}
