//! Order book snapshots for market data.

use crate::orderbook::book::OrderBook;
use crate::orderbook::error::OrderBookError;
use crate::utils::current_time_millis;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One aggregated price level in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    /// The level's price.
    pub price: u128,
    /// Aggregate open quantity at this price.
    pub quantity: u64,
    /// Number of resting orders at this price.
    pub order_count: u64,
}

/// A depth-limited view of the book at a point in time.
///
/// Bids are ordered best (highest) first, asks best (lowest) first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    /// The symbol this snapshot describes.
    pub symbol: String,
    /// Book mutation sequence at capture time.
    pub sequence: u64,
    /// Capture timestamp, milliseconds since the epoch.
    pub timestamp: u64,
    /// Aggregated bid levels, best first.
    pub bids: Vec<LevelSnapshot>,
    /// Aggregated ask levels, best first.
    pub asks: Vec<LevelSnapshot>,
}

impl OrderBookSnapshot {
    /// Best bid as (price, quantity).
    pub fn best_bid(&self) -> Option<(u128, u64)> {
        self.bids.first().map(|level| (level.price, level.quantity))
    }

    /// Best ask as (price, quantity).
    pub fn best_ask(&self) -> Option<(u128, u64)> {
        self.asks.first().map(|level| (level.price, level.quantity))
    }

    /// Mid price between best bid and best ask.
    pub fn mid_price(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some((bid as f64 + ask as f64) / 2.0),
            _ => None,
        }
    }

    /// Spread between best ask and best bid.
    pub fn spread(&self) -> Option<u128> {
        match (self.best_bid(), self.best_ask()) {
            (Some((bid, _)), Some((ask, _))) => Some(ask.saturating_sub(bid)),
            _ => None,
        }
    }

    /// Total visible quantity on the bid side.
    pub fn total_bid_volume(&self) -> u64 {
        self.bids.iter().map(|level| level.quantity).sum()
    }

    /// Total visible quantity on the ask side.
    pub fn total_ask_volume(&self) -> u64 {
        self.asks.iter().map(|level| level.quantity).sum()
    }

    /// Equality ignoring the capture timestamp.
    ///
    /// Two snapshots of an unmutated book are equal by this measure even
    /// though their timestamps differ.
    pub fn same_depth(&self, other: &OrderBookSnapshot) -> bool {
        self.symbol == other.symbol
            && self.sequence == other.sequence
            && self.bids == other.bids
            && self.asks == other.asks
    }
}

/// Format version for checksum-protected snapshot packages.
pub const ORDERBOOK_SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Wrapper that adds integrity validation to an [`OrderBookSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSnapshotPackage {
    /// Version of the snapshot schema for forward compatibility.
    pub version: u32,
    /// Snapshot payload.
    pub snapshot: OrderBookSnapshot,
    /// Hex-encoded SHA-256 of the serialized snapshot.
    pub checksum: String,
}

impl OrderBookSnapshotPackage {
    /// Creates a package, computing the checksum of the snapshot contents.
    pub fn new(snapshot: OrderBookSnapshot) -> Result<Self, OrderBookError> {
        let checksum = Self::compute_checksum(&snapshot)?;
        Ok(Self {
            version: ORDERBOOK_SNAPSHOT_FORMAT_VERSION,
            snapshot,
            checksum,
        })
    }

    /// Serializes the package to JSON.
    pub fn to_json(&self) -> Result<String, OrderBookError> {
        serde_json::to_string(self).map_err(|error| OrderBookError::InvalidOrder {
            message: format!("snapshot serialization failed: {error}"),
        })
    }

    /// Deserializes a package from JSON.
    pub fn from_json(data: &str) -> Result<Self, OrderBookError> {
        serde_json::from_str(data).map_err(|error| OrderBookError::InvalidOrder {
            message: format!("snapshot deserialization failed: {error}"),
        })
    }

    /// Validates the format version and checksum.
    pub fn validate(&self) -> Result<(), OrderBookError> {
        if self.version != ORDERBOOK_SNAPSHOT_FORMAT_VERSION {
            return Err(OrderBookError::InvalidOrder {
                message: format!(
                    "unsupported snapshot version: {} (expected {})",
                    self.version, ORDERBOOK_SNAPSHOT_FORMAT_VERSION
                ),
            });
        }
        let computed = Self::compute_checksum(&self.snapshot)?;
        if computed != self.checksum {
            return Err(OrderBookError::InvalidOrder {
                message: format!(
                    "snapshot checksum mismatch: expected {}, computed {computed}",
                    self.checksum
                ),
            });
        }
        Ok(())
    }

    fn compute_checksum(snapshot: &OrderBookSnapshot) -> Result<String, OrderBookError> {
        let payload =
            serde_json::to_vec(snapshot).map_err(|error| OrderBookError::InvalidOrder {
                message: format!("snapshot serialization failed: {error}"),
            })?;
        let digest = Sha256::digest(&payload);
        Ok(digest.iter().map(|byte| format!("{byte:02x}")).collect())
    }
}

impl OrderBook {
    /// Captures up to `depth` aggregated levels per side.
    ///
    /// Taken under the book gate so the two sides are mutually consistent;
    /// the result is a deep copy sharing no state with the live book.
    pub fn snapshot(&self, depth: usize) -> OrderBookSnapshot {
        let _guard = self.lock_gate();
        let bids = self
            .bids
            .iter()
            .rev()
            .take(depth)
            .map(|entry| LevelSnapshot {
                price: *entry.key(),
                quantity: entry.value().total_quantity(),
                order_count: entry.value().order_count(),
            })
            .collect();
        let asks = self
            .asks
            .iter()
            .take(depth)
            .map(|entry| LevelSnapshot {
                price: *entry.key(),
                quantity: entry.value().total_quantity(),
                order_count: entry.value().order_count(),
            })
            .collect();
        OrderBookSnapshot {
            symbol: self.symbol.clone(),
            sequence: self.sequence(),
            timestamp: current_time_millis(),
            bids,
            asks,
        }
    }
}
