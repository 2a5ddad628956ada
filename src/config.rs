//! Recognised configuration options and engine presets.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Number of price units per whole currency unit.
///
/// Prices throughout the crate are fixed-point integers with two implied
/// decimal places, so a `tick_size` of 1 equals 0.01 in display terms.
pub const PRICE_SCALE: u32 = 100;

/// Options for the matching engine and the books it creates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Minimum price increment in price units.
    pub tick_size: u128,
    /// Minimum quantity increment in lots.
    pub lot_size: u64,
    /// Cap on resting orders per symbol. `None` disables the cap.
    pub max_orders_per_symbol: Option<usize>,
    /// Default depth for order book snapshots.
    pub snapshot_depth: usize,
    /// Worker parallelism hint for callers that front the engine with a
    /// queue. The engine itself is safe at any parallelism.
    pub worker_count: usize,
    /// Deadline hint for a single order submission.
    pub processing_timeout: Duration,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            tick_size: 1,
            lot_size: 1,
            max_orders_per_symbol: None,
            snapshot_depth: 10,
            worker_count: 4,
            processing_timeout: Duration::from_secs(5),
        }
    }
}

/// Options for the risk batch coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Ops buffered before a batch is forced out.
    pub batch_size: usize,
    /// Longest an accepted op waits before its batch is processed.
    pub tick_interval: Duration,
    /// Submission channel capacity; submitters beyond it get `QueueFull`.
    pub queue_capacity: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            tick_interval: Duration::from_millis(10),
            queue_capacity: 1_000,
        }
    }
}

/// Named parameter presets.
///
/// A preset is nothing but a mapping to numeric configuration; there is a
/// single engine implementation behind all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnginePreset {
    /// Balanced defaults.
    #[default]
    Standard,
    /// Deeper snapshots, tighter batching, larger queues.
    Hft,
    /// Throughput-leaning batch parameters.
    Optimized,
    /// Alias kept for configurations written against older deployments.
    Unified,
}

impl EnginePreset {
    /// Matching options this preset maps to.
    pub fn matching(&self) -> MatchingConfig {
        match self {
            EnginePreset::Standard | EnginePreset::Unified => MatchingConfig::default(),
            EnginePreset::Hft => MatchingConfig {
                snapshot_depth: 20,
                worker_count: 8,
                processing_timeout: Duration::from_millis(500),
                ..MatchingConfig::default()
            },
            EnginePreset::Optimized => MatchingConfig {
                worker_count: 8,
                ..MatchingConfig::default()
            },
        }
    }

    /// Coordinator options this preset maps to.
    pub fn coordinator(&self) -> CoordinatorConfig {
        match self {
            EnginePreset::Standard | EnginePreset::Unified => CoordinatorConfig::default(),
            EnginePreset::Hft => CoordinatorConfig {
                batch_size: 200,
                tick_interval: Duration::from_millis(5),
                queue_capacity: 4_096,
            },
            EnginePreset::Optimized => CoordinatorConfig {
                batch_size: 200,
                ..CoordinatorConfig::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let matching = MatchingConfig::default();
        assert_eq!(matching.tick_size, 1);
        assert_eq!(matching.snapshot_depth, 10);

        let coordinator = CoordinatorConfig::default();
        assert_eq!(coordinator.batch_size, 100);
        assert_eq!(coordinator.tick_interval, Duration::from_millis(10));
        assert_eq!(coordinator.queue_capacity, 1_000);
    }

    #[test]
    fn test_presets_are_pure_parameter_mappings() {
        assert_eq!(
            EnginePreset::Unified.matching(),
            EnginePreset::Standard.matching()
        );
        assert_eq!(EnginePreset::Hft.coordinator().batch_size, 200);
        assert!(EnginePreset::Hft.matching().snapshot_depth > 10);
    }
}
