//! Engine throughput and latency counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Internal atomic counters. Cheap to update from the order hot path.
#[derive(Debug, Default)]
pub(super) struct EngineMetrics {
    orders_processed: AtomicU64,
    trades_executed: AtomicU64,
    latency_total_nanos: AtomicU64,
    latency_samples: AtomicU64,
}

impl EngineMetrics {
    pub(super) fn record_order(&self, latency_nanos: u64, trade_count: u64) {
        self.orders_processed.fetch_add(1, Ordering::Relaxed);
        self.trades_executed.fetch_add(trade_count, Ordering::Relaxed);
        self.latency_total_nanos
            .fetch_add(latency_nanos, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn snapshot(&self, active_orders: u64) -> MetricsSnapshot {
        let samples = self.latency_samples.load(Ordering::Relaxed);
        let total = self.latency_total_nanos.load(Ordering::Relaxed);
        MetricsSnapshot {
            orders_processed: self.orders_processed.load(Ordering::Relaxed),
            trades_executed: self.trades_executed.load(Ordering::Relaxed),
            avg_processing_latency_nanos: if samples == 0 { 0 } else { total / samples },
            active_orders,
        }
    }
}

/// Point-in-time engine metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Orders accepted for processing since start. Monotonic.
    pub orders_processed: u64,
    /// Trades executed since start. Monotonic.
    pub trades_executed: u64,
    /// Rolling average order-processing latency in nanoseconds.
    pub avg_processing_latency_nanos: u64,
    /// Orders currently resting across all books.
    pub active_orders: u64,
}
