//! Per-user risk limits and their evaluation.

use crate::risk::position::PositionBook;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use std::time::Duration;
use tracing::debug;

/// What a limit constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LimitKind {
    /// Absolute open position quantity.
    Position,
    /// Single-order quantity.
    OrderSize,
    /// Total absolute notional across the user's positions.
    Exposure,
    /// Peak-to-trough account drawdown.
    Drawdown,
    /// Trades per second over the caller's window.
    TradeFrequency,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LimitKind::Position => "POSITION",
            LimitKind::OrderSize => "ORDER_SIZE",
            LimitKind::Exposure => "EXPOSURE",
            LimitKind::Drawdown => "DRAWDOWN",
            LimitKind::TradeFrequency => "TRADE_FREQUENCY",
        };
        write!(f, "{s}")
    }
}

/// One configured limit for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLimit {
    /// User the limit applies to.
    pub user_id: String,
    /// What the limit constrains.
    pub kind: LimitKind,
    /// Restrict to one symbol; `None` covers all symbols.
    pub symbol: Option<String>,
    /// Threshold. Checks fail when the current value exceeds it.
    pub value: f64,
    /// Disabled limits are skipped entirely.
    pub enabled: bool,
}

impl RiskLimit {
    /// Builds an enabled, all-symbols limit.
    pub fn new(user_id: impl Into<String>, kind: LimitKind, value: f64) -> Self {
        Self {
            user_id: user_id.into(),
            kind,
            symbol: None,
            value,
            enabled: true,
        }
    }

    /// Restricts the limit to a single symbol.
    pub fn for_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// Whether this limit participates in a check for `symbol`.
    pub fn applies_to(&self, symbol: &str) -> bool {
        self.enabled
            && self
                .symbol
                .as_deref()
                .map(|own| own == symbol)
                .unwrap_or(true)
    }
}

/// Inputs for one pre-trade check, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskCheckContext {
    /// Quantity of the order under evaluation.
    pub order_size: f64,
    /// Reference price used for exposure valuation.
    pub current_price: f64,
    /// The user's signed position in the order's symbol.
    pub current_position: f64,
    /// Current account drawdown as a fraction.
    pub drawdown: f64,
    /// Trades the user placed within `time_window`.
    pub trade_count: u64,
    /// Window `trade_count` was measured over.
    pub time_window: Duration,
}

impl Default for RiskCheckContext {
    fn default() -> Self {
        Self {
            order_size: 0.0,
            current_price: 0.0,
            current_position: 0.0,
            drawdown: 0.0,
            trade_count: 0,
            time_window: Duration::from_secs(60),
        }
    }
}

/// Outcome of a pre-trade check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskCheckResult {
    /// True when every applicable limit passed.
    pub passed: bool,
    /// Kind of the first limit that failed.
    pub failed_kind: Option<LimitKind>,
    /// Observed value of the failing metric.
    pub current_value: f64,
    /// Configured threshold of the failing limit.
    pub limit_value: f64,
    /// Human-readable explanation.
    pub message: String,
}

impl RiskCheckResult {
    /// A passing result.
    pub fn pass() -> Self {
        Self {
            passed: true,
            failed_kind: None,
            current_value: 0.0,
            limit_value: 0.0,
            message: "all limits passed".to_string(),
        }
    }

    /// A failing result for one limit.
    pub fn fail(kind: LimitKind, current_value: f64, limit_value: f64) -> Self {
        Self {
            passed: false,
            failed_kind: Some(kind),
            current_value,
            limit_value,
            message: format!("{kind} limit exceeded: {current_value} > {limit_value}"),
        }
    }

    /// The failing result used while a symbol or the venue is halted.
    pub fn halted(symbol: &str) -> Self {
        Self {
            passed: false,
            failed_kind: None,
            current_value: 0.0,
            limit_value: 0.0,
            message: format!("circuit breaker triggered for {symbol}"),
        }
    }
}

/// All configured limits, owned behind one reader/writer lock.
#[derive(Debug, Default)]
pub struct LimitRegistry {
    inner: RwLock<HashMap<String, Vec<RiskLimit>>>,
}

impl LimitRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one limit.
    pub fn add(&self, limit: RiskLimit) {
        write(&self.inner)
            .entry(limit.user_id.clone())
            .or_default()
            .push(limit);
    }

    /// Registers a batch of limits under one write-lock acquisition.
    pub(crate) fn add_batch(&self, limits: Vec<RiskLimit>) {
        let mut inner = write(&self.inner);
        for limit in limits {
            inner.entry(limit.user_id.clone()).or_default().push(limit);
        }
    }

    /// Copies out the user's configured limits.
    pub fn for_user(&self, user_id: &str) -> Vec<RiskLimit> {
        read(&self.inner).get(user_id).cloned().unwrap_or_default()
    }

    /// Seeds the registry from persisted state.
    pub(crate) fn load(&self, limits: Vec<RiskLimit>) {
        let mut inner = write(&self.inner);
        for limit in limits {
            inner.entry(limit.user_id.clone()).or_default().push(limit);
        }
    }

    /// Evaluates one check against the user's applicable limits.
    ///
    /// Limits are checked in registration order and the first failure
    /// wins. A limit fails iff its current value strictly exceeds the
    /// threshold.
    pub fn evaluate(
        &self,
        positions: &PositionBook,
        user_id: &str,
        symbol: &str,
        ctx: &RiskCheckContext,
    ) -> RiskCheckResult {
        let inner = read(&self.inner);
        Self::evaluate_with(&inner, positions, user_id, symbol, ctx)
    }

    /// Evaluates a group of checks under a single read-lock acquisition.
    ///
    /// `halted` carries the per-item circuit-breaker verdict computed by
    /// the caller; halted items short-circuit without touching limits.
    pub(crate) fn evaluate_batch(
        &self,
        positions: &PositionBook,
        items: &[(String, String, RiskCheckContext)],
        halted: &[bool],
    ) -> Vec<RiskCheckResult> {
        let inner = read(&self.inner);
        items
            .iter()
            .zip(halted)
            .map(|((user_id, symbol, ctx), halted)| {
                if *halted {
                    RiskCheckResult::halted(symbol)
                } else {
                    Self::evaluate_with(&inner, positions, user_id, symbol, ctx)
                }
            })
            .collect()
    }

    fn evaluate_with(
        inner: &HashMap<String, Vec<RiskLimit>>,
        positions: &PositionBook,
        user_id: &str,
        symbol: &str,
        ctx: &RiskCheckContext,
    ) -> RiskCheckResult {
        let Some(limits) = inner.get(user_id) else {
            return RiskCheckResult::pass();
        };

        for limit in limits.iter().filter(|limit| limit.applies_to(symbol)) {
            let current_value = match limit.kind {
                LimitKind::Position => ctx.current_position.abs(),
                LimitKind::OrderSize => ctx.order_size,
                LimitKind::Exposure => positions.exposure(user_id, ctx.current_price),
                LimitKind::Drawdown => ctx.drawdown,
                LimitKind::TradeFrequency => {
                    let seconds = ctx.time_window.as_secs_f64();
                    if seconds > 0.0 {
                        ctx.trade_count as f64 / seconds
                    } else {
                        f64::INFINITY
                    }
                }
            };
            if current_value > limit.value {
                debug!(
                    "risk check failed for {} on {}: {} {} > {}",
                    user_id, symbol, limit.kind, current_value, limit.value
                );
                return RiskCheckResult::fail(limit.kind, current_value, limit.value);
            }
        }
        RiskCheckResult::pass()
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
