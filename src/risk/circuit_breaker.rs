//! Per-symbol trading halts driven by realized volatility, price moves,
//! and volume spikes, plus a venue-wide halt switch.

use crate::risk::error::RiskError;
use crate::utils::Clock;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};

/// Window used for the volume-spike numerator.
const VOLUME_SPIKE_NUMERATOR_WINDOW: Duration = Duration::from_secs(60);

/// Breaker automaton state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    /// Trading allowed.
    Closed,
    /// Trading halted.
    Open,
    /// Probing: trial orders allowed while recovery is confirmed.
    HalfOpen,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BreakerState::Closed => "CLOSED",
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF_OPEN",
        };
        write!(f, "{s}")
    }
}

/// Why a halt was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HaltReason {
    /// Return variance breached the volatility threshold.
    Volatility,
    /// Windowed price range breached the move threshold.
    PriceMove,
    /// Short-term volume breached the spike threshold.
    Volume,
    /// Halted by the risk pipeline.
    RiskLimit,
    /// Halted by an operator.
    Manual,
    /// Halted on regulatory instruction.
    Regulatory,
    /// Halted because of an internal failure.
    SystemError,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HaltReason::Volatility => "VOLATILITY",
            HaltReason::PriceMove => "PRICE_MOVE",
            HaltReason::Volume => "VOLUME",
            HaltReason::RiskLimit => "RISK_LIMIT",
            HaltReason::Manual => "MANUAL",
            HaltReason::Regulatory => "REGULATORY",
            HaltReason::SystemError => "SYSTEM_ERROR",
        };
        write!(f, "{s}")
    }
}

/// One observed (price, volume) sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    /// Symbol the sample belongs to.
    pub symbol: String,
    /// Trade or mark price.
    pub price: f64,
    /// Volume attributed to the sample.
    pub volume: f64,
    /// Sample timestamp, milliseconds since the epoch.
    pub timestamp: u64,
}

/// Per-symbol breaker thresholds and recovery parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Maximum variance of one-period returns over the volatility window.
    ///
    /// This is a variance, not a standard deviation, and it is not
    /// annualised; thresholds must be calibrated against raw variance.
    pub max_volatility: f64,
    /// Maximum `(max - min) / min` over the price-move window.
    pub max_price_move: f64,
    /// Maximum ratio of last-minute volume to mean volume per sample.
    pub max_volume_spike: f64,
    /// Window for the volatility trigger.
    pub volatility_window: Duration,
    /// Window for the price-move trigger.
    pub price_move_window: Duration,
    /// Window for the volume-spike denominator.
    pub volume_window: Duration,
    /// Minimum halt duration before probing may begin.
    pub min_recovery_time: Duration,
    /// Halt duration after which trading force-resumes.
    pub max_recovery_time: Duration,
    /// Successful trial orders required to close from half-open.
    pub recovery_test_orders: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_volatility: 0.05,
            max_price_move: 0.10,
            max_volume_spike: 5.0,
            volatility_window: Duration::from_secs(300),
            price_move_window: Duration::from_secs(300),
            volume_window: Duration::from_secs(600),
            min_recovery_time: Duration::from_secs(60),
            max_recovery_time: Duration::from_secs(1_800),
            recovery_test_orders: 3,
        }
    }
}

impl CircuitBreakerConfig {
    fn longest_window(&self) -> Duration {
        self.volatility_window
            .max(self.price_move_window)
            .max(self.volume_window)
    }
}

/// Read-only summary of one symbol's breaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerStatus {
    /// Current automaton state.
    pub state: BreakerState,
    /// Reason of the most recent halt, if any.
    pub halt_reason: Option<HaltReason>,
    /// When the most recent halt was issued.
    pub halted_at: u64,
    /// When trading last resumed.
    pub resumed_at: u64,
    /// Halts issued over the breaker's lifetime.
    pub halt_count: u64,
    /// Duration of the most recent completed halt, milliseconds.
    pub last_halt_duration: u64,
    /// Trial orders observed while half-open.
    pub test_order_count: u32,
}

#[derive(Debug)]
struct SymbolBreaker {
    config: CircuitBreakerConfig,
    state: BreakerState,
    halt_reason: Option<HaltReason>,
    halted_at: u64,
    resumed_at: u64,
    halt_count: u64,
    last_halt_duration: u64,
    test_order_count: u32,
    window: VecDeque<PricePoint>,
}

impl SymbolBreaker {
    fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: BreakerState::Closed,
            halt_reason: None,
            halted_at: 0,
            resumed_at: 0,
            halt_count: 0,
            last_halt_duration: 0,
            test_order_count: 0,
            window: VecDeque::new(),
        }
    }

    fn evict(&mut self, now: u64) {
        let horizon = self.config.longest_window().as_millis() as u64;
        let cutoff = now.saturating_sub(horizon);
        while let Some(front) = self.window.front() {
            if front.timestamp < cutoff {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    fn points_within(&self, window: Duration, now: u64) -> impl Iterator<Item = &PricePoint> {
        let cutoff = now.saturating_sub(window.as_millis() as u64);
        self.window
            .iter()
            .filter(move |point| point.timestamp >= cutoff)
    }

    /// Variance of one-period returns over the volatility window.
    fn return_variance(&self, now: u64) -> f64 {
        let prices: Vec<f64> = self
            .points_within(self.config.volatility_window, now)
            .map(|point| point.price)
            .collect();
        if prices.len() < 3 {
            return 0.0;
        }
        let returns: Vec<f64> = prices
            .windows(2)
            .filter(|pair| pair[0] != 0.0)
            .map(|pair| (pair[1] - pair[0]) / pair[0])
            .collect();
        if returns.len() < 2 {
            return 0.0;
        }
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        returns
            .iter()
            .map(|r| (r - mean) * (r - mean))
            .sum::<f64>()
            / returns.len() as f64
    }

    fn price_move(&self, now: u64) -> f64 {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for point in self.points_within(self.config.price_move_window, now) {
            min = min.min(point.price);
            max = max.max(point.price);
        }
        if !min.is_finite() || min <= 0.0 {
            return 0.0;
        }
        (max - min) / min
    }

    fn volume_spike(&self, now: u64) -> f64 {
        let mut total = 0.0;
        let mut samples = 0usize;
        for point in self.points_within(self.config.volume_window, now) {
            total += point.volume;
            samples += 1;
        }
        if samples == 0 || total <= 0.0 {
            return 0.0;
        }
        let mean_per_point = total / samples as f64;
        let recent: f64 = self
            .points_within(VOLUME_SPIKE_NUMERATOR_WINDOW, now)
            .map(|point| point.volume)
            .sum();
        recent / mean_per_point
    }

    /// Evaluates triggers in fixed order; the first breach wins.
    fn active_trigger(&self, now: u64) -> Option<HaltReason> {
        if self.return_variance(now) > self.config.max_volatility {
            return Some(HaltReason::Volatility);
        }
        if self.price_move(now) > self.config.max_price_move {
            return Some(HaltReason::PriceMove);
        }
        if self.volume_spike(now) > self.config.max_volume_spike {
            return Some(HaltReason::Volume);
        }
        None
    }

    fn open(&mut self, reason: HaltReason, now: u64) {
        self.state = BreakerState::Open;
        self.halt_reason = Some(reason);
        self.halted_at = now;
        self.halt_count += 1;
        self.test_order_count = 0;
    }

    fn close(&mut self, now: u64) {
        self.last_halt_duration = now.saturating_sub(self.halted_at);
        self.state = BreakerState::Closed;
        self.resumed_at = now;
        self.test_order_count = 0;
    }

    /// Drives time-based transitions: OPEN to HALF_OPEN once the minimum
    /// recovery elapsed with no live trigger, OPEN to CLOSED once the
    /// maximum halt time elapsed.
    fn poll(&mut self, symbol: &str, now: u64) {
        if self.state != BreakerState::Open {
            return;
        }
        let elapsed = now.saturating_sub(self.halted_at);
        if elapsed >= self.config.max_recovery_time.as_millis() as u64 {
            warn!("breaker for {}: max halt time exceeded, forcing resume", symbol);
            self.close(now);
        } else if elapsed >= self.config.min_recovery_time.as_millis() as u64
            && self.active_trigger(now).is_none()
        {
            info!("breaker for {} entering half-open probe", symbol);
            self.state = BreakerState::HalfOpen;
            self.test_order_count = 0;
        }
    }

    fn status(&self) -> BreakerStatus {
        BreakerStatus {
            state: self.state,
            halt_reason: self.halt_reason,
            halted_at: self.halted_at,
            resumed_at: self.resumed_at,
            halt_count: self.halt_count,
            last_halt_duration: self.last_halt_duration,
            test_order_count: self.test_order_count,
        }
    }
}

/// The circuit-breaker system: one automaton per symbol plus the global
/// halt switch.
///
/// `is_halted` is O(1) average: an atomic load for the global switch and
/// one map lookup for the symbol.
pub struct CircuitBreakerSystem {
    breakers: DashMap<String, SymbolBreaker>,
    default_config: CircuitBreakerConfig,
    global_halted: AtomicBool,
    global_reason: Mutex<Option<HaltReason>>,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerSystem {
    /// Creates a system applying `default_config` to every new symbol.
    pub fn new(default_config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            breakers: DashMap::new(),
            default_config,
            global_halted: AtomicBool::new(false),
            global_reason: Mutex::new(None),
            clock,
        }
    }

    /// Overrides the configuration for one symbol.
    ///
    /// Resets that symbol's automaton and window.
    pub fn configure_symbol(&self, symbol: &str, config: CircuitBreakerConfig) {
        self.breakers
            .insert(symbol.to_string(), SymbolBreaker::new(config));
    }

    /// Feeds one sample and evaluates triggers.
    ///
    /// Returns the halt reason when this sample newly opened the breaker.
    /// Samples arriving while the breaker is open still extend the window
    /// but cannot re-trigger it.
    pub fn ingest(&self, point: PricePoint) -> Option<HaltReason> {
        let now = self.clock.now_millis();
        let symbol = point.symbol.clone();
        let mut entry = self
            .breakers
            .entry(symbol.clone())
            .or_insert_with(|| SymbolBreaker::new(self.default_config.clone()));
        let breaker = entry.value_mut();

        breaker.window.push_back(point);
        breaker.evict(now);
        breaker.poll(&symbol, now);

        match breaker.state {
            BreakerState::Open => None,
            BreakerState::Closed | BreakerState::HalfOpen => {
                let trigger = breaker.active_trigger(now)?;
                info!("breaker for {} opened: {}", symbol, trigger);
                breaker.open(trigger, now);
                Some(trigger)
            }
        }
    }

    /// Whether trading in `symbol` is currently suspended.
    ///
    /// The global halt overrides per-symbol state without mutating it.
    pub fn is_halted(&self, symbol: &str) -> bool {
        if self.global_halted.load(Ordering::Acquire) {
            return true;
        }
        let now = self.clock.now_millis();
        match self.breakers.get_mut(symbol) {
            Some(mut entry) => {
                let breaker = entry.value_mut();
                breaker.poll(symbol, now);
                breaker.state == BreakerState::Open
            }
            None => false,
        }
    }

    /// Current automaton state for `symbol`.
    pub fn state(&self, symbol: &str) -> BreakerState {
        let now = self.clock.now_millis();
        match self.breakers.get_mut(symbol) {
            Some(mut entry) => {
                let breaker = entry.value_mut();
                breaker.poll(symbol, now);
                breaker.state
            }
            None => BreakerState::Closed,
        }
    }

    /// Read-only status summary for `symbol`, if it has a breaker.
    pub fn status(&self, symbol: &str) -> Option<BreakerStatus> {
        self.breakers.get(symbol).map(|entry| entry.value().status())
    }

    /// Reports one successful trial order while half-open.
    ///
    /// After the configured number of trials the breaker closes. Returns
    /// the state after accounting for the trial.
    pub fn test_order(&self, symbol: &str) -> BreakerState {
        let now = self.clock.now_millis();
        let Some(mut entry) = self.breakers.get_mut(symbol) else {
            return BreakerState::Closed;
        };
        let breaker = entry.value_mut();
        breaker.poll(symbol, now);
        if breaker.state == BreakerState::HalfOpen {
            breaker.test_order_count += 1;
            if breaker.test_order_count >= breaker.config.recovery_test_orders {
                info!("breaker for {} closed after recovery probe", symbol);
                breaker.close(now);
            }
        }
        breaker.state
    }

    /// Manually halts one symbol. Halting an already-open breaker is a
    /// no-op.
    pub fn halt(&self, symbol: &str, reason: HaltReason) {
        let now = self.clock.now_millis();
        let mut entry = self
            .breakers
            .entry(symbol.to_string())
            .or_insert_with(|| SymbolBreaker::new(self.default_config.clone()));
        let breaker = entry.value_mut();
        if breaker.state == BreakerState::Open {
            return;
        }
        info!("manual halt for {}: {}", symbol, reason);
        breaker.open(reason, now);
    }

    /// Manually resumes one symbol.
    ///
    /// # Errors
    /// [`RiskError::BreakerNotHalted`] when the breaker is already closed.
    pub fn resume(&self, symbol: &str) -> Result<(), RiskError> {
        let now = self.clock.now_millis();
        let Some(mut entry) = self.breakers.get_mut(symbol) else {
            return Err(RiskError::BreakerNotHalted {
                symbol: symbol.to_string(),
            });
        };
        let breaker = entry.value_mut();
        if breaker.state == BreakerState::Closed {
            return Err(RiskError::BreakerNotHalted {
                symbol: symbol.to_string(),
            });
        }
        info!("manual resume for {}", symbol);
        breaker.close(now);
        Ok(())
    }

    /// Suspends trading in every symbol without touching per-symbol state.
    pub fn global_halt(&self, reason: HaltReason) {
        info!("global halt: {}", reason);
        *lock(&self.global_reason) = Some(reason);
        self.global_halted.store(true, Ordering::Release);
    }

    /// Lifts the venue-wide halt.
    pub fn global_resume(&self) {
        info!("global resume");
        self.global_halted.store(false, Ordering::Release);
        *lock(&self.global_reason) = None;
    }

    /// Whether the venue-wide halt is set.
    pub fn is_global_halted(&self) -> bool {
        self.global_halted.load(Ordering::Acquire)
    }

    /// Reason of the venue-wide halt, if set.
    pub fn global_halt_reason(&self) -> Option<HaltReason> {
        *lock(&self.global_reason)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
