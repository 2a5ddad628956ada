//! The external risk facade: pre-trade checks, limits, positions, halts.

use crate::config::CoordinatorConfig;
use crate::risk::circuit_breaker::{
    BreakerState, CircuitBreakerConfig, CircuitBreakerSystem, HaltReason, PricePoint,
};
use crate::risk::coordinator::{RiskCoordinator, RiskOp, RiskOutcome, RiskState};
use crate::risk::error::RiskError;
use crate::risk::limits::{LimitRegistry, RiskCheckContext, RiskCheckResult, RiskLimit};
use crate::risk::position::{Position, PositionBook};
use crate::store::{LimitStore, MemoryLimitStore, MemoryPositionStore, PositionStore};
use crate::utils::{Clock, SystemClock};
use std::sync::Arc;
use tracing::{info, warn};

/// Builder wiring the risk service's capabilities.
///
/// Every dependency has an in-process default; production deployments
/// inject their own stores and clock.
pub struct RiskServiceBuilder {
    coordinator_config: CoordinatorConfig,
    breaker_config: CircuitBreakerConfig,
    position_store: Arc<dyn PositionStore>,
    limit_store: Arc<dyn LimitStore>,
    clock: Arc<dyn Clock>,
}

impl RiskServiceBuilder {
    /// Sets the coordinator batching parameters.
    pub fn coordinator_config(mut self, config: CoordinatorConfig) -> Self {
        self.coordinator_config = config;
        self
    }

    /// Sets the default circuit-breaker thresholds.
    pub fn breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker_config = config;
        self
    }

    /// Injects the position persistence capability.
    pub fn position_store(mut self, store: Arc<dyn PositionStore>) -> Self {
        self.position_store = store;
        self
    }

    /// Injects the limit persistence capability.
    pub fn limit_store(mut self, store: Arc<dyn LimitStore>) -> Self {
        self.limit_store = store;
        self
    }

    /// Injects the time source.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Loads persisted state and spawns the coordinator worker.
    ///
    /// Must be called within a Tokio runtime. A store that fails to load
    /// aborts construction.
    pub fn build(self) -> Result<RiskService, RiskError> {
        let positions = Arc::new(PositionBook::new());
        let limits = Arc::new(LimitRegistry::new());
        let breakers = Arc::new(CircuitBreakerSystem::new(
            self.breaker_config,
            self.clock.clone(),
        ));

        let loaded_positions = self.position_store.load_all()?;
        if !loaded_positions.is_empty() {
            info!("loaded {} persisted positions", loaded_positions.len());
        }
        positions.load(loaded_positions);

        let loaded_limits = self.limit_store.load_all()?;
        if !loaded_limits.is_empty() {
            info!("loaded {} persisted limits", loaded_limits.len());
        }
        limits.load(loaded_limits);

        let coordinator = Arc::new(RiskCoordinator::spawn(
            self.coordinator_config,
            RiskState {
                positions: positions.clone(),
                limits: limits.clone(),
                breakers: breakers.clone(),
                position_store: self.position_store.clone(),
                limit_store: self.limit_store.clone(),
                clock: self.clock.clone(),
            },
        ));

        Ok(RiskService {
            positions,
            limits,
            breakers,
            coordinator,
            clock: self.clock,
        })
    }
}

impl Default for RiskServiceBuilder {
    fn default() -> Self {
        Self {
            coordinator_config: CoordinatorConfig::default(),
            breaker_config: CircuitBreakerConfig::default(),
            position_store: Arc::new(MemoryPositionStore::new()),
            limit_store: Arc::new(MemoryLimitStore::new()),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Pre-trade risk service.
///
/// Mutations (position updates, limit registration) and checks funnel
/// through the batch coordinator; halts and reads go straight to their
/// owning component.
pub struct RiskService {
    positions: Arc<PositionBook>,
    limits: Arc<LimitRegistry>,
    breakers: Arc<CircuitBreakerSystem>,
    coordinator: Arc<RiskCoordinator>,
    clock: Arc<dyn Clock>,
}

impl RiskService {
    /// Starts building a service.
    pub fn builder() -> RiskServiceBuilder {
        RiskServiceBuilder::default()
    }

    /// Evaluates an order against the user's limits and the symbol's
    /// circuit breaker.
    ///
    /// A halted symbol (or a global halt) fails the check without
    /// evaluating individual limits.
    pub async fn check_risk(
        &self,
        user_id: &str,
        symbol: &str,
        ctx: RiskCheckContext,
    ) -> Result<RiskCheckResult, RiskError> {
        let outcome = self
            .coordinator
            .submit(RiskOp::CheckLimit {
                user_id: user_id.to_string(),
                symbol: symbol.to_string(),
                ctx,
            })
            .await?;
        match outcome {
            RiskOutcome::Check(result) => Ok(result),
            other => Err(RiskError::Internal(format!(
                "unexpected outcome for check: {other:?}"
            ))),
        }
    }

    /// Registers a risk limit.
    pub async fn add_limit(&self, limit: RiskLimit) -> Result<(), RiskError> {
        self.coordinator.submit(RiskOp::AddLimit { limit }).await?;
        Ok(())
    }

    /// Applies a signed fill to a position through the coordinator.
    pub async fn update_position(
        &self,
        user_id: &str,
        symbol: &str,
        delta: i64,
        price: f64,
    ) -> Result<Position, RiskError> {
        let outcome = self
            .coordinator
            .submit(RiskOp::UpdatePosition {
                user_id: user_id.to_string(),
                symbol: symbol.to_string(),
                delta,
                price,
            })
            .await?;
        match outcome {
            RiskOutcome::PositionUpdated(position) => Ok(position),
            other => Err(RiskError::Internal(format!(
                "unexpected outcome for position update: {other:?}"
            ))),
        }
    }

    /// Point position lookup.
    ///
    /// # Errors
    /// [`RiskError::PositionNotFound`] when the user never traded the
    /// symbol.
    pub fn get_position(&self, user_id: &str, symbol: &str) -> Result<Position, RiskError> {
        self.positions
            .get(user_id, symbol)
            .ok_or_else(|| RiskError::PositionNotFound {
                user_id: user_id.to_string(),
                symbol: symbol.to_string(),
            })
    }

    /// Every position the user holds.
    pub fn list_positions(&self, user_id: &str) -> Vec<Position> {
        self.positions.list(user_id)
    }

    /// Recomputes unrealized PnL for every holder of `symbol` against a
    /// mark price. Returns the number of positions updated.
    ///
    /// Marks are idempotent recomputations and take the positions write
    /// lock directly instead of queueing behind fills.
    pub fn mark_price(&self, symbol: &str, price: f64) -> usize {
        let updated = self.positions.mark(symbol, price, self.clock.now_millis());
        if updated > 0 {
            info!("marked {} positions in {} at {}", updated, symbol, price);
        }
        updated
    }

    /// Manually halts one symbol.
    pub fn halt(&self, symbol: &str, reason: HaltReason) {
        self.breakers.halt(symbol, reason);
    }

    /// Manually resumes one symbol.
    pub fn resume(&self, symbol: &str) -> Result<(), RiskError> {
        self.breakers.resume(symbol)
    }

    /// Suspends trading venue-wide.
    pub fn global_halt(&self, reason: HaltReason) {
        self.breakers.global_halt(reason);
    }

    /// Lifts the venue-wide halt.
    pub fn global_resume(&self) {
        self.breakers.global_resume();
    }

    /// Whether trading in `symbol` is suspended.
    pub fn is_halted(&self, symbol: &str) -> bool {
        self.breakers.is_halted(symbol)
    }

    /// Reports a successful trial order during half-open recovery.
    pub fn test_order(&self, symbol: &str) -> BreakerState {
        self.breakers.test_order(symbol)
    }

    /// Feeds a (price, volume) sample to the circuit-breaker system.
    pub fn ingest(&self, point: PricePoint) -> Option<HaltReason> {
        self.breakers.ingest(point)
    }

    /// The user's configured limits.
    pub fn limits_for(&self, user_id: &str) -> Vec<RiskLimit> {
        self.limits.for_user(user_id)
    }

    /// The coordinator handle, for wiring observers.
    pub fn coordinator(&self) -> Arc<RiskCoordinator> {
        self.coordinator.clone()
    }

    /// The circuit-breaker system, for wiring observers.
    pub fn breakers(&self) -> Arc<CircuitBreakerSystem> {
        self.breakers.clone()
    }

    /// Drains the coordinator and stops its worker.
    pub async fn shutdown(&self) {
        self.coordinator.shutdown().await;
        warn!("risk service shut down");
    }
}
