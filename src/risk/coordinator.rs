//! Single-writer batching coordinator for risk mutations and checks.
//!
//! All mutating risk operations funnel through one bounded channel into a
//! single worker task. The worker buffers ops until the batch size is hit
//! or the tick interval elapses, groups each batch by operation type, and
//! processes every group under a single acquisition of its shared lock.
//! This amortises lock traffic and bounds tail latency at roughly one
//! tick plus batch processing time.

use crate::config::CoordinatorConfig;
use crate::risk::circuit_breaker::CircuitBreakerSystem;
use crate::risk::error::RiskError;
use crate::risk::limits::{LimitRegistry, RiskCheckContext, RiskCheckResult, RiskLimit};
use crate::risk::position::{Position, PositionBook};
use crate::store::{LimitStore, PositionStore};
use crate::utils::Clock;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// One risk operation with a strongly typed payload.
///
/// The set of operations is closed: anything else is unrepresentable at
/// the boundary rather than failing at dispatch.
#[derive(Debug, Clone)]
pub enum RiskOp {
    /// Apply a signed fill to a position.
    UpdatePosition {
        /// Account to update.
        user_id: String,
        /// Symbol traded.
        symbol: String,
        /// Signed quantity delta in lots.
        delta: i64,
        /// Fill price in price units.
        price: f64,
    },
    /// Evaluate a pre-trade check.
    CheckLimit {
        /// Account under check.
        user_id: String,
        /// Symbol of the order.
        symbol: String,
        /// Caller-supplied check inputs.
        ctx: RiskCheckContext,
    },
    /// Register a risk limit.
    AddLimit {
        /// The limit to register.
        limit: RiskLimit,
    },
}

/// Successful result of one risk operation.
#[derive(Debug, Clone)]
pub enum RiskOutcome {
    /// The position after the fill was applied.
    PositionUpdated(Position),
    /// The evaluation outcome of a pre-trade check.
    Check(RiskCheckResult),
    /// The limit was registered.
    LimitAdded,
}

type Reply = oneshot::Sender<Result<RiskOutcome, RiskError>>;

struct Submission {
    op: RiskOp,
    reply: Reply,
}

/// Shared state the worker operates on.
pub(crate) struct RiskState {
    pub(crate) positions: Arc<PositionBook>,
    pub(crate) limits: Arc<LimitRegistry>,
    pub(crate) breakers: Arc<CircuitBreakerSystem>,
    pub(crate) position_store: Arc<dyn PositionStore>,
    pub(crate) limit_store: Arc<dyn LimitStore>,
    pub(crate) clock: Arc<dyn Clock>,
}

/// Handle to the coordinator worker.
///
/// Cloned senders are transient; dropping the handle's sender via
/// [`RiskCoordinator::shutdown`] lets the worker drain the queue and stop.
pub struct RiskCoordinator {
    tx: Mutex<Option<mpsc::Sender<Submission>>>,
    shutting_down: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RiskCoordinator {
    /// Spawns the worker task. Must be called within a Tokio runtime.
    pub(crate) fn spawn(config: CoordinatorConfig, state: RiskState) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let worker = tokio::spawn(run_worker(config, rx, state));
        Self {
            tx: Mutex::new(Some(tx)),
            shutting_down: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Submits an operation and awaits its result.
    ///
    /// Cancelling the returned future after the op was accepted discards
    /// the result; the op itself still completes.
    ///
    /// # Errors
    /// [`RiskError::QueueFull`] when the bounded queue is at capacity,
    /// [`RiskError::ShuttingDown`] after shutdown began.
    pub async fn submit(&self, op: RiskOp) -> Result<RiskOutcome, RiskError> {
        let rx = self.try_submit(op)?;
        rx.await.map_err(|_| RiskError::ShuttingDown)?
    }

    /// Submits with a deadline; elapsing maps to [`RiskError::Timeout`].
    pub async fn submit_with_timeout(
        &self,
        op: RiskOp,
        timeout: std::time::Duration,
    ) -> Result<RiskOutcome, RiskError> {
        match tokio::time::timeout(timeout, self.submit(op)).await {
            Ok(result) => result,
            Err(_) => Err(RiskError::Timeout),
        }
    }

    /// Enqueues an operation without waiting for the result.
    ///
    /// This is the fire-and-forget path used by the trade observer: the
    /// returned receiver may simply be dropped. Never blocks.
    pub fn try_submit(
        &self,
        op: RiskOp,
    ) -> Result<oneshot::Receiver<Result<RiskOutcome, RiskError>>, RiskError> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(RiskError::ShuttingDown);
        }
        let sender = {
            let guard = lock(&self.tx);
            guard.as_ref().cloned().ok_or(RiskError::ShuttingDown)?
        };
        let (reply, rx) = oneshot::channel();
        match sender.try_send(Submission { op, reply }) {
            Ok(()) => Ok(rx),
            Err(mpsc::error::TrySendError::Full(_)) => Err(RiskError::QueueFull),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(RiskError::ShuttingDown),
        }
    }

    /// Stops intake, drains every accepted op, and joins the worker.
    ///
    /// Ops submitted after this call observe [`RiskError::ShuttingDown`].
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
        let sender = lock(&self.tx).take();
        drop(sender);
        let worker = lock(&self.worker).take();
        if let Some(worker) = worker {
            if let Err(error) = worker.await {
                warn!("risk coordinator worker ended abnormally: {}", error);
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn run_worker(
    config: CoordinatorConfig,
    mut rx: mpsc::Receiver<Submission>,
    state: RiskState,
) {
    info!(
        "risk coordinator started: batch {} / tick {:?} / queue {}",
        config.batch_size, config.tick_interval, config.queue_capacity
    );
    let mut interval = tokio::time::interval(config.tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut buffer: Vec<Submission> = Vec::with_capacity(config.batch_size);

    loop {
        tokio::select! {
            maybe = rx.recv() => match maybe {
                Some(submission) => {
                    buffer.push(submission);
                    if buffer.len() >= config.batch_size {
                        flush(&mut buffer, &state);
                    }
                }
                // Channel closed: every accepted op is already in `buffer`
                // or was delivered above, so one final flush drains all.
                None => {
                    flush(&mut buffer, &state);
                    break;
                }
            },
            _ = interval.tick() => {
                if !buffer.is_empty() {
                    flush(&mut buffer, &state);
                }
            }
        }
    }
    info!("risk coordinator stopped");
}

/// Processes one batch: group by op type, one lock acquisition per group,
/// replies in submission order within each group.
fn flush(buffer: &mut Vec<Submission>, state: &RiskState) {
    let mut position_updates: Vec<((String, String, i64, f64), Reply)> = Vec::new();
    let mut checks: Vec<((String, String, RiskCheckContext), Reply)> = Vec::new();
    let mut limit_adds: Vec<(RiskLimit, Reply)> = Vec::new();

    for submission in buffer.drain(..) {
        match submission.op {
            RiskOp::UpdatePosition {
                user_id,
                symbol,
                delta,
                price,
            } => position_updates.push(((user_id, symbol, delta, price), submission.reply)),
            RiskOp::CheckLimit {
                user_id,
                symbol,
                ctx,
            } => checks.push(((user_id, symbol, ctx), submission.reply)),
            RiskOp::AddLimit { limit } => limit_adds.push((limit, submission.reply)),
        }
    }

    let now = state.clock.now_millis();

    if !position_updates.is_empty() {
        let fills: Vec<(String, String, i64, f64)> = position_updates
            .iter()
            .map(|(fill, _)| fill.clone())
            .collect();
        let updated = state.positions.apply_fills(&fills, now);
        for ((_, reply), position) in position_updates.into_iter().zip(updated) {
            if let Err(error) = state.position_store.flush(&position) {
                warn!(
                    "position flush failed for {}/{}: {}",
                    position.user_id, position.symbol, error
                );
            }
            let _ = reply.send(Ok(RiskOutcome::PositionUpdated(position)));
        }
    }

    if !checks.is_empty() {
        let halted: Vec<bool> = checks
            .iter()
            .map(|((_, symbol, _), _)| state.breakers.is_halted(symbol))
            .collect();
        let (items, replies): (Vec<(String, String, RiskCheckContext)>, Vec<Reply>) =
            checks.into_iter().unzip();
        let results = state.limits.evaluate_batch(&state.positions, &items, &halted);
        for (reply, result) in replies.into_iter().zip(results) {
            let _ = reply.send(Ok(RiskOutcome::Check(result)));
        }
    }

    if !limit_adds.is_empty() {
        let (limits, replies): (Vec<RiskLimit>, Vec<Reply>) = limit_adds.into_iter().unzip();
        for limit in &limits {
            if let Err(error) = state.limit_store.flush(limit) {
                warn!("limit flush failed for {}: {}", limit.user_id, error);
            }
        }
        state.limits.add_batch(limits);
        for reply in replies {
            let _ = reply.send(Ok(RiskOutcome::LimitAdded));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::circuit_breaker::CircuitBreakerConfig;
    use crate::risk::limits::LimitKind;
    use crate::store::{MemoryLimitStore, MemoryPositionStore};
    use crate::utils::ManualClock;

    fn test_state() -> RiskState {
        let clock = Arc::new(ManualClock::new(1_000));
        RiskState {
            positions: Arc::new(PositionBook::new()),
            limits: Arc::new(LimitRegistry::new()),
            breakers: Arc::new(CircuitBreakerSystem::new(
                CircuitBreakerConfig::default(),
                clock.clone(),
            )),
            position_store: Arc::new(MemoryPositionStore::new()),
            limit_store: Arc::new(MemoryLimitStore::new()),
            clock,
        }
    }

    fn update(user: &str, delta: i64, price: f64) -> RiskOp {
        RiskOp::UpdatePosition {
            user_id: user.to_string(),
            symbol: "BTC/USD".to_string(),
            delta,
            price,
        }
    }

    #[tokio::test]
    async fn test_update_and_check_round_trip() {
        let coordinator = RiskCoordinator::spawn(CoordinatorConfig::default(), test_state());

        let outcome = coordinator.submit(update("alice", 10, 100.0)).await.unwrap();
        let RiskOutcome::PositionUpdated(position) = outcome else {
            panic!("expected position outcome");
        };
        assert_eq!(position.quantity, 10);

        let outcome = coordinator
            .submit(RiskOp::CheckLimit {
                user_id: "alice".to_string(),
                symbol: "BTC/USD".to_string(),
                ctx: RiskCheckContext::default(),
            })
            .await
            .unwrap();
        let RiskOutcome::Check(result) = outcome else {
            panic!("expected check outcome");
        };
        assert!(result.passed);

        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_updates_apply_in_submission_order() {
        let coordinator = RiskCoordinator::spawn(CoordinatorConfig::default(), test_state());

        let first = coordinator.try_submit(update("alice", 10, 50.0)).unwrap();
        let second = coordinator.try_submit(update("alice", -15, 60.0)).unwrap();
        first.await.unwrap().unwrap();
        let outcome = second.await.unwrap().unwrap();

        let RiskOutcome::PositionUpdated(position) = outcome else {
            panic!("expected position outcome");
        };
        assert_eq!(position.quantity, -5);
        assert!((position.realized_pnl - 100.0).abs() < 1e-9);
        assert!((position.average_entry_price - 60.0).abs() < 1e-9);

        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_add_limit_then_check_fails() {
        let coordinator = RiskCoordinator::spawn(CoordinatorConfig::default(), test_state());

        coordinator
            .submit(RiskOp::AddLimit {
                limit: RiskLimit::new("alice", LimitKind::OrderSize, 5.0),
            })
            .await
            .unwrap();

        let outcome = coordinator
            .submit(RiskOp::CheckLimit {
                user_id: "alice".to_string(),
                symbol: "BTC/USD".to_string(),
                ctx: RiskCheckContext {
                    order_size: 10.0,
                    ..RiskCheckContext::default()
                },
            })
            .await
            .unwrap();
        let RiskOutcome::Check(result) = outcome else {
            panic!("expected check outcome");
        };
        assert!(!result.passed);
        assert_eq!(result.failed_kind, Some(LimitKind::OrderSize));

        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_halted_symbol_short_circuits_checks() {
        let state = test_state();
        let breakers = state.breakers.clone();
        let coordinator = RiskCoordinator::spawn(CoordinatorConfig::default(), state);
        breakers.global_halt(crate::risk::circuit_breaker::HaltReason::Manual);

        let outcome = coordinator
            .submit(RiskOp::CheckLimit {
                user_id: "alice".to_string(),
                symbol: "BTC/USD".to_string(),
                ctx: RiskCheckContext::default(),
            })
            .await
            .unwrap();
        let RiskOutcome::Check(result) = outcome else {
            panic!("expected check outcome");
        };
        assert!(!result.passed);
        assert!(result.message.contains("circuit breaker"));

        coordinator.shutdown().await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_queue_full_backpressure() {
        let config = CoordinatorConfig {
            queue_capacity: 1_000,
            ..CoordinatorConfig::default()
        };
        let coordinator = RiskCoordinator::spawn(config, test_state());

        // On a current-thread runtime the worker has not run yet, so the
        // channel fills synchronously.
        let mut replies = Vec::new();
        for i in 0..1_000 {
            replies.push(coordinator.try_submit(update("alice", 1, i as f64)).unwrap());
        }
        let overflow = coordinator.try_submit(update("alice", 1, 0.0));
        assert!(matches!(overflow, Err(RiskError::QueueFull)));

        // Once the worker runs, every accepted op completes successfully.
        for reply in replies {
            assert!(reply.await.unwrap().is_ok());
        }
        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_rejects_late_submissions() {
        let coordinator = RiskCoordinator::spawn(CoordinatorConfig::default(), test_state());
        coordinator.shutdown().await;
        let result = coordinator.try_submit(update("alice", 1, 1.0));
        assert!(matches!(result, Err(RiskError::ShuttingDown)));
    }

    #[tokio::test]
    async fn test_position_store_receives_flushes() {
        let state = test_state();
        let store = state.position_store.clone();
        let coordinator = RiskCoordinator::spawn(CoordinatorConfig::default(), state);
        coordinator.submit(update("alice", 10, 100.0)).await.unwrap();
        coordinator.shutdown().await;
        assert_eq!(store.load_all().unwrap().len(), 1);
    }
}
