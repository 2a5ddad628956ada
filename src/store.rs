//! Persistence capabilities consumed by the risk service.
//!
//! Durable storage lives outside this crate; the core only needs
//! `load_all` at startup and best-effort `flush` hooks after mutations.
//! Flush failures are logged by the caller and never propagate into the
//! trading path.

use crate::risk::{Position, RiskLimit};
use std::sync::Mutex;
use thiserror::Error;

/// Failures raised by a persistence capability.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// A persisted record could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Durable storage for positions.
pub trait PositionStore: Send + Sync {
    /// Loads every persisted position. Called once at startup.
    fn load_all(&self) -> Result<Vec<Position>, StoreError>;

    /// Persists one position after a mutation. Best-effort and eventually
    /// consistent.
    fn flush(&self, position: &Position) -> Result<(), StoreError>;
}

/// Durable storage for risk limits.
pub trait LimitStore: Send + Sync {
    /// Loads every persisted limit. Called once at startup.
    fn load_all(&self) -> Result<Vec<RiskLimit>, StoreError>;

    /// Persists one limit after registration. Best-effort.
    fn flush(&self, limit: &RiskLimit) -> Result<(), StoreError>;
}

/// In-memory [`PositionStore`], for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryPositionStore {
    inner: Mutex<Vec<Position>>,
}

impl MemoryPositionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with positions.
    pub fn with_positions(positions: Vec<Position>) -> Self {
        Self {
            inner: Mutex::new(positions),
        }
    }
}

impl PositionStore for MemoryPositionStore {
    fn load_all(&self) -> Result<Vec<Position>, StoreError> {
        Ok(lock(&self.inner).clone())
    }

    fn flush(&self, position: &Position) -> Result<(), StoreError> {
        let mut inner = lock(&self.inner);
        match inner
            .iter_mut()
            .find(|entry| entry.user_id == position.user_id && entry.symbol == position.symbol)
        {
            Some(entry) => *entry = position.clone(),
            None => inner.push(position.clone()),
        }
        Ok(())
    }
}

/// In-memory [`LimitStore`], for tests and single-process deployments.
#[derive(Debug, Default)]
pub struct MemoryLimitStore {
    inner: Mutex<Vec<RiskLimit>>,
}

impl MemoryLimitStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with limits.
    pub fn with_limits(limits: Vec<RiskLimit>) -> Self {
        Self {
            inner: Mutex::new(limits),
        }
    }
}

impl LimitStore for MemoryLimitStore {
    fn load_all(&self) -> Result<Vec<RiskLimit>, StoreError> {
        Ok(lock(&self.inner).clone())
    }

    fn flush(&self, limit: &RiskLimit) -> Result<(), StoreError> {
        lock(&self.inner).push(limit.clone());
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
