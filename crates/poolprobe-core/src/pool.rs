//! Object pool for per-request scratch state
//!
//! Unbounded free list with create-on-miss semantics. Objects are never
//! evicted; whatever was released stays resident until the process exits.
//! The pool does not reset released objects, callers overwrite the state
//! they rely on.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of pool counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Objects built by the factory because the free list was empty
    pub created: u64,
    /// Acquisitions served from the free list
    pub reused: u64,
}

impl PoolStats {
    /// Fraction of acquisitions served without constructing a new object
    pub fn hit_rate(&self) -> f64 {
        let total = self.created + self.reused;
        if total == 0 {
            0.0
        } else {
            self.reused as f64 / total as f64
        }
    }
}

/// Thread-safe object pool
pub struct Pool<T> {
    idle: Mutex<Vec<T>>,
    factory: fn() -> T,
    created: AtomicU64,
    reused: AtomicU64,
}

impl<T> Pool<T> {
    /// Create an empty pool that builds objects with `factory` on a miss
    pub fn new(factory: fn() -> T) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            factory,
            created: AtomicU64::new(0),
            reused: AtomicU64::new(0),
        }
    }

    /// Take an object out of the pool, constructing one if none is idle
    pub fn acquire(&self) -> T {
        // Lock is released before the factory runs
        let reused = self.idle.lock().pop();
        match reused {
            Some(obj) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                obj
            }
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                (self.factory)()
            }
        }
    }

    /// Hand an object back for a future `acquire`
    pub fn release(&self, obj: T) {
        self.idle.lock().push(obj);
    }

    /// Number of objects currently idle in the pool
    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    /// Current counters
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
        }
    }
}

impl<T: Default> Default for Pool<T> {
    fn default() -> Self {
        Self::new(T::default)
    }
}

impl<T> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("idle", &self.idle())
            .field("stats", &self.stats())
            .finish()
    }
}
