//! Memory-bounded execution of document work
//!
//! The guard is advisory: it rejects inputs above the configured size and
//! brackets the work with memory readings, but it cannot force the allocator
//! to hand memory back.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use super::probe::{MemoryProbe, MemorySnapshot, ProcessMemoryProbe};
use crate::domain::DomainError;

/// Runs work over large in-memory buffers with a size precheck and a release
/// step on every exit path
#[derive(Debug, Clone)]
pub struct MemoryGuardedExecutor {
    probe: Arc<dyn MemoryProbe>,
    in_flight: Arc<AtomicU64>,
}

impl Default for MemoryGuardedExecutor {
    fn default() -> Self {
        Self::new(Arc::new(ProcessMemoryProbe))
    }
}

impl MemoryGuardedExecutor {
    pub fn new(probe: Arc<dyn MemoryProbe>) -> Self {
        Self {
            probe,
            in_flight: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Bytes currently held by guarded work
    pub fn in_flight_bytes(&self) -> u64 {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub async fn run<F, Fut, T>(
        &self,
        input_size: usize,
        max_allowed: usize,
        work: F,
    ) -> Result<T, DomainError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        self.run_with_release(input_size, max_allowed, work, || {})
            .await
    }

    /// Like [`run`](Self::run), with `release` invoked once the work is over
    ///
    /// `release` runs after success, after failure, and when the returned
    /// future is dropped before completion. It never runs when the size
    /// precheck fails, since nothing was acquired.
    pub async fn run_with_release<F, Fut, T, R>(
        &self,
        input_size: usize,
        max_allowed: usize,
        work: F,
        release: R,
    ) -> Result<T, DomainError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
        R: FnOnce() + Send,
    {
        if input_size > max_allowed {
            warn!(
                input_size,
                max_allowed, "Rejecting input above in-memory processing limit"
            );
            return Err(DomainError::payload_too_large(input_size, max_allowed));
        }

        let mut guard = ReleaseGuard::acquire(self, input_size as u64, release);
        let result = work().await;
        guard.outcome = if result.is_ok() { "success" } else { "error" };

        result
    }
}

/// Undoes the accounting of one guarded run when dropped
struct ReleaseGuard<'a, R: FnOnce()> {
    executor: &'a MemoryGuardedExecutor,
    bytes: u64,
    before: MemorySnapshot,
    release: Option<R>,
    outcome: &'static str,
}

impl<'a, R: FnOnce()> ReleaseGuard<'a, R> {
    fn acquire(executor: &'a MemoryGuardedExecutor, bytes: u64, release: R) -> Self {
        let before = executor.probe.snapshot();
        let in_flight = executor.in_flight.fetch_add(bytes, Ordering::SeqCst) + bytes;
        metrics::gauge!("conversion_in_flight_bytes").set(in_flight as f64);

        debug!(
            bytes,
            resident_bytes = ?before.resident_bytes,
            "Acquired guarded memory"
        );

        Self {
            executor,
            bytes,
            before,
            release: Some(release),
            outcome: "cancelled",
        }
    }
}

impl<R: FnOnce()> Drop for ReleaseGuard<'_, R> {
    fn drop(&mut self) {
        let after = self.executor.probe.snapshot();
        let in_flight = self
            .executor
            .in_flight
            .fetch_sub(self.bytes, Ordering::SeqCst)
            .saturating_sub(self.bytes);
        metrics::gauge!("conversion_in_flight_bytes").set(in_flight as f64);

        if let Some(release) = self.release.take() {
            release();
        }

        debug!(
            bytes = self.bytes,
            outcome = self.outcome,
            resident_delta_bytes = ?after.delta_since(&self.before),
            "Released guarded memory"
        );
    }
}
