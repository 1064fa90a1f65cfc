//! Monotonic millisecond time source consumed by the worker.
//!
//! Kept behind a trait so tests can drive the worker with a fake clock
//! instead of racing real wall-clock time, rather than calling
//! `Instant::now()` directly in the middle of dispatch logic.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

/// A monotonic millisecond clock.
pub trait Clock: Send + Sync {
    /// The current time, in milliseconds, on whatever monotonic scale this
    /// clock uses. Only differences between two calls are meaningful.
    fn now_ms(&self) -> i64;
}

/// The real wall clock, anchored to process start so that `now_ms()` fits
/// comfortably in an `i64` for the lifetime of the process.
#[derive(Debug)]
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> SystemClock {
        SystemClock {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        self.start.elapsed().as_millis() as i64
    }
}

/// A fake clock for deterministic tests: `now_ms()` returns whatever was
/// last set with `advance`/`set`.
#[derive(Debug, Default)]
pub struct FakeClock {
    now_ms: AtomicI64,
}

impl FakeClock {
    pub fn new(start_ms: i64) -> FakeClock {
        FakeClock {
            now_ms: AtomicI64::new(start_ms),
        }
    }

    /// Advances the clock by `delta_ms` (may be negative, though the core
    /// never relies on time moving backwards).
    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
