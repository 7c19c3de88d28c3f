//! Monotonic time sources for wizard deadlines and latency stamps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic clock abstraction so deadline logic can run on virtual time.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default time source backed by `Instant::now`.
#[derive(Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Deterministic clock: every `now()` call moves time forward by `step`, and
/// `advance` jumps explicitly.
pub struct StubTimeSource {
    start: Instant,
    offset_us: AtomicU64,
    step_us: u64,
}

impl StubTimeSource {
    /// Clock advancing 10 ms per read.
    pub fn new() -> Self {
        Self::with_step(Duration::from_millis(10))
    }

    /// Clock that only moves on `advance`.
    pub fn frozen() -> Self {
        Self::with_step(Duration::ZERO)
    }

    pub fn with_step(step: Duration) -> Self {
        Self {
            start: Instant::now(),
            offset_us: AtomicU64::new(0),
            step_us: step.as_micros() as u64,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_us
            .fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }
}

impl Default for StubTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for StubTimeSource {
    fn now(&self) -> Instant {
        let us = self.offset_us.fetch_add(self.step_us, Ordering::SeqCst);
        self.start + Duration::from_micros(us)
    }
}
