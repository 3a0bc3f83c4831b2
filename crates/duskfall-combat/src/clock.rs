//! Game clock shared by timers and stat effects.
//!
//! All combat timing is expressed in clock-seconds (`f64`). In production
//! the clock wraps a monotonic [`Instant`]; tests use a manually advanced
//! clock so expiry can be exercised without sleeping.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

/// Monotonic clock handle. Cheap to clone; clones share the same time base.
#[derive(Debug, Clone)]
pub struct GameClock {
    inner: Arc<ClockInner>,
}

#[derive(Debug)]
enum ClockInner {
    /// Wall-clock backed, measured from clock creation.
    System(Instant),
    /// Manually advanced, for tests and simulations.
    Manual(Mutex<f64>),
}

impl GameClock {
    /// Creates a clock backed by the system's monotonic timer.
    #[must_use]
    pub fn system() -> Self {
        Self {
            inner: Arc::new(ClockInner::System(Instant::now())),
        }
    }

    /// Creates a manually advanced clock starting at 0.0 seconds.
    #[must_use]
    pub fn manual() -> Self {
        Self {
            inner: Arc::new(ClockInner::Manual(Mutex::new(0.0))),
        }
    }

    /// Returns seconds elapsed since the clock was created.
    #[must_use]
    pub fn now(&self) -> f64 {
        match &*self.inner {
            ClockInner::System(start) => start.elapsed().as_secs_f64(),
            ClockInner::Manual(time) => *time.lock(),
        }
    }

    /// Advances a manual clock by the given number of seconds.
    ///
    /// Has no effect on a system clock (logged at warn level): wall time
    /// cannot be steered.
    pub fn advance(&self, seconds: f64) {
        match &*self.inner {
            ClockInner::System(_) => {
                tracing::warn!("attempted to advance a system-backed game clock");
            }
            ClockInner::Manual(time) => {
                *time.lock() += seconds.max(0.0);
            }
        }
    }
}

impl Default for GameClock {
    fn default() -> Self {
        Self::system()
    }
}
