//! Deterministic clock for wait-loop tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tether_core::Clock;

/// Clock that advances by a fixed step on every reading.
///
/// Clones share the same time, so a test can keep one copy to inspect or
/// advance while the channel owns another.
#[derive(Clone, Debug, Default)]
pub struct FakeClock {
    nanos: Arc<AtomicU64>,
    step_nanos: u64,
}

impl FakeClock {
    /// A clock that only moves when [`advance`](FakeClock::advance)d.
    pub fn frozen() -> Self {
        Self::default()
    }

    /// A clock that moves forward by `step` each time it is read.
    pub fn stepping(step: Duration) -> Self {
        Self {
            nanos: Arc::default(),
            step_nanos: u64::try_from(step.as_nanos()).unwrap_or(u64::MAX),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let by = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(by, Ordering::SeqCst);
    }

    /// Current time without advancing.
    pub fn peek(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.fetch_add(self.step_nanos, Ordering::SeqCst))
    }
}
