//! Wall-clock source for deadlines

use tokio::time::Instant;
use tracing::debug;

/// Source of the current time in Unix milliseconds
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// The system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        crate::domain::now_ms()
    }
}

/// Wall clock anchored at a fixed instant and advanced by the tokio clock
///
/// Under a paused runtime (`start_paused = true`) it moves only when the
/// runtime's time does, so deadlines and timers stay in lockstep.
#[derive(Debug)]
pub struct TokioClock {
    origin_ms: i64,
    origin: Instant,
}

impl TokioClock {
    pub fn starting_at(origin_ms: i64) -> Self {
        debug!(origin_ms, "TokioClock::starting_at: called");
        Self {
            origin_ms,
            origin: Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> i64 {
        self.origin_ms + self.origin.elapsed().as_millis() as i64
    }
}
