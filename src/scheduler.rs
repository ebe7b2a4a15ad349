use std::thread;
use std::time::{Duration, Instant};

const SLEEP_STEP: Duration = Duration::from_millis(1);

/// Holds presentation back to a fixed frame interval.
///
/// An interval of zero leaves pacing to the display's vertical sync.
pub struct FrameScheduler {
    interval: Duration,
    last_present: Option<Instant>,
}

impl FrameScheduler {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            last_present: None,
        }
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last_present {
            Some(last) => (last + self.interval).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    pub fn wait_for_frame(&mut self) {
        while !self.remaining(Instant::now()).is_zero() {
            thread::sleep(SLEEP_STEP);
        }
        self.last_present = Some(Instant::now());
    }
}
