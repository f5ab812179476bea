use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Per-participant rate limit on movement updates.
///
/// An accepted move records its own timestamp as the new baseline; a dropped
/// move leaves the baseline untouched, so flooding can never slide the
/// window. The first move after join is always accepted.
pub struct MoveThrottle {
    min_interval: Duration,
    last_accepted: HashMap<u32, Instant>,
}

impl MoveThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_accepted: HashMap::new(),
        }
    }

    /// Decide whether a move arriving at `now` goes through, recording it as
    /// the new baseline if so.
    pub fn should_accept(&mut self, id: u32, now: Instant) -> bool {
        match self.last_accepted.get(&id) {
            Some(last) if now.duration_since(*last) < self.min_interval => false,
            _ => {
                self.last_accepted.insert(id, now);
                true
            }
        }
    }

    /// Drop a participant's baseline when they leave. Ids are never reused;
    /// this only keeps the map bounded.
    pub fn forget(&mut self, id: u32) {
        self.last_accepted.remove(&id);
    }
}
