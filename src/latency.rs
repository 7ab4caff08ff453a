// Round-trip latency tracking. A small ring of recent samples drives the
// outgoing throttle interval so the send rate self-tunes to the true
// server-plus-network latency instead of a fixed guess.

use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct LatencyTracker {
    samples: VecDeque<Duration>,
    capacity: usize,
    /// Lower bound on the derived interval, so bursts of fast responses
    /// never cause an unbounded send rate.
    floor: Duration,
    /// Interval used before any sample exists.
    initial: Duration,
}

impl LatencyTracker {
    pub fn new(capacity: usize, floor: Duration, initial: Duration) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
            floor,
            initial,
        }
    }

    /// Push one completed round trip, overwriting the oldest sample when
    /// the ring is full.
    pub fn record_round_trip(&mut self, rtt: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(rtt);
    }

    /// Current minimum spacing between outgoing control messages.
    pub fn current_throttle(&self) -> Duration {
        if self.samples.is_empty() {
            return self.initial;
        }
        let total: Duration = self.samples.iter().sum();
        let average = total / self.samples.len() as u32;
        average.max(self.floor)
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}
