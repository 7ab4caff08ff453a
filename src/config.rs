// Session configuration, injected by the composition root.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// WebSocket endpoint of the portrait inference server.
    pub endpoint: String,
    /// First reconnect delay; doubled on every further attempt.
    pub reconnect_base_ms: u64,
    /// Upper bound on the reconnect delay.
    pub reconnect_cap_ms: u64,
    /// Automatic reconnects before giving up.
    pub max_reconnect_attempts: u32,
    /// Floor for the send throttle, so fast local round trips never
    /// produce an unbounded send rate.
    pub min_throttle_ms: u64,
    /// Throttle interval used until the first round trip completes.
    pub initial_throttle_ms: u64,
    /// Number of round-trip samples kept for throttle estimation.
    pub latency_window: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:8080/ws".to_string(),
            reconnect_base_ms: 1000,
            reconnect_cap_ms: 30000,
            max_reconnect_attempts: 5,
            min_throttle_ms: 100,
            initial_throttle_ms: 500,
            latency_window: 5,
        }
    }
}

impl SessionConfig {
    pub fn min_throttle(&self) -> Duration {
        Duration::from_millis(self.min_throttle_ms)
    }

    pub fn initial_throttle(&self) -> Duration {
        Duration::from_millis(self.initial_throttle_ms)
    }
}
