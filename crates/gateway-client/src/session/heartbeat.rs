//! Heartbeat bookkeeping

use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

/// Tracks the heartbeat interval and whether the last beat was acknowledged
#[derive(Debug, Clone)]
pub struct HeartbeatTracker {
    interval: Option<Duration>,
    acked: bool,
    last_sent: Option<Instant>,
    latency: Option<Duration>,
}

impl Default for HeartbeatTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HeartbeatTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            interval: None,
            acked: true,
            last_sent: None,
            latency: None,
        }
    }

    /// Start beating at `interval`; returns the jittered delay before the first beat
    pub fn start(&mut self, interval: Duration) -> Duration {
        // tokio intervals reject a zero period
        let interval = interval.max(Duration::from_millis(1));
        self.interval = Some(interval);
        self.acked = true;
        self.last_sent = None;
        interval.mul_f64(rand::thread_rng().gen::<f64>())
    }

    pub fn stop(&mut self) {
        self.interval = None;
        self.acked = true;
        self.last_sent = None;
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    #[must_use]
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Whether the previous beat was acknowledged
    #[must_use]
    pub fn is_acked(&self) -> bool {
        self.acked
    }

    /// Record an outgoing beat that expects an ack
    pub fn record_sent(&mut self) {
        self.acked = false;
        self.last_sent = Some(Instant::now());
    }

    /// Record an ack and measure round-trip latency
    pub fn record_ack(&mut self) {
        self.acked = true;
        if let Some(sent) = self.last_sent.take() {
            self.latency = Some(sent.elapsed());
        }
    }

    /// Round-trip time of the last acknowledged beat
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }
}
