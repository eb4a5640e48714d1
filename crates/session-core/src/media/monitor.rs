use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::counters::MediaCounters;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkHealth {
    Healthy,
    /// Consecutive intervals without a received packet
    Silent(u32),
    /// The peer is considered gone
    Stasis,
}

/// Per-interval rate accounting and dead-peer detection.
///
/// Driven from the send loop. Every `interval` it rolls the byte windows and
/// compares the received packet count with the previous interval; after
/// `threshold` unchanged intervals in a row it reports [`LinkHealth::Stasis`].
/// Any packet at all resets the count.
pub struct LinkMonitor {
    interval: Duration,
    threshold: u32,
    counters: Arc<MediaCounters>,
    last_tick: Instant,
    last_rx_packets: u64,
    stasis_count: u32,
}

impl LinkMonitor {
    pub fn new(interval: Duration, threshold: u32, counters: Arc<MediaCounters>, now: Instant) -> Self {
        let last_rx_packets = counters.rx_packets();
        Self {
            interval,
            threshold,
            counters,
            last_tick: now,
            last_rx_packets,
            stasis_count: 0,
        }
    }

    /// Tick if an interval has passed since the last one
    pub fn poll(&mut self, now: Instant) -> LinkHealth {
        if now.saturating_duration_since(self.last_tick) >= self.interval {
            self.tick(now)
        } else {
            self.health()
        }
    }

    pub fn tick(&mut self, now: Instant) -> LinkHealth {
        let elapsed = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;

        let (tx_rate, rx_rate) = self.counters.roll_windows(elapsed);

        let rx_packets = self.counters.rx_packets();
        if rx_packets == self.last_rx_packets {
            self.stasis_count += 1;
        } else {
            self.stasis_count = 0;
        }
        self.last_rx_packets = rx_packets;

        debug!(tx_rate, rx_rate, silent_intervals = self.stasis_count, "Link rates");

        let health = self.health();
        if health == LinkHealth::Stasis {
            warn!(
                "No packets received for {} consecutive intervals, peer unreachable",
                self.stasis_count
            );
        }
        health
    }

    pub fn stasis_count(&self) -> u32 {
        self.stasis_count
    }

    fn health(&self) -> LinkHealth {
        if self.stasis_count >= self.threshold {
            LinkHealth::Stasis
        } else if self.stasis_count > 0 {
            LinkHealth::Silent(self.stasis_count)
        } else {
            LinkHealth::Healthy
        }
    }
}
