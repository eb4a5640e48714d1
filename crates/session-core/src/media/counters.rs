use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// UDP, IP and Ethernet header bytes counted per packet in the rates
pub const PACKET_OVERHEAD_BYTES: u64 = 54;

/// Traffic counters shared by the send loop and the receive path.
///
/// Each counter has a single writer: the send loop owns the `tx` side and
/// the window roll-over, the receive path owns the `rx` side.
#[derive(Debug, Default)]
pub struct MediaCounters {
    tx_window: AtomicU64,
    rx_window: AtomicU64,
    tx_rate: AtomicU64,
    rx_rate: AtomicU64,
    tx_packets: AtomicU64,
    rx_packets: AtomicU64,
    tx_bytes: AtomicU64,
    rx_bytes: AtomicU64,
    dropped: AtomicU64,
    sequence_base: AtomicU32,
}

/// Point-in-time copy of [`MediaCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MediaStats {
    pub tx_packets: u64,
    pub rx_packets: u64,
    pub tx_bytes: u64,
    pub rx_bytes: u64,
    /// Bytes per second sent over the last monitor interval, overhead included
    pub tx_rate: u64,
    /// Bytes per second received over the last monitor interval, overhead included
    pub rx_rate: u64,
    /// Received packets that failed to decrypt, parse or decode
    pub dropped_packets: u64,
    /// First RTP sequence number of the outgoing stream
    pub sequence_base: u16,
}

impl MediaCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&self, bytes: usize) {
        self.tx_packets.fetch_add(1, Ordering::Relaxed);
        self.tx_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        self.tx_window
            .fetch_add(bytes as u64 + PACKET_OVERHEAD_BYTES, Ordering::Relaxed);
    }

    pub fn record_received(&self, bytes: usize) {
        self.rx_packets.fetch_add(1, Ordering::Relaxed);
        self.rx_bytes.fetch_add(bytes as u64, Ordering::Relaxed);
        self.rx_window
            .fetch_add(bytes as u64 + PACKET_OVERHEAD_BYTES, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_sequence_base(&self, base: u16) {
        self.sequence_base.store(base as u32, Ordering::Relaxed);
    }

    pub fn rx_packets(&self) -> u64 {
        self.rx_packets.load(Ordering::Relaxed)
    }

    /// Turn the byte windows into rates for an interval of `elapsed` and
    /// start new windows. Returns `(tx_rate, rx_rate)`.
    pub fn roll_windows(&self, elapsed: Duration) -> (u64, u64) {
        let millis = elapsed.as_millis().max(1) as u64;
        let tx = self.tx_window.swap(0, Ordering::Relaxed) * 1000 / millis;
        let rx = self.rx_window.swap(0, Ordering::Relaxed) * 1000 / millis;
        self.tx_rate.store(tx, Ordering::Relaxed);
        self.rx_rate.store(rx, Ordering::Relaxed);
        (tx, rx)
    }

    /// Zero everything for a new call
    pub fn reset(&self) {
        for counter in [
            &self.tx_window,
            &self.rx_window,
            &self.tx_rate,
            &self.rx_rate,
            &self.tx_packets,
            &self.rx_packets,
            &self.tx_bytes,
            &self.rx_bytes,
            &self.dropped,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.sequence_base.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MediaStats {
        MediaStats {
            tx_packets: self.tx_packets.load(Ordering::Relaxed),
            rx_packets: self.rx_packets.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            tx_rate: self.tx_rate.load(Ordering::Relaxed),
            rx_rate: self.rx_rate.load(Ordering::Relaxed),
            dropped_packets: self.dropped.load(Ordering::Relaxed),
            sequence_base: self.sequence_base.load(Ordering::Relaxed) as u16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rates_include_overhead() {
        let counters = MediaCounters::new();
        for _ in 0..50 {
            counters.record_sent(100);
        }
        counters.record_received(46);

        let (tx, rx) = counters.roll_windows(Duration::from_secs(1));
        assert_eq!(tx, 50 * 154);
        assert_eq!(rx, 100);

        // Windows restart, totals do not
        assert_eq!(counters.roll_windows(Duration::from_millis(500)), (0, 0));
        let stats = counters.snapshot();
        assert_eq!(stats.tx_packets, 50);
        assert_eq!(stats.tx_bytes, 5000);
        assert_eq!(stats.tx_rate, 0);
    }

    #[test]
    fn test_rate_scales_with_interval() {
        let counters = MediaCounters::new();
        counters.record_sent(46);
        assert_eq!(counters.roll_windows(Duration::from_millis(100)).0, 1000);
    }

    #[test]
    fn test_reset() {
        let counters = MediaCounters::new();
        counters.record_received(10);
        counters.record_dropped();
        counters.set_sequence_base(777);
        assert_eq!(counters.snapshot().sequence_base, 777);

        counters.reset();
        assert_eq!(counters.snapshot(), MediaStats::default());
    }

    #[test]
    fn test_stats_serialize_for_reporting() {
        let counters = MediaCounters::new();
        counters.record_sent(100);
        let json = serde_json::to_value(counters.snapshot()).unwrap();
        assert_eq!(json["tx_packets"], 1);
        assert_eq!(json["tx_bytes"], 100);
        assert_eq!(json["dropped_packets"], 0);
    }
}
