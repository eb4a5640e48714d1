//! Media plane of a call: encryption state, the send loop and receive path,
//! traffic counters and link monitoring

pub mod counters;
pub mod crypto;
pub mod monitor;
pub mod pipeline;

pub use counters::{MediaCounters, MediaStats, PACKET_OVERHEAD_BYTES};
pub use crypto::MediaCrypto;
pub use monitor::{LinkHealth, LinkMonitor};
pub use pipeline::{ReceivePipeline, SendLoopExit, SendPipeline};
