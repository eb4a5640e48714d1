//! Network transport for RTP
//!
//! Media packets move over a datagram transport. The call engine runs on
//! plain OS threads, so the trait is synchronous and receiving never blocks.

pub mod udp;

use std::net::SocketAddr;

use crate::Result;

pub use udp::UdpMediaTransport;

/// Trait for datagram transports carrying RTP
pub trait MediaTransport: Send + Sync {
    /// Local address the transport is bound to
    fn local_addr(&self) -> Result<SocketAddr>;

    /// Send one datagram, returning the number of bytes written
    fn send_to(&self, data: &[u8], dest: SocketAddr) -> Result<usize>;

    /// Receive one datagram if one is queued.
    ///
    /// Returns `Ok(None)` when nothing is waiting.
    fn try_recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>>;
}
