//! UDP transport for RTP
//!
//! This module provides a non-blocking UDP implementation of [`MediaTransport`].

use std::io;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::ops::RangeInclusive;

use rand::Rng;
use tracing::{debug, trace};

use super::MediaTransport;
use crate::error::Error;
use crate::Result;

/// Dynamic port range used for RTP when no explicit port is given
pub const DEFAULT_RTP_PORT_RANGE: RangeInclusive<u16> = 16384..=32767;

/// UDP transport for RTP
#[derive(Debug)]
pub struct UdpMediaTransport {
    socket: UdpSocket,
}

impl UdpMediaTransport {
    /// Bind to an explicit address
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .map_err(|e| Error::Transport(format!("Failed to bind RTP socket on {}: {}", addr, e)))?;
        socket.set_nonblocking(true)?;

        debug!("RTP transport bound to {}", socket.local_addr()?);
        Ok(Self { socket })
    }

    /// Bind to the first free even port in `range`, starting from a random offset
    pub fn bind_in_range(ip: IpAddr, range: RangeInclusive<u16>) -> Result<Self> {
        let start = *range.start();
        let end = *range.end();
        if start > end {
            return Err(Error::InvalidParameter(format!("Empty port range {}..={}", start, end)));
        }

        let span = (end - start) as u32 + 1;
        let offset = rand::thread_rng().gen_range(0..span);

        let mut last_err = None;
        for step in (0..span).step_by(2) {
            let port = start + ((offset + step) % span) as u16;
            let port = port & !1;
            if port < start {
                continue;
            }
            match Self::bind(SocketAddr::new(ip, port)) {
                Ok(transport) => return Ok(transport),
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            Error::Transport(format!("No free port in {}..={}", start, end))
        }))
    }

    /// Bind on all interfaces within [`DEFAULT_RTP_PORT_RANGE`]
    pub fn bind_default() -> Result<Self> {
        Self::bind_in_range(IpAddr::from([0, 0, 0, 0]), DEFAULT_RTP_PORT_RANGE)
    }
}

impl MediaTransport for UdpMediaTransport {
    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    fn send_to(&self, data: &[u8], dest: SocketAddr) -> Result<usize> {
        let sent = self
            .socket
            .send_to(data, dest)
            .map_err(|e| Error::Transport(format!("Failed to send {} bytes to {}: {}", data.len(), dest, e)))?;
        trace!("sent {} bytes to {}", sent, dest);
        Ok(sent)
    }

    fn try_recv_from(&self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        match self.socket.recv_from(buf) {
            Ok((len, from)) => Ok(Some((len, from))),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(Error::Transport(format!("Failed to receive: {}", e))),
        }
    }
}
