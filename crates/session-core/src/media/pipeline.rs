//! The two media directions of a call.
//!
//! The send loop runs on its own thread: capture ring, encoder,
//! packetizer, SRTP, socket. The receive path runs on whatever thread
//! delivers packets: SRTP, depacketizer, decoder, playback ring.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tracing::{debug, error, info, trace};
use voxcall_media_core::{
    AudioDecoder, AudioEncoder, CaptureReader, CodecFactory, Error as MediaError, PlaybackWriter, Sample,
    MAX_FRAME_SAMPLES, MAX_PACKET_BYTES,
};
use voxcall_rtp_core::{MediaTransport, RtpPacket, RtpPacketizer, SrtpContext};

use super::counters::MediaCounters;
use super::crypto::MediaCrypto;
use super::monitor::{LinkHealth, LinkMonitor};
use crate::errors::Result;

/// Why the send loop returned
#[derive(Debug)]
pub enum SendLoopExit {
    /// The call is ending
    Cancelled,
    /// The peer stopped sending
    Stasis,
    /// Encoding, encryption or the socket failed
    Failed(crate::errors::SessionError),
}

/// Capture to network.
///
/// Owns every piece of state it touches except the counters, so the hot
/// loop takes no locks.
pub struct SendPipeline {
    capture: CaptureReader,
    encoder: Box<dyn AudioEncoder>,
    packetizer: RtpPacketizer,
    srtp: Option<SrtpContext>,
    transport: Arc<dyn MediaTransport>,
    remote: SocketAddr,
    counters: Arc<MediaCounters>,
    monitor: LinkMonitor,
    exiting: Arc<AtomicBool>,
    poll_interval: Duration,
    frame: Vec<Sample>,
    encoded: Vec<u8>,
}

impl SendPipeline {
    pub fn new(
        capture: CaptureReader,
        encoder: Box<dyn AudioEncoder>,
        packetizer: RtpPacketizer,
        srtp: Option<SrtpContext>,
        transport: Arc<dyn MediaTransport>,
        remote: SocketAddr,
        monitor: LinkMonitor,
        counters: Arc<MediaCounters>,
        exiting: Arc<AtomicBool>,
        poll_interval: Duration,
    ) -> Self {
        let frame_samples = capture.frame_samples();
        Self {
            capture,
            encoder,
            packetizer,
            srtp,
            transport,
            remote,
            counters,
            monitor,
            exiting,
            poll_interval,
            frame: vec![0; frame_samples],
            encoded: vec![0; MAX_PACKET_BYTES],
        }
    }

    /// Send one packet per captured frame until cancelled, the link goes
    /// quiet, or something fails.
    ///
    /// Never touches call state; the caller decides what an exit means.
    pub fn run(mut self) -> SendLoopExit {
        info!(
            "Send loop started: {} samples/frame, pt {}, ssrc {:08x}, to {}",
            self.frame.len(),
            self.packetizer.payload_type(),
            self.packetizer.ssrc(),
            self.remote
        );

        loop {
            if self.exiting.load(Ordering::Acquire) {
                debug!("Send loop cancelled after {} packets", self.packetizer.packets());
                return SendLoopExit::Cancelled;
            }

            if self.capture.read_frame(&mut self.frame) < self.frame.len() {
                thread::sleep(self.poll_interval);
                continue;
            }

            if let Err(e) = self.send_frame() {
                error!("Send loop failed: {}", e);
                return SendLoopExit::Failed(e);
            }

            // Silence from the peer only counts while we are sending
            if self.monitor.poll(Instant::now()) == LinkHealth::Stasis {
                return SendLoopExit::Stasis;
            }
        }
    }

    fn send_frame(&mut self) -> Result<()> {
        let len = self.encoder.encode(&self.frame, &mut self.encoded)?;
        if len > MAX_PACKET_BYTES {
            return Err(MediaError::FrameTooLarge {
                size: len,
                max: MAX_PACKET_BYTES,
            }
            .into());
        }

        let mut packet = self.packetizer.packetize(&self.encoded[..len])?;
        if let Some(srtp) = self.srtp.as_mut() {
            srtp.protect(&mut packet)?;
        }

        let sent = self.transport.send_to(&packet, self.remote)?;
        self.counters.record_sent(sent);
        trace!("Sent RTP packet #{} ({} bytes)", self.packetizer.packets(), sent);
        Ok(())
    }
}

/// Network to playback
pub struct ReceivePipeline {
    codec: Arc<dyn CodecFactory>,
    decoder: Option<Box<dyn AudioDecoder>>,
    playback: PlaybackWriter,
    counters: Arc<MediaCounters>,
    pcm: Vec<Sample>,
}

impl ReceivePipeline {
    pub fn new(codec: Arc<dyn CodecFactory>, playback: PlaybackWriter, counters: Arc<MediaCounters>) -> Self {
        Self {
            codec,
            decoder: None,
            playback,
            counters,
            pcm: vec![0; MAX_FRAME_SAMPLES],
        }
    }

    /// Handle one datagram. Every arrival counts towards link health, even
    /// one that is then dropped.
    ///
    /// Returns the number of samples queued for playback. Errors mean the
    /// packet was dropped; they are never fatal to the call.
    pub fn on_packet(&mut self, mut packet: BytesMut, crypto: &mut MediaCrypto) -> Result<usize> {
        self.counters.record_received(packet.len());

        let result = self.process(&mut packet, crypto);
        if let Err(e) = &result {
            self.counters.record_dropped();
            debug!("Dropped RTP packet: {}", e);
        }
        result
    }

    pub fn decoder_ready(&self) -> bool {
        self.decoder.is_some()
    }

    fn process(&mut self, packet: &mut BytesMut, crypto: &mut MediaCrypto) -> Result<usize> {
        if crypto.has_receive_context() {
            crypto.decrypt(packet)?;
        }

        let rtp = RtpPacket::parse(packet)?;

        if self.decoder.is_none() {
            self.decoder = Some(self.codec.new_decoder()?);
        }
        let samples = match self.decoder.as_mut() {
            Some(decoder) => decoder.decode(&rtp.payload, &mut self.pcm)?,
            None => return Ok(0),
        };

        // A full ring truncates the write; that is frame loss, not an error
        let written = self.playback.write_frame(&self.pcm[..samples]);
        if written < samples {
            trace!("Playback ring full, dropped {} samples", samples - written);
        }
        Ok(written)
    }
}
