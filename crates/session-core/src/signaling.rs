//! The boundary between the call engine and the signaling stack.
//!
//! The signaling collaborator (SIP user agent, test script, ...) implements
//! [`SignalingChannel`]. The engine calls [`SignalingChannel::run`] on the
//! call's worker thread and hands it a [`CallContext`]; the collaborator
//! reports what the peer does through the context's `on_*` methods and
//! asks it for our session descriptions.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn};
use voxcall_media_core::{AudioDevice, AudioStream, CodecFactory};
use voxcall_rtp_core::{MediaTransport, RtpPacketizer, DEFAULT_MAX_PACKET_SIZE};

use crate::config::CallConfig;
use crate::errors::{NegotiationError, Result, SessionError};
use crate::media::{LinkMonitor, MediaCrypto, ReceivePipeline, SendLoopExit, SendPipeline};
use crate::sdp::{NegotiatedMedia, SessionNegotiator};
use crate::session::call::CallShared;
use crate::types::{CallDirection, CallId, CallState, CloseReason, IncomingDecision};

/// A signaling stack driving one call at a time
pub trait SignalingChannel: Send + Sync {
    /// Drive a call until it ends.
    ///
    /// Returning `Ok` means the signaling session closed normally; an error
    /// tears the call down with [`CloseReason::SignalingError`]. Must return
    /// promptly once [`CallContext::is_exiting`] is true.
    fn run(&self, call: &mut CallContext) -> Result<()>;

    /// Wake a blocked `run` so it notices the call is exiting. Called from
    /// any thread, possibly more than once.
    fn cancel(&self);
}

struct ActiveMedia {
    receive: ReceivePipeline,
    send_thread: Option<JoinHandle<()>>,
    // Taken once the exit has been handled
    send_exit: Option<oneshot::Receiver<SendLoopExit>>,
}

/// One call as seen by the signaling collaborator.
///
/// Lives on the call's worker thread. The receive path runs here too, from
/// [`on_rtp_packet`](Self::on_rtp_packet) or [`poll_media`](Self::poll_media).
///
/// The send thread never changes call state. When it stops on its own (dead
/// peer, socket failure) the call is torn down the next time the
/// collaborator calls [`poll_media`](Self::poll_media) or
/// [`check_media`](Self::check_media), so `run` must call one of them
/// regularly while the call is up.
pub struct CallContext {
    shared: Arc<CallShared>,
    config: CallConfig,
    direction: CallDirection,
    remote_target: Option<String>,
    negotiator: SessionNegotiator,
    codec: Arc<dyn CodecFactory>,
    transport: Arc<dyn MediaTransport>,
    device: Option<Box<dyn AudioDevice>>,
    media: Option<ActiveMedia>,
    call_accepted: bool,
    recv_buf: Vec<u8>,
}

impl CallContext {
    pub(crate) fn new(
        shared: Arc<CallShared>,
        config: CallConfig,
        direction: CallDirection,
        remote_target: Option<String>,
        negotiator: SessionNegotiator,
        codec: Arc<dyn CodecFactory>,
        transport: Arc<dyn MediaTransport>,
        device: Box<dyn AudioDevice>,
    ) -> Self {
        Self {
            shared,
            config,
            direction,
            remote_target,
            negotiator,
            codec,
            transport,
            device: Some(device),
            media: None,
            call_accepted: false,
            recv_buf: vec![0; DEFAULT_MAX_PACKET_SIZE],
        }
    }

    pub fn call_id(&self) -> CallId {
        self.shared.id
    }

    pub fn direction(&self) -> CallDirection {
        self.direction
    }

    /// Who we are calling; `None` when listening
    pub fn remote_target(&self) -> Option<&str> {
        self.remote_target.as_deref()
    }

    pub fn local_uri(&self) -> &str {
        &self.config.local_uri
    }

    pub fn display_name(&self) -> &str {
        &self.config.display_name
    }

    pub fn registrar(&self) -> &str {
        &self.config.registrar
    }

    /// Username and password for answering an authentication challenge
    pub fn credentials(&self) -> (&str, &str) {
        (&self.config.username, &self.config.password)
    }

    pub fn state(&self) -> CallState {
        self.shared.state()
    }

    /// True once the call is being torn down
    pub fn is_exiting(&self) -> bool {
        self.shared.exiting.load(Ordering::Acquire)
    }

    pub fn negotiated(&self) -> Option<&NegotiatedMedia> {
        self.negotiator.negotiated()
    }

    pub fn crypto(&self) -> &MediaCrypto {
        self.negotiator.crypto()
    }

    pub fn crypto_mut(&mut self) -> &mut MediaCrypto {
        self.negotiator.crypto_mut()
    }

    pub fn media_started(&self) -> bool {
        self.media.is_some()
    }

    /// True while the send thread is running
    pub fn send_loop_running(&self) -> bool {
        self.media
            .as_ref()
            .and_then(|media| media.send_thread.as_ref())
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Pick up the send thread's exit, if it has stopped, and tear the call
    /// down when the exit calls for it. Returns true once the send loop has
    /// ended.
    pub fn check_media(&mut self) -> bool {
        let Some(media) = self.media.as_mut() else {
            return false;
        };
        let Some(send_exit) = media.send_exit.as_mut() else {
            return true;
        };

        match send_exit.try_recv() {
            Ok(exit) => {
                media.send_exit = None;
                self.shared.on_send_loop_exit(exit);
                true
            }
            Err(oneshot::error::TryRecvError::Empty) => false,
            Err(oneshot::error::TryRecvError::Closed) => {
                media.send_exit = None;
                error!("Send thread for {} ended without reporting", self.shared.id);
                self.shared.request_teardown(CloseReason::SendFailure);
                true
            }
        }
    }

    /// Our offer for an outgoing call
    pub fn build_offer(&mut self) -> Result<Vec<u8>> {
        if self.direction != CallDirection::Outbound {
            return Err(SessionError::invalid_state("only outgoing calls send an offer"));
        }
        let offer = self.negotiator.build_offer()?;
        self.shared.advance(CallState::Connecting);
        Ok(offer)
    }

    /// Decide whether to take an incoming call.
    ///
    /// Anything other than a listening session with no call yet is busy.
    pub fn on_incoming_call(&mut self) -> IncomingDecision {
        if self.direction != CallDirection::Inbound || self.call_accepted || self.is_exiting() {
            info!("Rejecting incoming call on {}: busy", self.shared.id);
            return IncomingDecision::Busy;
        }
        self.call_accepted = true;
        self.shared.advance(CallState::Ready);
        IncomingDecision::Accept
    }

    /// The peer's offer arrived. Returns our answer.
    pub fn on_offer_received(&mut self, offer: &[u8]) -> Result<Vec<u8>> {
        if self.direction != CallDirection::Inbound {
            return Err(SessionError::invalid_state("outgoing call received an offer"));
        }
        if !self.call_accepted {
            self.call_accepted = true;
            self.shared.advance(CallState::Ready);
        }

        self.shared.set_receiver(true);
        self.negotiator.decode_remote(offer, true)?;
        let answer = self.negotiator.build_answer()?;
        self.shared.advance(CallState::Media);
        Ok(answer)
    }

    /// The peer is alerting
    pub fn on_progress(&mut self) {
        self.shared.advance(CallState::Progressing);
    }

    /// The peer answered our offer
    pub fn on_answer_received(&mut self, answer: &[u8]) -> Result<()> {
        self.negotiator.decode_remote(answer, false)?;
        self.shared.advance(CallState::Media);
        Ok(())
    }

    /// The signaling session is up: start media (once) and mark the call
    /// connected. A failure to start media tears the call down.
    pub fn on_established(&mut self) -> Result<()> {
        if self.media.is_none() {
            if let Err(e) = self.start_media() {
                error!("Failed to start media for {}: {}", self.shared.id, e);
                self.shared.request_teardown(CloseReason::SendFailure);
                return Err(e);
            }
        }
        self.shared.advance(CallState::Connected);
        Ok(())
    }

    /// The signaling session ended
    pub fn on_closed(&mut self, reason: CloseReason) {
        info!("Call {} closed by signaling: {:?}", self.shared.id, reason);
        self.shared.request_teardown(reason);
    }

    /// Receive path entry point for one datagram
    pub fn on_rtp_packet(&mut self, packet: BytesMut) {
        match self.media.as_mut() {
            Some(media) => {
                let _ = media.receive.on_packet(packet, self.negotiator.crypto_mut());
            }
            None => {
                self.shared.counters.record_received(packet.len());
                self.shared.counters.record_dropped();
                trace!("RTP packet before media start dropped");
            }
        }
    }

    /// Drain whatever the media transport has queued into the receive path,
    /// after checking on the send thread. Returns the number of datagrams
    /// handled.
    pub fn poll_media(&mut self) -> Result<usize> {
        self.check_media();

        let mut handled = 0;
        while let Some((len, from)) = self.transport.try_recv_from(&mut self.recv_buf)? {
            trace!("{} bytes from {}", len, from);
            let packet = BytesMut::from(&self.recv_buf[..len]);
            self.on_rtp_packet(packet);
            handled += 1;
        }
        Ok(handled)
    }

    fn start_media(&mut self) -> Result<()> {
        let negotiated = self
            .negotiator
            .negotiated()
            .cloned()
            .ok_or(NegotiationError::MissingMedia)?;
        let remote: SocketAddr = negotiated.remote_addr;

        let frame_samples = self.codec.descriptor().frame_samples;
        let encoder = self.codec.new_encoder()?;
        let payload_type = if self.shared.is_receiver() {
            self.config.payload_type_acceptor
        } else {
            self.config.payload_type_initiator
        };
        let packetizer = RtpPacketizer::new(payload_type, frame_samples as u32);
        self.shared.counters.set_sequence_base(packetizer.sequence_base());

        let stream = AudioStream::open(frame_samples, self.config.ring_capacity, self.shared.levels.clone())?;
        let device = self
            .device
            .as_mut()
            .ok_or_else(|| SessionError::invalid_state("audio device unavailable"))?;
        device.start(stream.endpoint)?;

        let monitor = LinkMonitor::new(
            Duration::from_millis(self.config.monitor_interval_ms),
            self.config.stasis_threshold,
            self.shared.counters.clone(),
            Instant::now(),
        );
        let pipeline = SendPipeline::new(
            stream.capture,
            encoder,
            packetizer,
            self.negotiator.crypto_mut().take_transmit_context(),
            self.transport.clone(),
            remote,
            monitor,
            self.shared.counters.clone(),
            self.shared.exiting.clone(),
            Duration::from_millis(self.config.capture_poll_ms),
        );

        let (exit_tx, exit_rx) = oneshot::channel();
        let spawned = thread::Builder::new()
            .name("voxcall-rtp-send".to_string())
            .spawn(move || {
                // The worker may already be gone during teardown
                let _ = exit_tx.send(pipeline.run());
            });
        let send_thread = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                if let Err(stop_err) = device.stop() {
                    warn!("Failed to stop audio device: {}", stop_err);
                }
                return Err(e.into());
            }
        };

        self.media = Some(ActiveMedia {
            receive: ReceivePipeline::new(self.codec.clone(), stream.playback, self.shared.counters.clone()),
            send_thread: Some(send_thread),
            send_exit: Some(exit_rx),
        });
        self.shared.media_started();
        info!(
            "Media started for {}: {} to {}",
            self.shared.id,
            self.codec.descriptor().rtpmap(),
            remote
        );
        Ok(())
    }

    /// Stop the send loop and the device. Joins the send thread before
    /// anything it uses is released.
    pub(crate) fn shutdown(&mut self) {
        self.shared.exiting.store(true, Ordering::Release);

        if let Some(mut media) = self.media.take() {
            if let Some(send_thread) = media.send_thread.take() {
                if send_thread.join().is_err() {
                    error!("Send thread for {} panicked", self.shared.id);
                }
            }
            if let Some(mut send_exit) = media.send_exit.take() {
                if let Ok(exit) = send_exit.try_recv() {
                    debug!("Send loop of {} exited during teardown: {:?}", self.shared.id, exit);
                }
            }
            debug!("Media stopped for {}", self.shared.id);
        }

        if let Some(device) = self.device.as_mut() {
            if device.is_active() {
                if let Err(e) = device.stop() {
                    warn!("Failed to stop audio device {}: {}", device.name(), e);
                }
            }
        }
    }

}

impl Drop for CallContext {
    // Also runs when the worker unwinds: the send thread is stopped and the
    // device goes back to the session for the next call.
    fn drop(&mut self) {
        self.shutdown();
        if let Some(device) = self.device.take() {
            self.shared.return_device(device);
        }
    }
}
