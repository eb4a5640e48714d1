#![allow(dead_code)]

use std::collections::VecDeque;
use std::f32::consts::TAU;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use parking_lot::Mutex;
use voxcall_media_core::{AudioEncoder, CodecFactory, G711CodecFactory, G711Variant, Sample, ToneDevice};
use voxcall_rtp_core::{MediaTransport, RtpPacket, RtpPacketizer, SrtpCryptoSuite, SRTP_AES128_CM_SHA1_80};
use voxcall_session_core::prelude::*;
use voxcall_session_core::{MediaCrypto, SessionNegotiator};

pub const LOCAL_ADDR: &str = "127.0.0.1:40000";
pub const PEER_ADDR: &str = "127.0.0.1:30000";
pub const FRAME: usize = 160;

pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// In-memory datagram transport: records what is sent, hands out what the
/// test queues.
#[derive(Default)]
pub struct LoopTransport {
    sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
    inbound: Mutex<VecDeque<Vec<u8>>>,
}

impl LoopTransport {
    pub fn sent(&self) -> Vec<(Vec<u8>, SocketAddr)> {
        self.sent.lock().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn push_inbound(&self, datagram: Vec<u8>) {
        self.inbound.lock().push_back(datagram);
    }
}

impl MediaTransport for LoopTransport {
    fn local_addr(&self) -> voxcall_rtp_core::Result<SocketAddr> {
        Ok(LOCAL_ADDR.parse().unwrap())
    }

    fn send_to(&self, data: &[u8], dest: SocketAddr) -> voxcall_rtp_core::Result<usize> {
        self.sent.lock().push((data.to_vec(), dest));
        Ok(data.len())
    }

    fn try_recv_from(&self, buf: &mut [u8]) -> voxcall_rtp_core::Result<Option<(usize, SocketAddr)>> {
        match self.inbound.lock().pop_front() {
            Some(datagram) => {
                buf[..datagram.len()].copy_from_slice(&datagram);
                Ok(Some((datagram.len(), PEER_ADDR.parse().unwrap())))
            }
            None => Ok(None),
        }
    }
}

#[derive(Clone, Copy)]
pub struct PeerSetup {
    pub suite: Option<SrtpCryptoSuite>,
    pub variant: G711Variant,
}

impl Default for PeerSetup {
    fn default() -> Self {
        Self {
            suite: Some(SRTP_AES128_CM_SHA1_80),
            variant: G711Variant::Pcmu,
        }
    }
}

/// The far end of a call, negotiating and sending media the way a remote
/// endpoint would
pub struct Peer {
    pub negotiator: SessionNegotiator,
    packetizer: RtpPacketizer,
    encoder: Box<dyn AudioEncoder>,
    samples: usize,
}

impl Peer {
    pub fn new(setup: &PeerSetup) -> Self {
        let codec = G711CodecFactory::new(setup.variant, 20);
        let mut crypto = MediaCrypto::new(setup.suite, 64);
        crypto.init_transmit().unwrap();
        Self {
            negotiator: SessionNegotiator::new(
                PEER_ADDR.parse().unwrap(),
                codec.descriptor().with_payload_type(116),
                crypto,
            ),
            packetizer: RtpPacketizer::new(102, FRAME as u32),
            encoder: codec.new_encoder().unwrap(),
            samples: 0,
        }
    }

    pub fn offer(&mut self) -> Vec<u8> {
        self.negotiator.build_offer().unwrap()
    }

    pub fn answer(&mut self, offer: &[u8]) -> Result<Vec<u8>> {
        self.negotiator.decode_remote(offer, true)?;
        Ok(self.negotiator.build_answer()?)
    }

    pub fn accept_answer(&mut self, answer: &[u8]) -> Result<()> {
        self.negotiator.decode_remote(answer, false)?;
        Ok(())
    }

    /// Next 20 ms of a 440 Hz tone, encrypted if we have a key
    pub fn next_packet(&mut self) -> BytesMut {
        let pcm: Vec<Sample> = (0..FRAME)
            .map(|i| {
                let t = (self.samples + i) as f32 / 8000.0;
                ((t * 440.0 * TAU).sin() * 8000.0) as Sample
            })
            .collect();
        self.samples += FRAME;

        let mut encoded = [0u8; 1500];
        let len = self.encoder.encode(&pcm, &mut encoded).unwrap();
        let mut wire = self.packetizer.packetize(&encoded[..len]).unwrap();
        if self.negotiator.crypto().has_transmit_context() {
            self.negotiator.crypto_mut().encrypt(&mut wire).unwrap();
        }
        wire
    }

    /// Decrypt and parse a packet we sent
    pub fn receive(&mut self, datagram: &[u8]) -> RtpPacket {
        let mut wire = BytesMut::from(datagram);
        self.negotiator.crypto_mut().decrypt(&mut wire).unwrap();
        RtpPacket::parse(&wire).unwrap()
    }
}

#[derive(Default)]
pub struct Observed {
    pub decisions: Vec<IncomingDecision>,
    pub established: bool,
    pub receive_crypto: bool,
    pub runs: usize,
    /// Call state once a stall ended, before media was polled again
    pub state_after_stall: Option<CallState>,
    pub send_loop_ran_out: bool,
}

/// Signaling that plays one scripted peer per call
pub struct ScriptedSignaling {
    setup: PeerSetup,
    feed_media: bool,
    hang_up_after: Option<Duration>,
    stall: Option<Duration>,
    panic_once: AtomicBool,
    linger: AtomicBool,
    pub peer: Mutex<Option<Peer>>,
    pub observed: Mutex<Observed>,
    pub cancels: AtomicUsize,
}

impl ScriptedSignaling {
    pub fn new(setup: PeerSetup) -> Self {
        Self {
            setup,
            feed_media: false,
            hang_up_after: None,
            stall: None,
            panic_once: AtomicBool::new(false),
            linger: AtomicBool::new(false),
            peer: Mutex::new(None),
            observed: Mutex::new(Observed::default()),
            cancels: AtomicUsize::new(0),
        }
    }

    /// Peer streams a tone to us for the whole call
    pub fn feeding_media(mut self) -> Self {
        self.feed_media = true;
        self
    }

    /// Peer hangs up this long after the call is established
    pub fn hanging_up_after(mut self, after: Duration) -> Self {
        self.hang_up_after = Some(after);
        self
    }

    /// Stop polling media for this long once the call is established
    pub fn stalling(mut self, stall: Duration) -> Self {
        self.stall = Some(stall);
        self
    }

    /// The first call's `run` panics right after it starts
    pub fn panicking_once(self) -> Self {
        self.panic_once.store(true, Ordering::Release);
        self
    }

    /// Keep `run` from returning after teardown starts until released
    pub fn lingering(self) -> Self {
        self.linger.store(true, Ordering::Release);
        self
    }

    pub fn release(&self) {
        self.linger.store(false, Ordering::Release);
    }

    pub fn with_peer<T>(&self, f: impl FnOnce(&mut Peer) -> T) -> T {
        let mut peer = self.peer.lock();
        f(peer.as_mut().expect("call not established"))
    }

    pub fn established(&self) -> bool {
        self.observed.lock().established
    }
}

impl SignalingChannel for ScriptedSignaling {
    fn run(&self, call: &mut CallContext) -> Result<()> {
        self.observed.lock().runs += 1;
        if self.panic_once.swap(false, Ordering::AcqRel) {
            panic!("scripted signaling failure");
        }
        let mut peer = Peer::new(&self.setup);

        match call.direction() {
            CallDirection::Outbound => {
                let offer = call.build_offer()?;
                let answer = peer.answer(&offer)?;
                call.on_progress();
                call.on_answer_received(&answer)?;
            }
            CallDirection::Inbound => {
                let first = call.on_incoming_call();
                let second = call.on_incoming_call();
                self.observed.lock().decisions = vec![first, second];

                let offer = peer.offer();
                let answer = call.on_offer_received(&offer)?;
                peer.accept_answer(&answer)?;
            }
        }

        call.on_established()?;
        *self.peer.lock() = Some(peer);
        {
            let mut observed = self.observed.lock();
            observed.receive_crypto = call.crypto().has_receive_context();
            observed.established = true;
        }

        if let Some(stall) = self.stall {
            thread::sleep(stall);
            let mut observed = self.observed.lock();
            observed.state_after_stall = Some(call.state());
            observed.send_loop_ran_out = !call.send_loop_running();
        }

        let established_at = Instant::now();
        while !call.is_exiting() {
            if self.feed_media {
                let packet = self.peer.lock().as_mut().map(Peer::next_packet);
                if let Some(packet) = packet {
                    call.on_rtp_packet(packet);
                }
            }
            call.poll_media()?;

            if self.hang_up_after.is_some_and(|after| established_at.elapsed() >= after) {
                call.on_closed(CloseReason::RemoteHangup);
            }
            thread::sleep(Duration::from_millis(10));
        }

        while self.linger.load(Ordering::Acquire) {
            thread::sleep(Duration::from_millis(1));
        }
        Ok(())
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::Relaxed);
    }
}

pub fn test_config() -> CallConfig {
    let mut config = CallConfig::new("sip:alice@example.com").with_credentials("alice", "secret");
    config.sample_rate = 8000;
    config
}

pub struct Fixture {
    pub session: Arc<CallSession>,
    pub transport: Arc<LoopTransport>,
    pub signaling: Arc<ScriptedSignaling>,
}

pub fn fixture(config: CallConfig, signaling: ScriptedSignaling) -> Fixture {
    let transport = Arc::new(LoopTransport::default());
    let signaling = Arc::new(signaling);
    let session = CallSession::setup(
        config,
        signaling.clone(),
        transport.clone(),
        Arc::new(G711CodecFactory::pcmu()),
        Box::new(ToneDevice::new(8000, FRAME)),
    )
    .unwrap();
    Fixture {
        session: Arc::new(session),
        transport,
        signaling,
    }
}
