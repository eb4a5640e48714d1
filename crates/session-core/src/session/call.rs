use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use voxcall_media_core::{AudioDevice, CodecFactory, LevelMeter};
use voxcall_rtp_core::MediaTransport;

use crate::config::{CallConfig, MAX_IDENTITY_LEN};
use crate::errors::{Result, SessionError};
use crate::media::{MediaCounters, MediaCrypto, MediaStats, SendLoopExit};
use crate::sdp::SessionNegotiator;
use crate::signaling::{CallContext, SignalingChannel};
use crate::types::{CallDirection, CallEvent, CallId, CallState, CloseReason};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// State visible to every thread of a call: the control thread, the
/// worker running signaling and the receive path, and the send thread.
pub(crate) struct CallShared {
    pub(crate) id: CallId,
    state: AtomicU8,
    pub(crate) exiting: Arc<AtomicBool>,
    is_receiver: AtomicBool,
    pub(crate) counters: Arc<MediaCounters>,
    pub(crate) levels: Arc<LevelMeter>,
    events: broadcast::Sender<CallEvent>,
    close_reason: Mutex<Option<CloseReason>>,
    signaling: Arc<dyn SignalingChannel>,
    // Held here between calls, by the worker's context during one
    device: Mutex<Option<Box<dyn AudioDevice>>>,
}

impl CallShared {
    fn new(signaling: Arc<dyn SignalingChannel>, device: Option<Box<dyn AudioDevice>>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            id: CallId::new(),
            state: AtomicU8::new(CallState::None as u8),
            exiting: Arc::new(AtomicBool::new(false)),
            is_receiver: AtomicBool::new(false),
            counters: Arc::new(MediaCounters::new()),
            levels: Arc::new(LevelMeter::new()),
            events,
            close_reason: Mutex::new(None),
            signaling,
            device: Mutex::new(device),
        }
    }

    fn take_device(&self) -> Option<Box<dyn AudioDevice>> {
        self.device.lock().take()
    }

    pub(crate) fn return_device(&self, device: Box<dyn AudioDevice>) {
        *self.device.lock() = Some(device);
    }

    pub(crate) fn state(&self) -> CallState {
        CallState::from_u8(self.state.load(Ordering::Acquire)).unwrap_or(CallState::None)
    }

    fn emit(&self, event: CallEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Move to `to` if it is later than the current state. Returns whether
    /// the state changed.
    pub(crate) fn advance(&self, to: CallState) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if to as u8 <= current {
                return false;
            }
            match self
                .state
                .compare_exchange_weak(current, to as u8, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    let from = CallState::from_u8(current).unwrap_or(CallState::None);
                    info!("Call {} state {} -> {}", self.id, from, to);
                    self.emit(CallEvent::StateChanged { from, to });
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Reset per-call state and enter `Starting`. Caller has checked that no
    /// call is running.
    fn begin(&self) {
        self.counters.reset();
        self.levels.reset();
        self.exiting.store(false, Ordering::Release);
        self.is_receiver.store(false, Ordering::Release);
        *self.close_reason.lock() = None;

        let from = CallState::from_u8(self.state.swap(CallState::Starting as u8, Ordering::AcqRel))
            .unwrap_or(CallState::None);
        info!("Call {} state {} -> {}", self.id, from, CallState::Starting);
        self.emit(CallEvent::StateChanged {
            from,
            to: CallState::Starting,
        });
    }

    pub(crate) fn set_receiver(&self, is_receiver: bool) {
        self.is_receiver.store(is_receiver, Ordering::Release);
    }

    pub(crate) fn is_receiver(&self) -> bool {
        self.is_receiver.load(Ordering::Acquire)
    }

    pub(crate) fn media_started(&self) {
        self.emit(CallEvent::MediaStarted);
    }

    /// Begin teardown. The first reason recorded wins. Safe to call from any
    /// thread, any number of times.
    pub(crate) fn request_teardown(&self, reason: CloseReason) {
        {
            let mut close_reason = self.close_reason.lock();
            if close_reason.is_none() {
                *close_reason = Some(reason);
            }
        }
        self.exiting.store(true, Ordering::Release);
        if self.advance(CallState::Stopping) {
            debug!("Teardown of {} requested: {:?}", self.id, reason);
        }
        self.signaling.cancel();
    }

    /// Apply the send thread's exit. Called on the worker thread.
    pub(crate) fn on_send_loop_exit(&self, exit: SendLoopExit) {
        match exit {
            SendLoopExit::Cancelled => {}
            SendLoopExit::Stasis => {
                warn!("Call {} lost its peer", self.id);
                self.emit(CallEvent::LinkStasis);
                self.request_teardown(CloseReason::LinkStasis);
            }
            SendLoopExit::Failed(e) => {
                error!("Send loop of {} failed: {}", self.id, e);
                self.request_teardown(CloseReason::SendFailure);
            }
        }
    }

    fn close_reason(&self) -> Option<CloseReason> {
        *self.close_reason.lock()
    }

    /// Teardown complete
    fn finish(&self) {
        let reason = self.close_reason().unwrap_or(CloseReason::RemoteHangup);
        self.advance(CallState::Stopped);
        info!("Call {} closed: {:?}", self.id, reason);
        self.emit(CallEvent::Closed { reason });
    }
}

/// A single voice call endpoint.
///
/// Created once with its collaborators and reused: [`start`](Self::start)
/// or [`listen`](Self::listen) runs one call on a worker thread, and after
/// it ends the session may be started again.
pub struct CallSession {
    shared: Arc<CallShared>,
    config: CallConfig,
    transport: Arc<dyn MediaTransport>,
    codec: Arc<dyn CodecFactory>,
    media_address: Option<SocketAddr>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CallSession {
    /// Validate the configuration and bind the collaborators. No threads
    /// are started.
    pub fn setup(
        config: CallConfig,
        signaling: Arc<dyn SignalingChannel>,
        transport: Arc<dyn MediaTransport>,
        codec: Arc<dyn CodecFactory>,
        device: Box<dyn AudioDevice>,
    ) -> Result<Self> {
        config.validate()?;
        let descriptor = codec.descriptor();
        if descriptor.clock_rate != config.sample_rate {
            warn!(
                "Codec {} runs at {} Hz, configured rate is {} Hz",
                descriptor.name, descriptor.clock_rate, config.sample_rate
            );
        }

        let shared = Arc::new(CallShared::new(signaling, Some(device)));
        info!("Call session {} set up for {}", shared.id, config.local_uri);
        Ok(Self {
            shared,
            config,
            transport,
            codec,
            media_address: None,
            worker: Mutex::new(None),
        })
    }

    /// Advertise `addr` in session descriptions instead of the transport's
    /// bound address (for NAT or wildcard binds)
    pub fn with_media_address(mut self, addr: SocketAddr) -> Self {
        self.media_address = Some(addr);
        self
    }

    /// Place a call to `target`.
    ///
    /// A no-op while a call is in progress; fails with
    /// [`SessionError::TeardownInProgress`] while the previous one is
    /// still stopping.
    pub fn start(&self, target: &str) -> Result<()> {
        if target.is_empty() || target.len() > MAX_IDENTITY_LEN {
            return Err(SessionError::InvalidArgument(format!(
                "target must be 1 to {} bytes",
                MAX_IDENTITY_LEN
            )));
        }
        self.launch(CallDirection::Outbound, Some(target.to_string()))
    }

    /// Wait for an incoming call. Same state rules as [`start`](Self::start).
    pub fn listen(&self) -> Result<()> {
        self.launch(CallDirection::Inbound, None)
    }

    fn launch(&self, direction: CallDirection, target: Option<String>) -> Result<()> {
        let mut worker = self.worker.lock();

        match self.state() {
            CallState::Stopping => return Err(SessionError::TeardownInProgress),
            state if state.is_in_progress() => {
                debug!("Start ignored, call {} already {}", self.shared.id, state);
                return Ok(());
            }
            _ => {}
        }

        if let Some(finished) = worker.take() {
            self.join_worker(finished);
        }

        let local_addr = match self.media_address {
            Some(addr) => addr,
            None => self.transport.local_addr()?,
        };
        let mut crypto = MediaCrypto::new(self.config.srtp_suite()?, self.config.replay_window);
        crypto.init_transmit()?;
        let codec = self
            .codec
            .descriptor()
            .with_payload_type(self.config.payload_type_initiator);
        let negotiator = SessionNegotiator::new(local_addr, codec, crypto);

        let device = self
            .shared
            .take_device()
            .ok_or_else(|| SessionError::invalid_state("audio device unavailable"))?;

        self.shared.begin();
        let ctx = CallContext::new(
            self.shared.clone(),
            self.config.clone(),
            direction,
            target,
            negotiator,
            self.codec.clone(),
            self.transport.clone(),
            device,
        );

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("voxcall-call".to_string())
            .spawn(move || run_call(shared, ctx));
        match spawned {
            Ok(handle) => {
                *worker = Some(handle);
                Ok(())
            }
            Err(e) => {
                // The unspawned closure dropped its context, which handed the
                // device back
                error!("Failed to spawn call worker: {}", e);
                self.shared.request_teardown(CloseReason::SignalingError);
                self.shared.finish();
                Err(e.into())
            }
        }
    }

    fn join_worker(&self, worker: JoinHandle<()>) {
        if worker.join().is_err() {
            error!("Call worker for {} panicked", self.shared.id);
            self.shared.request_teardown(CloseReason::SignalingError);
            self.shared.finish();
        }
    }

    /// Hang up and wait for teardown to finish. Idempotent.
    pub fn stop(&self) -> Result<()> {
        let mut worker = self.worker.lock();
        if let Some(running) = worker.take() {
            self.shared.request_teardown(CloseReason::LocalHangup);
            self.join_worker(running);
        }
        Ok(())
    }

    /// Block the calling thread until the call is no longer in progress.
    /// Returns the state it ended in.
    pub fn block_on_call(&self) -> CallState {
        let interval = Duration::from_millis(self.config.block_poll_ms);
        loop {
            let state = self.state();
            if !state.is_in_progress() {
                return state;
            }
            thread::sleep(interval);
        }
    }

    /// Async counterpart of [`block_on_call`](Self::block_on_call)
    pub async fn wait_for_call_end(&self) -> CallState {
        let mut events = self.subscribe();
        loop {
            let state = self.state();
            if !state.is_in_progress() {
                return state;
            }
            match events.recv().await {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return self.state(),
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CallEvent> {
        self.shared.events.subscribe()
    }

    pub fn state(&self) -> CallState {
        self.shared.state()
    }

    pub fn call_id(&self) -> CallId {
        self.shared.id
    }

    /// Why the last call ended, once teardown has begun
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.shared.close_reason()
    }

    /// True when we accepted the current call rather than placed it
    pub fn is_receiver(&self) -> bool {
        self.shared.is_receiver()
    }

    /// Microphone level in `[0, 1]`
    pub fn input_level(&self) -> f32 {
        self.shared.levels.input_level()
    }

    /// Speaker level in `[0, 1]`
    pub fn output_level(&self) -> f32 {
        self.shared.levels.output_level()
    }

    pub fn stats(&self) -> MediaStats {
        self.shared.counters.snapshot()
    }

    pub fn config(&self) -> &CallConfig {
        &self.config
    }
}

impl Drop for CallSession {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Failed to stop call {} on drop: {}", self.shared.id, e);
        }
    }
}

/// Worker thread body: runs signaling for one call, then tears it down.
/// Dropping the context hands the audio device back before the call is
/// reported stopped.
fn run_call(shared: Arc<CallShared>, mut ctx: CallContext) {
    shared.advance(CallState::Started);

    let signaling = shared.signaling.clone();
    let reason = match panic::catch_unwind(AssertUnwindSafe(|| signaling.run(&mut ctx))) {
        Ok(Ok(())) => CloseReason::RemoteHangup,
        Ok(Err(e)) => {
            warn!("Signaling for {} ended with error: {}", shared.id, e);
            CloseReason::SignalingError
        }
        Err(_) => {
            error!("Signaling for {} panicked", shared.id);
            CloseReason::SignalingError
        }
    };

    // A send loop failure nobody polled for still names the reason
    ctx.check_media();
    shared.request_teardown(reason);
    drop(ctx);
    shared.finish();
}
