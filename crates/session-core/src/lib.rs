//! # voxcall session core
//!
//! The call engine: one [`CallSession`] per call endpoint, driving a
//! forward-only [`CallState`] machine, SDP offer/answer with SDES key
//! exchange, and the SRTP media pipeline between an audio device and a
//! datagram transport.
//!
//! The signaling stack is a collaborator. It implements
//! [`SignalingChannel`] and reports what the peer does through the
//! [`CallContext`] handed to it:
//!
//! ```text
//! CallSession::start ──► worker thread ──► SignalingChannel::run(ctx)
//!                                               │
//!      ctx.build_offer / on_answer_received ◄───┤  offer/answer
//!      ctx.on_established ──► send thread       │  media starts
//!      ctx.poll_media / on_rtp_packet  ◄────────┤  receive path
//!      ctx.on_closed ───────► teardown ◄────────┘
//! ```
//!
//! Threads: the caller's control thread, one worker per call (signaling and
//! the receive path), one send thread while media flows, and whatever the
//! audio device runs its callback on. The device callback only touches the
//! lock-free rings in `voxcall-media-core`.

pub mod config;
pub mod errors;
pub mod media;
pub mod sdp;
pub mod session;
pub mod signaling;
pub mod types;

pub use config::CallConfig;
pub use errors::{NegotiationError, Result, SessionError};
pub use media::{LinkHealth, MediaCrypto, MediaStats};
pub use sdp::{NegotiatedMedia, SessionDescription, SessionNegotiator};
pub use session::{CallRegistry, CallSession};
pub use signaling::{CallContext, SignalingChannel};
pub use types::{CallDirection, CallEvent, CallId, CallState, CloseReason, IncomingDecision};

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::{
        CallConfig, CallContext, CallDirection, CallEvent, CallId, CallRegistry, CallSession,
        CallState, CloseReason, IncomingDecision, MediaStats, NegotiationError, Result,
        SessionError, SignalingChannel,
    };
}
