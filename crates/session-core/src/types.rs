//! Core types shared across the session engine

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Call lifecycle states, in the only order they may be visited.
///
/// A call placed by us goes `Starting, Started, Connecting, Progressing,
/// Media, Connected`; a call we accept goes `Starting, Started, Ready,
/// Media, Connected`. Either may skip states but never moves backwards,
/// except that `start` resets a finished call to `Starting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CallState {
    None = 0,
    Starting = 1,
    Started = 2,
    /// Offer sent
    Connecting = 3,
    /// Incoming call accepted, waiting for its offer
    Ready = 4,
    /// Remote side is alerting
    Progressing = 5,
    /// Offer/answer complete
    Media = 6,
    /// Session established, media flowing
    Connected = 7,
    Stopping = 8,
    Stopped = 9,
}

impl CallState {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => CallState::None,
            1 => CallState::Starting,
            2 => CallState::Started,
            3 => CallState::Connecting,
            4 => CallState::Ready,
            5 => CallState::Progressing,
            6 => CallState::Media,
            7 => CallState::Connected,
            8 => CallState::Stopping,
            9 => CallState::Stopped,
            _ => return None,
        })
    }

    /// States in which a call is under way (everything between a start and
    /// the beginning of teardown)
    pub fn is_in_progress(self) -> bool {
        !matches!(self, CallState::None | CallState::Stopping | CallState::Stopped)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Which side of the call we are
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallDirection {
    /// We place the call and send the offer
    Outbound,
    /// We wait for a call and answer its offer
    Inbound,
}

/// Why a call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    LocalHangup,
    RemoteHangup,
    /// No packets from the peer for too long
    LinkStasis,
    /// The send loop failed (socket, codec or device)
    SendFailure,
    SignalingError,
}

/// What the collaborator should do with an incoming call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncomingDecision {
    Accept,
    /// Reject with "486 Busy Here"
    Busy,
}

/// Events published to [`CallSession::subscribe`](crate::CallSession::subscribe) receivers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    StateChanged { from: CallState, to: CallState },
    /// The send loop is running and packets are flowing
    MediaStarted,
    /// The peer went silent and the call is being torn down
    LinkStasis,
    Closed { reason: CloseReason },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trips_through_u8() {
        for value in 0..=9u8 {
            let state = CallState::from_u8(value).unwrap();
            assert_eq!(state as u8, value);
        }
        assert_eq!(CallState::from_u8(10), None);
    }

    #[test]
    fn test_in_progress_states() {
        assert!(!CallState::None.is_in_progress());
        assert!(CallState::Starting.is_in_progress());
        assert!(CallState::Connected.is_in_progress());
        assert!(!CallState::Stopping.is_in_progress());
        assert!(!CallState::Stopped.is_in_progress());
    }

    #[test]
    fn test_order_follows_lifecycle() {
        assert!(CallState::Connecting < CallState::Ready);
        assert!(CallState::Media < CallState::Connected);
        assert!(CallState::Connected < CallState::Stopping);
    }

    #[test]
    fn test_call_ids_are_unique() {
        assert_ne!(CallId::new(), CallId::new());
    }
}
