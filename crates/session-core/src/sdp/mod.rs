//! Session descriptions and offer/answer negotiation

pub mod description;
pub mod negotiator;

pub use description::{MediaDescription, Origin, RtpMap, SessionDescription};
pub use negotiator::{NegotiatedMedia, NegotiationState, SessionNegotiator};
