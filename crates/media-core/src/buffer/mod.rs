//! Buffering between the real-time audio thread and the media threads

pub mod ring_buffer;

pub use ring_buffer::{AudioRing, RingConsumer, RingProducer};
