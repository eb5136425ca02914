//! Byte channel to the rover controller.
//!
//! The controller is reachable through a single ordered, bidirectional byte
//! stream. This crate provides:
//! - [`ByteChannel`]: a serial port (or a TCP serial bridge) exposed as `Read + Write`
//! - [`Tee`] / [`DebugSink`]: a switchable hex mirror of all traffic for debugging
//! - [`MockChannel`]: an in-memory channel for tests
//!
//! This is the lowest layer of roverlink. Framing and the command engine are
//! built on top of any `Read`/`Write` pair, so callers may inject their own
//! channel instead.

pub mod channel;
pub mod error;
pub mod mock;
pub mod serial;
pub mod tee;

pub use channel::{open, ByteChannel};
pub use error::{Result, TransportError};
pub use mock::MockChannel;
pub use serial::{SerialConfig, DEFAULT_BAUD_RATE};
pub use tee::{DebugSink, Tee};
