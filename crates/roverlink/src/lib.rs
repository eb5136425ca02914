//! Host-side control link for a two-processor educational rover.
//!
//! roverlink talks to the rover's controller over a serial line: byte-stuffed
//! frames with an additive checksum, request/reply correlation by command id,
//! and a streamed locator that keeps the rover's map position current.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial port, TCP bridge, debug tee and mock channel
//! - [`frame`]: frame codec, header parsing, command identifiers
//! - [`rover`]: command engine, position streaming, force-stop handle

/// Re-export transport types.
pub mod transport {
    pub use roverlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use roverlink_frame::*;
}

/// Re-export engine types.
pub mod rover {
    pub use roverlink_rover::*;
}

pub use roverlink_rover::{open, Rover, RoverConfig, RoverError};
