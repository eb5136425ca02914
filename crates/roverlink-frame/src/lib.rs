//! Framing for the rover control link.
//!
//! Every message on the wire is one frame:
//! - a start delimiter (`0x8D`) and an end delimiter (`0xD8`)
//! - a header whose length depends on its flags byte
//! - an optional payload
//! - a one-byte additive checksum over header and payload
//!
//! Any byte inside a frame that collides with a delimiter or the escape
//! marker (`0xAB`) is byte-stuffed. [`FrameDecoder`] resynchronises on the
//! next start delimiter after line noise, so callers only ever see whole
//! frames.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod command;
pub mod error;
pub mod header;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::RoverCodec;
pub use codec::{
    checksum, encode_frame, FrameConfig, FrameDecoder, DEFAULT_MAX_FRAME, END_OF_PACKET, ESCAPE,
    START_OF_PACKET,
};
pub use command::{command_name, device_name};
pub use error::{FrameError, Result};
pub use header::{Flags, Header, Packet};
pub use reader::FrameReader;
pub use writer::FrameWriter;
