use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{debug, trace};

use crate::error::{FrameError, Result};

/// Start-of-packet delimiter.
pub const START_OF_PACKET: u8 = 0x8D;

/// End-of-packet delimiter.
pub const END_OF_PACKET: u8 = 0xD8;

/// Escape marker preceding a substituted byte.
pub const ESCAPE: u8 = 0xAB;

/// Substitute for an escaped start delimiter.
pub const ESCAPED_START: u8 = 0x05;

/// Substitute for an escaped end delimiter.
pub const ESCAPED_END: u8 = 0x50;

/// Substitute for an escaped escape marker.
pub const ESCAPED_ESCAPE: u8 = 0x23;

/// Substitutes are the reserved byte XOR this mask. Fixed by the controller firmware.
pub const ESCAPE_MASK: u8 = 0x88;

/// Default maximum frame body (header + payload + checksum): the controller's receive buffer.
pub const DEFAULT_MAX_FRAME: usize = 256;

/// One's-complement of the 8-bit sum of `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    !bytes.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

fn is_reserved(byte: u8) -> bool {
    matches!(byte, START_OF_PACKET | END_OF_PACKET | ESCAPE)
}

/// Encode a frame body (header + payload + checksum) into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────┬──────────────────────────────────────┬──────┐
/// │ 0x8D │ header │ payload │ checksum (stuffed) │ 0xD8 │
/// └──────┴──────────────────────────────────────┴──────┘
/// ```
/// Every body byte equal to `0x8D`, `0xD8` or `0xAB` is written as
/// `0xAB, byte ^ 0x88`.
pub fn encode_frame(body: &[u8], dst: &mut BytesMut) {
    let stuffed = body.iter().filter(|b| is_reserved(**b)).count();
    dst.reserve(body.len() + stuffed + 2);
    dst.put_u8(START_OF_PACKET);
    for &byte in body {
        if is_reserved(byte) {
            dst.put_u8(ESCAPE);
            dst.put_u8(byte ^ ESCAPE_MASK);
        } else {
            dst.put_u8(byte);
        }
    }
    dst.put_u8(END_OF_PACKET);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// Discarding bytes until a start delimiter.
    Hunting,
    /// Inside a frame.
    Body,
    /// Inside a frame, previous byte was the escape marker.
    Escaped,
}

/// Incremental frame decoder.
///
/// Feed it bytes in any chunking; it yields one unstuffed frame body (the
/// trailing byte is the checksum) per end delimiter. State is kept between
/// calls, so a read that times out mid-frame resumes where it stopped.
///
/// Resynchronisation rules:
/// - outside a frame, everything up to the next start delimiter is dropped
/// - an unescaped start delimiter inside a frame restarts the frame
/// - an unknown escape substitute drops the frame with [`FrameError::InvalidEscape`]
/// - a body longer than `max_frame_size` drops the frame with [`FrameError::FrameTooLarge`]
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecodeState,
    body: BytesMut,
    max_frame_size: usize,
    discarded: u64,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME)
    }
}

impl FrameDecoder {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            state: DecodeState::Hunting,
            body: BytesMut::with_capacity(max_frame_size.min(DEFAULT_MAX_FRAME)),
            max_frame_size,
            discarded: 0,
        }
    }

    /// Feed one raw byte. Returns a result once a frame ends or fails.
    pub fn push(&mut self, byte: u8) -> Option<Result<Bytes>> {
        match self.state {
            DecodeState::Hunting => {
                if byte == START_OF_PACKET {
                    self.body.clear();
                    self.state = DecodeState::Body;
                } else {
                    self.discarded += 1;
                }
                None
            }
            DecodeState::Body => match byte {
                START_OF_PACKET => {
                    self.restart();
                    None
                }
                END_OF_PACKET => {
                    self.state = DecodeState::Hunting;
                    let body = self.body.split().freeze();
                    trace!(len = body.len(), "frame decoded");
                    Some(Ok(body))
                }
                ESCAPE => {
                    self.state = DecodeState::Escaped;
                    None
                }
                other => self.accept(other),
            },
            DecodeState::Escaped => match byte {
                ESCAPED_START | ESCAPED_END | ESCAPED_ESCAPE => {
                    self.state = DecodeState::Body;
                    self.accept(byte ^ ESCAPE_MASK)
                }
                START_OF_PACKET => {
                    self.restart();
                    None
                }
                other => {
                    self.drop_frame();
                    debug!(byte = other, "invalid escape sequence, frame dropped");
                    Some(Err(FrameError::InvalidEscape(other)))
                }
            },
        }
    }

    /// Consume bytes from `src` until a frame completes or `src` is exhausted.
    ///
    /// Bytes up to and including the end of the returned frame are removed
    /// from `src`; bytes after it are left for the next call.
    pub fn decode(&mut self, src: &mut BytesMut) -> Option<Result<Bytes>> {
        for i in 0..src.len() {
            if let Some(result) = self.push(src[i]) {
                src.advance(i + 1);
                return Some(result);
            }
        }
        src.clear();
        None
    }

    /// True while a frame has started but not ended.
    pub fn in_frame(&self) -> bool {
        self.state != DecodeState::Hunting
    }

    /// Bytes dropped so far while hunting for a start delimiter or restarting a frame.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Forget any partial frame and go back to hunting.
    pub fn reset(&mut self) {
        self.body.clear();
        self.state = DecodeState::Hunting;
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    pub fn set_max_frame_size(&mut self, max_frame_size: usize) {
        self.max_frame_size = max_frame_size;
    }

    fn accept(&mut self, byte: u8) -> Option<Result<Bytes>> {
        if self.body.len() >= self.max_frame_size {
            self.drop_frame();
            debug!(max = self.max_frame_size, "oversized frame dropped");
            return Some(Err(FrameError::FrameTooLarge {
                max: self.max_frame_size,
            }));
        }
        self.body.put_u8(byte);
        None
    }

    fn restart(&mut self) {
        if !self.body.is_empty() {
            debug!(dropped = self.body.len(), "start delimiter inside frame, resyncing");
        }
        self.discarded += self.body.len() as u64;
        self.body.clear();
        self.state = DecodeState::Body;
    }

    fn drop_frame(&mut self) {
        self.discarded += self.body.len() as u64;
        self.reset();
    }
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum frame body in bytes. Default: 256.
    pub max_frame_size: usize,
    /// Read timeout applied to the channel. `None` blocks indefinitely.
    pub read_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME,
            read_timeout: None,
        }
    }
}
