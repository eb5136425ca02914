use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use tracing::trace;

use crate::codec::{encode_frame, FrameConfig};
use crate::command::command_name;
use crate::error::{FrameError, Result};
use crate::header::Packet;

const INITIAL_BUFFER_CAPACITY: usize = 64;

/// Writes complete frames to any `Write` stream.
///
/// Each frame is written and flushed in full before `send` returns; wrap
/// the writer in a mutex to share it between threads without interleaving.
pub struct FrameWriter<T> {
    inner: T,
    body: BytesMut,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            body: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and send a packet (checksum computed here).
    pub fn send(&mut self, packet: &Packet) -> Result<()> {
        self.body.clear();
        packet.encode_body(&mut self.body);
        trace!(
            command = command_name(packet.device_id(), packet.command_id()),
            len = self.body.len(),
            "sending frame"
        );
        let body = self.body.split().freeze();
        self.send_body(&body)
    }

    /// Send an already checksummed frame body.
    pub fn send_body(&mut self, body: &[u8]) -> Result<()> {
        if body.len() > self.config.max_frame_size {
            return Err(FrameError::FrameTooLarge {
                max: self.config.max_frame_size,
            });
        }

        self.buf.clear();
        encode_frame(body, &mut self.buf);

        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum frame size for subsequent sends.
    pub fn set_max_frame_size(&mut self, max_frame_size: usize) {
        self.config.max_frame_size = max_frame_size;
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
