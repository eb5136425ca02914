use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use roverlink_transport::{ByteChannel, TransportError};

use crate::codec::{FrameConfig, FrameDecoder};
use crate::error::{FrameError, Result};
use crate::header::Packet;

const READ_CHUNK_SIZE: usize = 256;

/// Reads complete frames from any `Read` stream.
///
/// Handles partial reads and resynchronisation internally. A read error
/// (including `WouldBlock`/`TimedOut` from a channel with a read timeout)
/// is returned to the caller without losing a partially received frame.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    decoder: FrameDecoder,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            decoder: FrameDecoder::new(config.max_frame_size),
            config,
        }
    }

    /// Read the next frame body (header + payload + checksum, unstuffed).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    /// Framing errors ([`FrameError::InvalidEscape`], [`FrameError::FrameTooLarge`])
    /// drop only the offending frame; the next call continues with the stream.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        loop {
            if let Some(result) = self.decoder.decode(&mut self.buf) {
                return result;
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Read the next frame and validate it into a [`Packet`].
    pub fn read_packet(&mut self) -> Result<Packet> {
        let body = self.read_frame()?;
        Packet::parse(&body)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// True while a frame has started arriving but is not complete.
    pub fn in_frame(&self) -> bool {
        self.decoder.in_frame()
    }

    /// Bytes dropped while resynchronising.
    pub fn discarded(&self) -> u64 {
        self.decoder.discarded()
    }

    /// Update maximum frame size for subsequent decoding.
    pub fn set_max_frame_size(&mut self, max_frame_size: usize) {
        self.config.max_frame_size = max_frame_size;
        self.decoder.set_max_frame_size(max_frame_size);
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<ByteChannel> {
    /// Create a frame reader for a `ByteChannel` and apply the read timeout from config.
    pub fn with_config_channel(mut inner: ByteChannel, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

fn transport_to_frame_error(err: TransportError) -> FrameError {
    match err {
        TransportError::Io(io) => FrameError::Io(io),
        TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    use bytes::BytesMut;
    use roverlink_transport::MockChannel;

    use super::*;
    use crate::codec::encode_frame;
    use crate::header::Header;

    fn wire_for(packet: &Packet) -> Vec<u8> {
        let mut wire = BytesMut::new();
        packet.encode(&mut wire);
        wire.to_vec()
    }

    fn battery_reply(percent: u8) -> Packet {
        Packet::new(Header::new(0x08, 0x13, 0x10), vec![percent])
    }

    #[test]
    fn read_single_packet() {
        let mut reader = FrameReader::new(Cursor::new(wire_for(&battery_reply(90))));
        let packet = reader.read_packet().unwrap();

        assert_eq!(packet.command_id(), 0x10);
        assert_eq!(packet.payload.as_ref(), &[90]);
    }

    #[test]
    fn read_multiple_packets() {
        let mut wire = wire_for(&battery_reply(1));
        wire.extend(wire_for(&battery_reply(2)));
        wire.extend(wire_for(&battery_reply(3)));

        let mut reader = FrameReader::new(Cursor::new(wire));
        for expected in 1..=3u8 {
            assert_eq!(reader.read_packet().unwrap().payload.as_ref(), &[expected]);
        }
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: wire_for(&battery_reply(0x8D)),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        let packet = reader.read_packet().unwrap();
        assert_eq!(packet.payload.as_ref(), &[0x8D]);
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut reader = FrameReader::new(Cursor::new(vec![0x8D, 0x08, 0x13]));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
        assert!(reader.in_frame());
    }

    #[test]
    fn corrupt_frame_then_good_frame() {
        let mut bad = BytesMut::new();
        encode_frame(&[0x08, 0x13, 0x10, 0x00, 0x5A, 0x00], &mut bad);
        let mut wire = bad.to_vec();
        wire.extend(wire_for(&battery_reply(0x5A)));

        let mut reader = FrameReader::new(Cursor::new(wire));
        let err = reader.read_packet().unwrap_err();
        assert!(matches!(err, FrameError::ChecksumMismatch { .. }));

        let packet = reader.read_packet().unwrap();
        assert_eq!(packet.payload.as_ref(), &[0x5A]);
    }

    #[test]
    fn oversized_frame_in_stream() {
        let mut wire = BytesMut::new();
        encode_frame(&[0x11; 32], &mut wire);

        let cfg = FrameConfig {
            max_frame_size: 16,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(wire.to_vec()), cfg);
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { max: 16 }));
    }

    #[test]
    fn noise_before_frame_is_counted() {
        let mut wire = vec![0x00, 0xFF, 0xD8];
        wire.extend(wire_for(&battery_reply(7)));

        let mut reader = FrameReader::new(Cursor::new(wire));
        reader.read_packet().unwrap();
        assert_eq!(reader.discarded(), 3);
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            if buf.is_empty() {
                return Ok(0);
            }

            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    #[test]
    fn roundtrip_over_pipe() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        writer.send(&battery_reply(42)).unwrap();
        let packet = reader.read_packet().unwrap();

        assert_eq!(packet, battery_reply(42));
    }

    #[test]
    fn concurrent_reader_writer_threads() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let reader = Arc::new(Mutex::new(FrameReader::new(right)));

        let reader_thread = {
            let reader = Arc::clone(&reader);
            std::thread::spawn(move || {
                for expected in 0..=255u8 {
                    let packet = reader.lock().unwrap().read_packet().unwrap();
                    assert_eq!(packet.payload.as_ref(), &[expected]);
                }
            })
        };

        for i in 0..=255u8 {
            writer.send(&battery_reply(i)).unwrap();
        }

        reader_thread.join().unwrap();
    }

    #[test]
    fn accessors_and_into_inner() {
        let cursor = Cursor::new(Vec::<u8>::new());
        let mut reader = FrameReader::new(cursor);

        let _ = reader.get_ref();
        let _ = reader.get_mut();
        reader.set_max_frame_size(32);
        assert_eq!(reader.config().max_frame_size, 32);
        let _inner = reader.into_inner();
    }

    #[test]
    fn would_block_keeps_partial_frame() {
        let wire = wire_for(&battery_reply(0x33));
        let (head, tail) = wire.split_at(3);

        let reader = WouldBlockBetween {
            chunks: vec![head.to_vec(), tail.to_vec()],
            blocked: false,
        };
        let mut framed = FrameReader::new(reader);

        let err = framed.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
        assert!(framed.in_frame());

        let packet = framed.read_packet().unwrap();
        assert_eq!(packet.payload.as_ref(), &[0x33]);
    }

    struct WouldBlockBetween {
        chunks: Vec<Vec<u8>>,
        blocked: bool,
    }

    impl Read for WouldBlockBetween {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.blocked && self.chunks.len() == 1 {
                self.blocked = true;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            if self.chunks.is_empty() {
                return Ok(0);
            }
            let chunk = self.chunks.remove(0);
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            bytes: Cursor::new(wire_for(&battery_reply(8))),
        };
        let mut framed = FrameReader::new(reader);
        let packet = framed.read_packet().unwrap();

        assert_eq!(packet.payload.as_ref(), &[8]);
    }

    struct InterruptedThenData {
        interrupted: bool,
        bytes: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.bytes.read(buf)
        }
    }

    #[test]
    fn reads_from_mock_channel() {
        let mock = MockChannel::new();
        mock.inject_read(&wire_for(&battery_reply(55)));

        let mut reader = FrameReader::new(mock.clone());
        assert_eq!(reader.read_packet().unwrap().payload.as_ref(), &[55]);
        assert_eq!(mock.pending_read(), 0);
    }

    #[test]
    fn applies_read_timeout_for_channel() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let bridge = std::thread::spawn(move || listener.accept().unwrap());

        let channel = ByteChannel::connect_tcp(&addr.to_string()).unwrap();
        let _peer = bridge.join().unwrap();

        let cfg = FrameConfig {
            read_timeout: Some(std::time::Duration::from_millis(10)),
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config_channel(channel, cfg).unwrap();
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(
            err,
            FrameError::Io(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
        ));
    }
}
