use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{checksum, encode_frame};
use crate::error::{FrameError, Result};

/// Header flags byte.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Flags(u8);

impl Flags {
    pub const IS_RESPONSE: u8 = 1 << 0;
    pub const RESPONSE_REQUESTED: u8 = 1 << 1;
    pub const RESPONSE_REQUESTED_IF_ERROR: u8 = 1 << 2;
    pub const IS_ACTIVITY: u8 = 1 << 3;
    pub const HAS_TARGET: u8 = 1 << 4;
    pub const HAS_SOURCE: u8 = 1 << 5;
    pub const HAS_MORE_FLAGS: u8 = 1 << 7;

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, mask: u8) -> bool {
        self.0 & mask == mask
    }

    #[must_use]
    pub const fn with(self, mask: u8) -> Self {
        Self(self.0 | mask)
    }

    pub const fn is_response(self) -> bool {
        self.contains(Self::IS_RESPONSE)
    }

    pub const fn response_requested(self) -> bool {
        self.contains(Self::RESPONSE_REQUESTED)
    }

    pub const fn response_requested_if_error(self) -> bool {
        self.contains(Self::RESPONSE_REQUESTED_IF_ERROR)
    }

    pub const fn is_activity(self) -> bool {
        self.contains(Self::IS_ACTIVITY)
    }

    pub const fn has_target(self) -> bool {
        self.contains(Self::HAS_TARGET)
    }

    pub const fn has_source(self) -> bool {
        self.contains(Self::HAS_SOURCE)
    }

    pub const fn has_more_flags(self) -> bool {
        self.contains(Self::HAS_MORE_FLAGS)
    }

    /// Header length in bytes implied by these flags.
    pub const fn header_len(self) -> usize {
        4 + self.has_target() as usize + self.has_source() as usize + self.is_response() as usize
    }
}

impl std::fmt::Debug for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Flags({:#04x})", self.0)
    }
}

impl From<u8> for Flags {
    fn from(bits: u8) -> Self {
        Self(bits)
    }
}

/// Frame header.
///
/// Layout on the wire, in order: flags, target (if `HAS_TARGET`), source
/// (if `HAS_SOURCE`), device id, command id, sequence, error code (if
/// `IS_RESPONSE`). Optional fields are written exactly when their flag bit
/// is set; a missing value is written as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub flags: Flags,
    pub target: Option<u8>,
    pub source: Option<u8>,
    pub device_id: u8,
    pub command_id: u8,
    pub sequence: u8,
    pub error_code: Option<u8>,
}

impl Header {
    /// Header with the given flags. Target and source stay empty even if
    /// their bits are set; use [`Header::with_target`]/[`Header::with_source`].
    pub fn new(flags: u8, device_id: u8, command_id: u8) -> Self {
        Self {
            flags: Flags::from_bits(flags),
            target: None,
            source: None,
            device_id,
            command_id,
            sequence: 0,
            error_code: None,
        }
    }

    /// Set the target id and its flag bit.
    #[must_use]
    pub fn with_target(mut self, target: u8) -> Self {
        self.flags = self.flags.with(Flags::HAS_TARGET);
        self.target = Some(target);
        self
    }

    /// Set the source id and its flag bit.
    #[must_use]
    pub fn with_source(mut self, source: u8) -> Self {
        self.flags = self.flags.with(Flags::HAS_SOURCE);
        self.source = Some(source);
        self
    }

    #[must_use]
    pub fn with_sequence(mut self, sequence: u8) -> Self {
        self.sequence = sequence;
        self
    }

    /// Mark as a response carrying `error_code`.
    #[must_use]
    pub fn with_error_code(mut self, error_code: u8) -> Self {
        self.flags = self.flags.with(Flags::IS_RESPONSE);
        self.error_code = Some(error_code);
        self
    }

    /// Encoded length in bytes.
    pub fn encoded_len(&self) -> usize {
        self.flags.header_len()
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(self.flags.bits());
        if self.flags.has_target() {
            dst.put_u8(self.target.unwrap_or_default());
        }
        if self.flags.has_source() {
            dst.put_u8(self.source.unwrap_or_default());
        }
        dst.put_u8(self.device_id);
        dst.put_u8(self.command_id);
        dst.put_u8(self.sequence);
        if self.flags.is_response() {
            dst.put_u8(self.error_code.unwrap_or_default());
        }
    }

    /// Parse a header from the start of `src`, returning it with the bytes it used.
    pub fn parse(src: &[u8]) -> Result<(Self, usize)> {
        let Some(&first) = src.first() else {
            return Err(FrameError::Truncated {
                needed: 4,
                actual: 0,
            });
        };
        let flags = Flags::from_bits(first);
        let needed = flags.header_len();
        if src.len() < needed {
            return Err(FrameError::Truncated {
                needed,
                actual: src.len(),
            });
        }

        let mut pos = 1;
        let mut take = || {
            let byte = src[pos];
            pos += 1;
            byte
        };
        let target = flags.has_target().then(&mut take);
        let source = flags.has_source().then(&mut take);
        let device_id = take();
        let command_id = take();
        let sequence = take();
        let error_code = flags.is_response().then(&mut take);

        let header = Self {
            flags,
            target,
            source,
            device_id,
            command_id,
            sequence,
            error_code,
        };
        Ok((header, needed))
    }
}

/// A parsed frame: header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    pub payload: Bytes,
}

impl Packet {
    pub fn new(header: Header, payload: impl Into<Bytes>) -> Self {
        Self {
            header,
            payload: payload.into(),
        }
    }

    /// Packet with no payload.
    pub fn empty(header: Header) -> Self {
        Self::new(header, Bytes::new())
    }

    pub fn command_id(&self) -> u8 {
        self.header.command_id
    }

    pub fn device_id(&self) -> u8 {
        self.header.device_id
    }

    /// Validate the trailing checksum of a frame body and split it into header and payload.
    ///
    /// The checksum is checked before the header is interpreted, so any
    /// corruption that changes the byte sum is reported as
    /// [`FrameError::ChecksumMismatch`].
    pub fn parse(body: &[u8]) -> Result<Self> {
        let Some((&actual, content)) = body.split_last() else {
            return Err(FrameError::Truncated {
                needed: 5,
                actual: 0,
            });
        };

        let expected = checksum(content);
        if expected != actual {
            return Err(FrameError::ChecksumMismatch { expected, actual });
        }

        let (header, used) = Header::parse(content).map_err(|err| match err {
            FrameError::Truncated { needed, .. } => FrameError::Truncated {
                needed: needed + 1,
                actual: body.len(),
            },
            other => other,
        })?;

        Ok(Self {
            header,
            payload: Bytes::copy_from_slice(&content[used..]),
        })
    }

    /// Append header, payload and checksum to `dst`.
    pub fn encode_body(&self, dst: &mut BytesMut) {
        let start = dst.len();
        dst.reserve(self.header.encoded_len() + self.payload.len() + 1);
        self.header.encode(dst);
        dst.put_slice(&self.payload);
        let sum = checksum(&dst[start..]);
        dst.put_u8(sum);
    }

    /// Header, payload and checksum as one buffer (unstuffed).
    pub fn to_body(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode_body(&mut buf);
        buf.freeze()
    }

    /// Append the complete delimited, stuffed frame to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        encode_frame(&self.to_body(), dst);
    }
}
