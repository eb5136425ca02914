use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::codec::{FrameConfig, FrameDecoder};
use crate::error::FrameError;
use crate::header::Packet;

/// `tokio_util` codec yielding validated [`Packet`]s.
///
/// Corrupt frames (bad checksum, bad escape, oversized, truncated header)
/// are logged and skipped; only I/O errors end the stream.
#[derive(Debug)]
pub struct RoverCodec {
    decoder: FrameDecoder,
    max_frame_size: usize,
}

impl RoverCodec {
    pub fn new(config: &FrameConfig) -> Self {
        Self {
            decoder: FrameDecoder::new(config.max_frame_size),
            max_frame_size: config.max_frame_size,
        }
    }
}

impl Default for RoverCodec {
    fn default() -> Self {
        Self::new(&FrameConfig::default())
    }
}

impl Decoder for RoverCodec {
    type Item = Packet;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let body = match self.decoder.decode(src) {
                None => return Ok(None),
                Some(Ok(body)) => body,
                Some(Err(err)) => {
                    debug!(error = %err, "dropping malformed frame");
                    continue;
                }
            };
            match Packet::parse(&body) {
                Ok(packet) => return Ok(Some(packet)),
                Err(err) => debug!(error = %err, "dropping corrupt frame"),
            }
        }
    }
}

impl Encoder<Packet> for RoverCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = item.to_body();
        if body.len() > self.max_frame_size {
            return Err(FrameError::FrameTooLarge {
                max: self.max_frame_size,
            });
        }
        crate::codec::encode_frame(&body, dst);
        Ok(())
    }
}
