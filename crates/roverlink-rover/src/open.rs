//! Opening an engine on a serial port or TCP bridge.

use std::io::Write;

use roverlink_transport::{ByteChannel, DebugSink, Tee};
use tracing::debug;

use crate::config::RoverConfig;
use crate::error::Result;
use crate::rover::Rover;

/// Destination for mirrored wire bytes.
pub type DebugOutput = Box<dyn Write + Send>;

/// One direction of a channel, mirrored to the debug sink when enabled.
pub type LinkHalf = Tee<ByteChannel, DebugOutput>;

/// Engine attached to a real channel.
pub type ChannelRover = Rover<LinkHalf, LinkHalf>;

/// Open `target` (a serial device path or `tcp://host:port`) and attach an engine.
pub fn open(target: &str, baud_rate: u32, config: RoverConfig) -> Result<ChannelRover> {
    let channel = roverlink_transport::open(target, baud_rate)?;
    attach_channel(channel, DebugSink::new(Box::new(std::io::sink())), config)
}

/// Like [`open`], mirroring every byte read or written to `debug`.
pub fn open_with_debug(
    target: &str,
    baud_rate: u32,
    debug: DebugOutput,
    config: RoverConfig,
) -> Result<ChannelRover> {
    let channel = roverlink_transport::open(target, baud_rate)?;
    let sink = DebugSink::new(debug);
    sink.enable();
    attach_channel(channel, sink, config)
}

/// Split `channel` into reader and writer halves and attach an engine.
///
/// The reader half gets the read timeout the configuration implies, so
/// bounded reply waits can observe their deadline.
pub fn attach_channel(
    channel: ByteChannel,
    debug: DebugSink<DebugOutput>,
    config: RoverConfig,
) -> Result<ChannelRover> {
    let mut reader = channel.try_clone()?;
    reader.set_read_timeout(config.channel_read_timeout())?;
    debug!(channel = channel.label(), "attaching engine to channel");

    Ok(Rover::with_config(
        Tee::new(reader, debug.clone()),
        Tee::new(channel, debug),
        config,
    ))
}
