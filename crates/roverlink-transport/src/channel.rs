use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use serialport::SerialPort;
use tracing::info;

use crate::error::{Result, TransportError};
use crate::serial::{SerialConfig, BLOCKING_POLL};

/// Prefix selecting a TCP serial bridge instead of a local device.
const TCP_SCHEME: &str = "tcp://";

/// An open byte channel to the controller. Implements Read + Write.
///
/// Wraps either a local serial device or a TCP connection to a serial
/// bridge (ser2net and friends). Use [`ByteChannel::try_clone`] to obtain
/// independent reader and writer halves.
pub struct ByteChannel {
    inner: ChannelInner,
    label: String,
}

enum ChannelInner {
    Serial(Box<dyn SerialPort>),
    Tcp(TcpStream),
}

/// Open a channel from a target string.
///
/// `tcp://host:port` connects to a serial bridge; anything else is treated
/// as a serial device path opened at `baud_rate`.
pub fn open(target: &str, baud_rate: u32) -> Result<ByteChannel> {
    match target.strip_prefix(TCP_SCHEME) {
        Some(addr) => ByteChannel::connect_tcp(addr),
        None => SerialConfig::new(target).with_baud_rate(baud_rate).open(),
    }
}

impl Read for ByteChannel {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            ChannelInner::Serial(port) => port.read(buf),
            ChannelInner::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for ByteChannel {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            ChannelInner::Serial(port) => port.write(buf),
            ChannelInner::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            ChannelInner::Serial(port) => port.flush(),
            ChannelInner::Tcp(stream) => stream.flush(),
        }
    }
}

impl ByteChannel {
    pub(crate) fn from_serial(port: Box<dyn SerialPort>, label: String) -> Self {
        Self {
            inner: ChannelInner::Serial(port),
            label,
        }
    }

    /// Connect to a TCP serial bridge at `addr` (`host:port`).
    pub fn connect_tcp(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).map_err(|source| TransportError::Connect {
            addr: addr.to_string(),
            source,
        })?;
        stream.set_nodelay(true)?;
        info!(%addr, "connected to serial bridge");
        Ok(Self {
            inner: ChannelInner::Tcp(stream),
            label: format!("{TCP_SCHEME}{addr}"),
        })
    }

    /// Wrap an already connected TCP stream.
    pub fn from_tcp(stream: TcpStream) -> Result<Self> {
        stream.set_nodelay(true)?;
        let label = match stream.peer_addr() {
            Ok(addr) => format!("{TCP_SCHEME}{addr}"),
            Err(_) => TCP_SCHEME.to_string(),
        };
        Ok(Self {
            inner: ChannelInner::Tcp(stream),
            label,
        })
    }

    /// Set the read timeout. `None` blocks (serial ports poll internally).
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            ChannelInner::Serial(port) => port
                .set_timeout(timeout.unwrap_or(BLOCKING_POLL))
                .map_err(Into::into),
            ChannelInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this channel (a second handle to the same device).
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            ChannelInner::Serial(port) => ChannelInner::Serial(port.try_clone()?),
            ChannelInner::Tcp(stream) => ChannelInner::Tcp(stream.try_clone()?),
        };
        Ok(Self {
            inner,
            label: self.label.clone(),
        })
    }

    /// Device path or bridge address this channel was opened on.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl std::fmt::Debug for ByteChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.inner {
            ChannelInner::Serial(_) => "serial",
            ChannelInner::Tcp(_) => "tcp",
        };
        f.debug_struct("ByteChannel")
            .field("type", &kind)
            .field("label", &self.label)
            .finish()
    }
}
