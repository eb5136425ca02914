use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, StopBits};
use tracing::info;

use crate::channel::ByteChannel;
use crate::error::{Result, TransportError};

/// Baud rate of the rover controller's UART.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Poll interval used when no read timeout is requested.
///
/// The serial driver always needs a finite timeout; a blocking read is
/// emulated by the frame reader retrying on `TimedOut`.
pub(crate) const BLOCKING_POLL: Duration = Duration::from_millis(250);

/// Serial line settings for the controller link (always 8N1, no flow control).
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0` or `/dev/serial0`.
    pub path: String,
    /// Line speed.
    pub baud_rate: u32,
    /// Read timeout. `None` polls at a fixed interval.
    pub read_timeout: Option<Duration>,
}

impl SerialConfig {
    /// Settings for `path` at the controller's default baud rate.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: None,
        }
    }

    /// Override the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Override the read timeout.
    pub fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Open the serial device.
    pub fn open(&self) -> Result<ByteChannel> {
        let port = serialport::new(&self.path, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.read_timeout.unwrap_or(BLOCKING_POLL))
            .open()
            .map_err(|source| TransportError::Open {
                path: self.path.clone(),
                source,
            })?;

        info!(path = %self.path, baud = self.baud_rate, "opened serial port");
        Ok(ByteChannel::from_serial(port, self.path.clone()))
    }
}
