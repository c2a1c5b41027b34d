//! Serial port transport for the link.
//!
//! This module wraps the `serialport` crate behind a small byte-level
//! transport trait so the receive worker and transmitter can be driven by
//! in-memory fakes in tests.

use std::io::{Read, Write};
use std::time::Duration;

use tracing::info;

/// Default poll timeout for a blocking single-byte read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Errors from opening or driving the serial port.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// Failed to open the serial port
    #[error("failed to open serial port {path}: {source}")]
    Open {
        /// Device path that was requested
        path: String,
        /// Underlying open failure
        #[source]
        source: serialport::Error,
    },
    /// Serial port control call failed
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    /// Byte-level read or write failed
    #[error("serial i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Byte-level transport under the frame layer.
pub trait Transport: Send {
    /// Read whatever is pending into `buf`, blocking at most the poll
    /// timeout when nothing is pending. Returns the number of bytes read;
    /// zero means the poll timed out with the line idle.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write all of `data` to the line.
    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError>;
}

/// A [`Transport`] over a real serial port.
pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    /// Open `path` at `baud` with the given poll timeout.
    pub fn open(path: &str, baud: u32, timeout: Duration) -> Result<Self, TransportError> {
        let port = serialport::new(path, baud)
            .timeout(timeout)
            .open()
            .map_err(|source| TransportError::Open {
                path: path.to_string(),
                source,
            })?;
        info!("Opened serial port {} at {} baud", path, baud);
        Ok(Self { port })
    }

    /// Clone the underlying port handle, giving an independent read or
    /// write half onto the same device.
    pub fn try_clone(&self) -> Result<Self, TransportError> {
        let port = self.port.try_clone()?;
        Ok(Self { port })
    }
}

impl Transport for SerialTransport {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        // Drain what the driver has buffered, or block up to the poll
        // timeout for a single byte so an idle line does not spin.
        let pending = self.port.bytes_to_read()? as usize;
        let want = pending.clamp(1, buf.len());
        match self.port.read(&mut buf[..want]) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.port.write_all(data)?;
        Ok(())
    }
}

/// Names of serial ports present on this machine, for actionable open
/// errors. Enumeration failures yield an empty list.
pub fn available_port_names() -> Vec<String> {
    serialport::available_ports()
        .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
        .unwrap_or_default()
}
