//! Byte transport underneath the link protocol.
//!
//! The RFD900 presents itself as a plain serial port. Everything above this
//! module talks to a [`SerialChannel`], so tests can substitute the in-memory
//! [`ScriptedChannel`](crate::testing::ScriptedChannel).

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::SerialPort;

/// Which direction of the transport buffers to discard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearBuffer {
    /// Bytes received but not yet read.
    Input,
    /// Bytes written but not yet sent.
    Output,
}

/// A half-duplex byte channel with a bounded read timeout.
pub trait SerialChannel: Send {
    /// Read available bytes into `buf`.
    ///
    /// Blocks for at most the channel's read timeout and returns `Ok(0)` if
    /// nothing arrived in that time. An idle link is never an error.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write all of `data`.
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Discard buffered bytes in one direction.
    fn clear(&mut self, buffer: ClearBuffer) -> io::Result<()>;

    /// Open a second handle onto the same transport.
    ///
    /// The receive loop reads through one handle while the command channel
    /// writes through the other.
    fn try_clone(&self) -> io::Result<Box<dyn SerialChannel>>;

    /// Human-readable transport name, for logs.
    fn name(&self) -> String {
        "serial".to_string()
    }
}

/// Serial settings for opening a physical port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortSettings {
    /// Device path (e.g. `/dev/ttyUSB0` or `COM3`).
    pub path: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Read timeout; bounds every blocking read.
    pub read_timeout: Duration,
}

impl PortSettings {
    /// Settings with the RFD900 default baud rate and a one second timeout.
    pub fn new(path: impl Into<String>) -> Self {
        PortSettings {
            path: path.into(),
            baud_rate: 38_400,
            read_timeout: Duration::from_secs(1),
        }
    }

    /// Set the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the read timeout.
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}

/// [`SerialChannel`] over a physical port opened with the `serialport` crate.
pub struct SerialPortChannel {
    port: Box<dyn SerialPort>,
}

impl SerialPortChannel {
    /// Open a physical serial port.
    pub fn open(settings: &PortSettings) -> serialport::Result<Self> {
        let port = serialport::new(&settings.path, settings.baud_rate)
            .timeout(settings.read_timeout)
            .open()?;
        Ok(SerialPortChannel { port })
    }

    /// Wrap an already opened port.
    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        SerialPortChannel { port }
    }
}

impl SerialChannel for SerialPortChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)?;
        self.port.flush()
    }

    fn clear(&mut self, buffer: ClearBuffer) -> io::Result<()> {
        let which = match buffer {
            ClearBuffer::Input => serialport::ClearBuffer::Input,
            ClearBuffer::Output => serialport::ClearBuffer::Output,
        };
        self.port.clear(which).map_err(io::Error::from)
    }

    fn try_clone(&self) -> io::Result<Box<dyn SerialChannel>> {
        let port = self.port.try_clone().map_err(io::Error::from)?;
        Ok(Box::new(SerialPortChannel { port }))
    }

    fn name(&self) -> String {
        self.port.name().unwrap_or_else(|| "serial".to_string())
    }
}
