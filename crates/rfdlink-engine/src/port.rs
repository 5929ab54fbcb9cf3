//! Exclusive handle on the radio's serial channel.

use std::io;

use rfdlink_protocol::LinkCodec;
use tracing::trace;

use crate::channel::{ClearBuffer, PortSettings, SerialChannel, SerialPortChannel};
use crate::error::LinkResult;

/// Bytes requested from the channel per read.
const READ_BLOCK: usize = 1024;

/// The one handle onto the radio link.
///
/// `RadioPort` is deliberately neither `Clone` nor `Sync`. Image-subsystem
/// operations borrow it mutably and the receive loop takes it by value, so at
/// most one conversation uses the channel at a time.
///
/// Every read is served from an internal buffer so that line reads and raw
/// block reads can be interleaved without losing bytes.
pub struct RadioPort {
    channel: Box<dyn SerialChannel>,
    codec: LinkCodec,
}

impl RadioPort {
    /// Wrap a channel.
    pub fn new(channel: Box<dyn SerialChannel>) -> Self {
        RadioPort {
            channel,
            codec: LinkCodec::new(),
        }
    }

    /// Open a physical serial port.
    pub fn open(settings: &PortSettings) -> LinkResult<Self> {
        let channel = SerialPortChannel::open(settings)?;
        Ok(Self::new(Box::new(channel)))
    }

    /// Transport name, for logs.
    pub fn name(&self) -> String {
        self.channel.name()
    }

    /// Pull one block from the channel into the buffer.
    ///
    /// Returns the number of bytes received; 0 means the read timed out.
    fn fill(&mut self) -> io::Result<usize> {
        let mut block = [0u8; READ_BLOCK];
        let n = self.channel.read(&mut block)?;
        if n > 0 {
            trace!(bytes = n, "rx");
            self.codec.push(&block[..n]);
        }
        Ok(n)
    }

    /// Read one byte, or `None` if the link stayed idle for a read timeout.
    pub fn read_byte(&mut self) -> io::Result<Option<u8>> {
        if self.codec.buffered_len() == 0 && self.fill()? == 0 {
            return Ok(None);
        }
        Ok(self.codec.take_byte())
    }

    /// Read up to `n` bytes.
    ///
    /// Stops early when a read times out, so the result is shorter than `n`
    /// when the sender sent less (the final chunk of an image, or nothing).
    pub fn read_up_to(&mut self, n: usize) -> io::Result<Vec<u8>> {
        while self.codec.buffered_len() < n {
            if self.fill()? == 0 {
                break;
            }
        }
        Ok(self.codec.take(n))
    }

    /// Read one line, terminator stripped.
    ///
    /// If the link goes idle mid-line the partial line is returned. `None`
    /// means nothing at all arrived within a read timeout.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(line) = self.codec.decode_line() {
                return Ok(Some(line));
            }
            if self.fill()? == 0 {
                return Ok(self.codec.take_partial_line());
            }
        }
    }

    /// Write bytes to the link.
    pub fn write(&mut self, data: &[u8]) -> io::Result<()> {
        trace!(tx = %String::from_utf8_lossy(data), "tx");
        self.channel.write_all(data)
    }

    /// Discard everything received but not yet consumed.
    pub fn clear_input(&mut self) -> io::Result<()> {
        self.codec.clear();
        self.channel.clear(ClearBuffer::Input)
    }

    /// Discard everything written but not yet sent.
    pub fn clear_output(&mut self) -> io::Result<()> {
        self.channel.clear(ClearBuffer::Output)
    }

    /// Open a write handle for the command channel.
    pub(crate) fn writer(&self) -> io::Result<Box<dyn SerialChannel>> {
        self.channel.try_clone()
    }
}

impl std::fmt::Debug for RadioPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RadioPort")
            .field("channel", &self.channel.name())
            .field("buffered", &self.codec.buffered_len())
            .finish()
    }
}
