//! Receive-side byte buffer shared by line reads and raw block reads.
//!
//! The downlink interleaves newline-terminated text with raw binary blocks
//! (chunk digests and chunk bodies). Both kinds of read are served from one
//! buffer so that bytes pulled off the serial port in large blocks are never
//! lost when the caller switches from reading lines to reading raw bytes.

use bytes::{Buf, BytesMut};

/// Initial receive buffer capacity.
pub const RX_BUFFER_CAPACITY: usize = 8 * 1024;

/// A codec accumulating received bytes and handing out lines or blocks.
///
/// Lines are terminated by `\n`; the terminator and any `\r` directly in
/// front of it are stripped. A bare `\r` line is preserved as `"\r"` because
/// the runtime-data dump uses it as its end marker.
#[derive(Debug, Default)]
pub struct LinkCodec {
    /// Buffer for accumulating incoming data.
    buffer: BytesMut,
}

impl LinkCodec {
    /// Create a new codec.
    pub fn new() -> Self {
        LinkCodec {
            buffer: BytesMut::with_capacity(RX_BUFFER_CAPACITY),
        }
    }

    /// Add received data to the buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode a complete line from the buffer.
    ///
    /// Returns `None` if no terminator has been received yet.
    pub fn decode_line(&mut self) -> Option<String> {
        let end = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut line = self.buffer.split_to(end);
        self.buffer.advance(1);

        if line.len() > 1 && line.ends_with(b"\r") {
            line.truncate(line.len() - 1);
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Take whatever is buffered as an unterminated line.
    ///
    /// Used when the transport goes idle in the middle of a line. Returns
    /// `None` if the buffer is empty.
    pub fn take_partial_line(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = self.buffer.split();
        log::trace!("partial line of {} bytes", line.len());
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Take up to `n` raw bytes from the front of the buffer.
    pub fn take(&mut self, n: usize) -> Vec<u8> {
        let n = n.min(self.buffer.len());
        self.buffer.split_to(n).to_vec()
    }

    /// Take a single raw byte.
    pub fn take_byte(&mut self) -> Option<u8> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer.get_u8())
        }
    }

    /// Whether a complete line is buffered.
    pub fn has_line(&self) -> bool {
        self.buffer.contains(&b'\n')
    }

    /// Get the number of buffered bytes.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Get the current buffer contents as a string (for debugging).
    pub fn buffer_as_str(&self) -> String {
        String::from_utf8_lossy(&self.buffer).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_line() {
        let mut codec = LinkCodec::new();
        codec.push(b"line1\r\nline2\n");

        assert_eq!(codec.decode_line(), Some("line1".to_string()));
        assert_eq!(codec.decode_line(), Some("line2".to_string()));
        assert!(codec.decode_line().is_none());
    }

    #[test]
    fn test_partial_line_waits_for_terminator() {
        let mut codec = LinkCodec::new();
        codec.push(b"GPS,12,");
        assert!(codec.decode_line().is_none());

        codec.push(b"34\n");
        assert_eq!(codec.decode_line(), Some("GPS,12,34".to_string()));
    }

    #[test]
    fn test_bare_carriage_return_line_is_kept() {
        let mut codec = LinkCodec::new();
        codec.push(b"uptime 42\n\r\n");

        assert_eq!(codec.decode_line(), Some("uptime 42".to_string()));
        assert_eq!(codec.decode_line(), Some("\r".to_string()));
    }

    #[test]
    fn test_empty_lines_are_returned() {
        let mut codec = LinkCodec::new();
        codec.push(b"\n");
        assert_eq!(codec.decode_line(), Some(String::new()));
    }

    #[test]
    fn test_line_then_raw_block() {
        let mut codec = LinkCodec::new();
        codec.push(b"3000\nABCDEFG");

        assert_eq!(codec.decode_line(), Some("3000".to_string()));
        assert_eq!(codec.take(4), b"ABCD".to_vec());
        assert_eq!(codec.take_byte(), Some(b'E'));
        assert_eq!(codec.take(10), b"FG".to_vec());
        assert_eq!(codec.buffered_len(), 0);
    }

    #[test]
    fn test_take_partial_line() {
        let mut codec = LinkCodec::new();
        assert!(codec.take_partial_line().is_none());

        codec.push(b"X1");
        assert!(!codec.has_line());
        assert_eq!(codec.take_partial_line(), Some("X1".to_string()));
        assert_eq!(codec.buffered_len(), 0);
    }
}
