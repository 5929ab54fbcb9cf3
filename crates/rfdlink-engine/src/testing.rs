//! In-memory transport for exercising the link without a radio.
//!
//! [`ScriptedChannel`] stands in for the serial port. Tests either preload the
//! bytes the remote end "sends", or install a responder closure that plays
//! the remote end: it sees every write and returns the bytes to send back.
//! Responder output is held in flight until the next read begins, the way a
//! radio delays replies, so an input flush issued right after a write does not
//! wipe the reply.

use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rfdlink_protocol::{PayloadMessage, PictureSettings, TelemetryRecord};

use crate::channel::{ClearBuffer, SerialChannel};
use crate::events::{EventSink, ImageObserver, LinkEvent, Notice, SinkResult};
use crate::image::SavedImage;

/// Remote-end behaviour: sees each write, returns the reply.
pub type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

#[derive(Default)]
struct ScriptState {
    inbound: VecDeque<u8>,
    in_flight: VecDeque<u8>,
    written: Vec<u8>,
    writes: Vec<Vec<u8>>,
    clears: Vec<ClearBuffer>,
    responder: Option<Responder>,
}

/// A scripted, in-memory [`SerialChannel`].
///
/// Clones share the same state, so a test keeps one clone for inspection
/// while the link owns another.
#[derive(Clone)]
pub struct ScriptedChannel {
    state: Arc<Mutex<ScriptState>>,
    idle_delay: Duration,
}

impl Default for ScriptedChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedChannel {
    /// Create a channel with nothing to read and no responder.
    pub fn new() -> Self {
        ScriptedChannel {
            state: Arc::new(Mutex::new(ScriptState::default())),
            idle_delay: Duration::ZERO,
        }
    }

    /// Create a channel whose remote end is played by `responder`.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        let channel = Self::new();
        channel.state.lock().responder = Some(Box::new(responder));
        channel
    }

    /// Simulated read timeout: how long an idle read blocks before returning 0.
    pub fn with_idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    /// Make bytes available to read immediately.
    pub fn push_inbound(&self, data: &[u8]) {
        self.state.lock().inbound.extend(data.iter().copied());
    }

    /// Everything written so far, concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    /// Everything written so far, one entry per write call.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().writes.clone()
    }

    /// Number of write calls whose bytes equal `data`.
    pub fn count_writes(&self, data: &[u8]) -> usize {
        self.state
            .lock()
            .writes
            .iter()
            .filter(|w| w.as_slice() == data)
            .count()
    }

    /// Buffer clears requested so far, in order.
    pub fn clears(&self) -> Vec<ClearBuffer> {
        self.state.lock().clears.clone()
    }

    /// Bytes not yet read.
    pub fn pending_len(&self) -> usize {
        let state = self.state.lock();
        state.inbound.len() + state.in_flight.len()
    }
}

impl SerialChannel for ScriptedChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = {
            let mut state = self.state.lock();
            let arrived: Vec<u8> = state.in_flight.drain(..).collect();
            state.inbound.extend(arrived);

            let n = buf.len().min(state.inbound.len());
            for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
                *slot = byte;
            }
            n
        };

        if n == 0 && !self.idle_delay.is_zero() {
            std::thread::sleep(self.idle_delay);
        }
        Ok(n)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock();
        state.written.extend_from_slice(data);
        state.writes.push(data.to_vec());
        if let Some(responder) = state.responder.as_mut() {
            let reply = responder(data);
            state.in_flight.extend(reply);
        }
        Ok(())
    }

    fn clear(&mut self, buffer: ClearBuffer) -> io::Result<()> {
        let mut state = self.state.lock();
        if buffer == ClearBuffer::Input {
            state.inbound.clear();
        }
        state.clears.push(buffer);
        Ok(())
    }

    fn try_clone(&self) -> io::Result<Box<dyn SerialChannel>> {
        Ok(Box::new(self.clone()))
    }

    fn name(&self) -> String {
        "scripted".to_string()
    }
}

/// [`EventSink`] that records every dispatched event.
#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<LinkEvent>>>,
}

impl RecordingSink {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far.
    pub fn events(&self) -> Vec<LinkEvent> {
        self.events.lock().clone()
    }
}

impl EventSink for RecordingSink {
    fn on_telemetry(&mut self, record: &TelemetryRecord) -> SinkResult {
        self.events.lock().push(LinkEvent::Telemetry(*record));
        Ok(())
    }

    fn on_text(&mut self, line: &str) -> SinkResult {
        self.events.lock().push(LinkEvent::Text(line.to_string()));
        Ok(())
    }

    fn on_identifier_ack(&mut self, identifier: &str) -> SinkResult {
        self.events
            .lock()
            .push(LinkEvent::IdentifierAck(identifier.to_string()));
        Ok(())
    }

    fn on_payload(&mut self, message: &PayloadMessage) -> SinkResult {
        self.events.lock().push(LinkEvent::Payload(message.clone()));
        Ok(())
    }
}

/// [`ImageObserver`] that records everything it is told.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    /// Notices, in order.
    pub notices: Vec<Notice>,
    /// Progress updates as `(received, total)`.
    pub progress: Vec<(usize, usize)>,
    /// Listing entries.
    pub listing: Vec<String>,
    /// Settings reports.
    pub settings: Vec<PictureSettings>,
    /// Saved images.
    pub saved: Vec<SavedImage>,
}

impl RecordingObserver {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths of saved images.
    pub fn saved_paths(&self) -> Vec<PathBuf> {
        self.saved.iter().map(|s| s.path.clone()).collect()
    }

    /// Number of notices matching a predicate.
    pub fn count_notices(&self, pred: impl Fn(&Notice) -> bool) -> usize {
        self.notices.iter().filter(|n| pred(n)).count()
    }
}

impl ImageObserver for RecordingObserver {
    fn on_notice(&mut self, notice: &Notice) {
        self.notices.push(notice.clone());
    }

    fn on_progress(&mut self, received: usize, total: usize) {
        self.progress.push((received, total));
    }

    fn on_listing_entry(&mut self, entry: &str) {
        self.listing.push(entry.to_string());
    }

    fn on_settings(&mut self, settings: &PictureSettings) {
        self.settings.push(*settings);
    }

    fn on_image_saved(&mut self, image: &SavedImage) {
        self.saved.push(image.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_responder_reply_arrives_on_next_read() {
        let mut channel = ScriptedChannel::with_responder(|data| {
            if data == b"ping" {
                b"pong".to_vec()
            } else {
                Vec::new()
            }
        });

        channel.write_all(b"ping").unwrap();
        assert_eq!(channel.pending_len(), 4);

        // A flush between the write and the read leaves the reply in flight.
        channel.clear(ClearBuffer::Input).unwrap();

        let mut buf = [0u8; 8];
        let n = channel.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"pong");
        assert_eq!(channel.count_writes(b"ping"), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let channel = ScriptedChannel::new();
        let mut other = channel.try_clone().unwrap();
        other.write_all(b"abc").unwrap();
        assert_eq!(channel.written(), b"abc".to_vec());
    }
}
