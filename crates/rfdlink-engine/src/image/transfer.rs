//! Chunked, digest-verified image transfer.
//!
//! After the request is acknowledged the sender announces the body size on
//! one line, then sends the body as a series of chunks. Each chunk is preceded
//! by the 32-character hex MD5 of its body:
//!
//! ```text
//! <size>\n <digest><chunk> <digest><chunk> ... <digest><short chunk>
//! ```
//!
//! Every chunk is answered with `Y` (accepted) or `N` (rejected). A rejection
//! shrinks the chunk size and realigns the stream through [`resync`]. Chunks
//! are multiples of 1000 bytes except the last, so a short chunk ends the
//! transfer. After too many consecutive rejections the last chunk is kept
//! unverified and the transfer ends as corrupted rather than failed.

use std::time::{Duration, Instant};

use rfdlink_protocol::{
    ChunkDigest, ImageOp, CHUNK_ACK, CHUNK_GRANULARITY, CHUNK_NAK, DIGEST_LEN,
};
use tracing::{debug, info, warn};

use crate::config::ImageConfig;
use crate::error::{LinkError, LinkResult};
use crate::events::{ImageObserver, Notice};
use crate::image::handshake;
use crate::image::resync::{resync, ResyncOutcome};
use crate::port::RadioPort;

/// Where a transfer session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// Nothing sent yet.
    Requesting,
    /// Request written, waiting for the ack byte.
    AwaitingAck,
    /// Acknowledged, waiting for the size line.
    AwaitingSize,
    /// Receiving a chunk.
    ReceivingChunk {
        /// Zero-based index among accepted chunks.
        index: u32,
        /// Consecutive attempts at this chunk, starting at 1.
        attempt: u32,
        /// Bytes requested for this chunk.
        chunk_size: usize,
    },
    /// Realigning after a rejected chunk.
    Resyncing,
    /// The body ended.
    Completed {
        /// Whether an unverified chunk was kept.
        corrupted: bool,
    },
    /// The session ended without a body.
    Failed,
}

impl TransferState {
    /// Whether the session is over.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferState::Completed { .. } | TransferState::Failed)
    }
}

/// One received chunk and its verification.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Chunk body.
    pub body: Vec<u8>,
    /// Digest bytes as received.
    pub received: Vec<u8>,
    /// Digest computed over the body.
    pub computed: ChunkDigest,
}

impl Chunk {
    /// Pair a body with the digest received for it.
    pub fn new(body: Vec<u8>, received: Vec<u8>) -> Self {
        let computed = ChunkDigest::compute(&body);
        Chunk {
            body,
            received,
            computed,
        }
    }

    /// Whether the received digest matches the body.
    pub fn is_valid(&self) -> bool {
        self.computed.matches(&self.received)
    }
}

/// Outcome of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    /// Received body, still base64 text.
    pub data: Vec<u8>,
    /// Whether an unverified chunk was kept.
    pub corrupted: bool,
    /// Size announced by the sender, if it parsed.
    pub declared_size: Option<usize>,
    /// Chunks accepted, including a salvaged one.
    pub chunks: u32,
    /// Digest mismatches over the whole transfer.
    pub total_failures: u32,
    /// Resyncs performed.
    pub resyncs: u32,
    /// Time from the request to the end of the body.
    pub elapsed: Duration,
}

/// One run of the chunked transfer protocol.
///
/// A session is used once; the next transfer starts from a new session and
/// hence from the configured chunk size again.
#[derive(Debug)]
pub struct TransferSession {
    config: ImageConfig,
    state: TransferState,
    started: Instant,
    chunk_size: usize,
    buffer: Vec<u8>,
    declared_size: Option<usize>,
    total: usize,
    progress: usize,
    chunks: u32,
    consecutive_failures: u32,
    total_failures: u32,
    resyncs: u32,
}

impl TransferSession {
    /// Start a session.
    pub fn new(config: &ImageConfig) -> Self {
        TransferSession {
            config: config.clone(),
            state: TransferState::Requesting,
            started: Instant::now(),
            chunk_size: config.chunk_size,
            buffer: Vec::new(),
            declared_size: None,
            total: 1,
            progress: 0,
            chunks: 0,
            consecutive_failures: 0,
            total_failures: 0,
            resyncs: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Chunk size the next chunk will be read with.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Bytes received so far.
    pub fn received(&self) -> usize {
        self.buffer.len()
    }

    /// Send the request for `op` and wait for the ack.
    pub fn request(
        &mut self,
        port: &mut RadioPort,
        observer: &mut dyn ImageObserver,
        op: ImageOp,
    ) -> LinkResult<()> {
        self.state = TransferState::AwaitingAck;
        let result = handshake::request(
            port,
            observer,
            op,
            self.config.ack_deadline(),
            self.config.notice_interval(),
        );
        match result {
            Ok(_) => {
                self.state = TransferState::AwaitingSize;
                Ok(())
            }
            Err(e) => {
                self.state = TransferState::Failed;
                Err(e)
            }
        }
    }

    /// Receive the size line and the chunked body.
    pub fn receive_body(
        &mut self,
        port: &mut RadioPort,
        observer: &mut dyn ImageObserver,
    ) -> LinkResult<TransferReport> {
        if self.state.is_terminal() {
            return Err(LinkError::NoData);
        }
        self.state = TransferState::AwaitingSize;
        let result = self.read_size(port, observer).and_then(|_| self.read_chunks(port, observer));
        if result.is_err() {
            self.state = TransferState::Failed;
        }
        result
    }

    fn read_size(&mut self, port: &mut RadioPort, observer: &mut dyn ImageObserver) -> LinkResult<()> {
        let line = port.read_line()?.unwrap_or_default();
        match line.trim().parse::<usize>() {
            Ok(size) => {
                debug!(size, "declared size");
                self.declared_size = Some(size);
                self.total = size.max(1);
                observer.on_notice(&Notice::TotalSize(size));
            }
            Err(_) => {
                warn!(line = %line, "unreadable size line");
                self.total = 1;
                observer.on_notice(&Notice::SizeUnreadable(line));
            }
        }
        Ok(())
    }

    fn read_chunks(
        &mut self,
        port: &mut RadioPort,
        observer: &mut dyn ImageObserver,
    ) -> LinkResult<TransferReport> {
        loop {
            self.state = TransferState::ReceivingChunk {
                index: self.chunks,
                attempt: self.consecutive_failures + 1,
                chunk_size: self.chunk_size,
            };

            // The digest comes first so that a short final chunk cannot
            // shift the next digest read.
            let digest = port.read_up_to(DIGEST_LEN)?;
            if digest.is_empty() {
                if self.buffer.is_empty() {
                    warn!("link idle before any image data");
                    return Err(LinkError::NoData);
                }
                // A rejected chunk that was never resent leaves a gap.
                return Ok(self.complete(observer, self.consecutive_failures > 0));
            }

            let body = port.read_up_to(self.chunk_size)?;
            let chunk = Chunk::new(body, digest);

            if chunk.is_valid() {
                port.write(&[CHUNK_ACK])?;
                self.accept(observer, chunk);
                if self.buffer.len() % CHUNK_GRANULARITY != 0 {
                    return Ok(self.complete(observer, false));
                }
                continue;
            }

            port.write(&[CHUNK_NAK])?;
            self.consecutive_failures += 1;
            self.total_failures += 1;
            self.chunk_size = self.config.shrink(self.chunk_size);
            warn!(
                attempt = self.consecutive_failures,
                position = self.buffer.len(),
                chunk_size = self.chunk_size,
                "checksum mismatch"
            );
            observer.on_notice(&Notice::ChecksumMismatch {
                attempt: self.consecutive_failures,
                position: self.buffer.len(),
                chunk_size: self.chunk_size,
            });

            self.state = TransferState::Resyncing;
            self.resyncs += 1;
            match resync(port)? {
                ResyncOutcome::Recovered => observer.on_notice(&Notice::DesyncRecovered),
                ResyncOutcome::Abandoned => observer.on_notice(&Notice::DesyncAbandoned),
            }

            if self.consecutive_failures >= self.config.max_consecutive_failures {
                warn!(
                    failures = self.consecutive_failures,
                    "too many consecutive mismatches, keeping unverified chunk"
                );
                self.buffer.extend_from_slice(&chunk.body);
                self.chunks += 1;
                return Ok(self.complete(observer, true));
            }
        }
    }

    fn accept(&mut self, observer: &mut dyn ImageObserver, chunk: Chunk) {
        self.buffer.extend_from_slice(&chunk.body);
        self.chunks += 1;
        self.consecutive_failures = 0;
        self.progress = (self.progress + self.chunk_size).min(self.total);
        debug!(
            chunk = self.chunks,
            bytes = chunk.body.len(),
            position = self.buffer.len(),
            "chunk accepted"
        );
        observer.on_notice(&Notice::Position(self.buffer.len()));
        observer.on_progress(self.progress, self.total);
    }

    fn complete(&mut self, observer: &mut dyn ImageObserver, corrupted: bool) -> TransferReport {
        self.state = TransferState::Completed { corrupted };
        let elapsed = self.started.elapsed();
        info!(
            bytes = self.buffer.len(),
            corrupted,
            failures = self.total_failures,
            elapsed_ms = elapsed.as_millis() as u64,
            "image transfer complete"
        );
        observer.on_notice(&Notice::TransferComplete {
            bytes: self.buffer.len(),
            corrupted,
            elapsed,
        });
        TransferReport {
            data: std::mem::take(&mut self.buffer),
            corrupted,
            declared_size: self.declared_size,
            chunks: self.chunks,
            total_failures: self.total_failures,
            resyncs: self.resyncs,
            elapsed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingObserver, ScriptedChannel};

    fn framed(body: &[u8]) -> Vec<u8> {
        let mut out = ChunkDigest::compute(body).as_bytes().to_vec();
        out.extend_from_slice(body);
        out
    }

    fn session(chunk_size: usize) -> TransferSession {
        TransferSession::new(&ImageConfig::default().with_chunk_size(chunk_size))
    }

    #[test]
    fn test_short_final_chunk_keeps_alignment() {
        let first: Vec<u8> = (0..1000).map(|i| b'a' + (i % 26) as u8).collect();
        let last = vec![b'z'; 237];

        let channel = ScriptedChannel::new();
        channel.push_inbound(b"1237\n");
        channel.push_inbound(&framed(&first));
        channel.push_inbound(&framed(&last));
        let mut port = RadioPort::new(Box::new(channel.clone()));
        let mut observer = RecordingObserver::new();

        let mut session = session(1000);
        let report = session.receive_body(&mut port, &mut observer).unwrap();

        assert_eq!(report.data.len(), 1237);
        assert_eq!(&report.data[..1000], first.as_slice());
        assert_eq!(&report.data[1000..], last.as_slice());
        assert!(!report.corrupted);
        assert_eq!(report.chunks, 2);
        assert_eq!(report.declared_size, Some(1237));
        // A short final chunk still advances by the full chunk size, capped.
        assert_eq!(observer.progress, vec![(1000, 1237), (1237, 1237)]);
        assert_eq!(channel.written(), b"YY".to_vec());
        assert_eq!(session.state(), TransferState::Completed { corrupted: false });
    }

    #[test]
    fn test_body_on_exact_boundary_ends_when_idle() {
        let channel = ScriptedChannel::new();
        channel.push_inbound(b"2000\n");
        channel.push_inbound(&framed(&[b'q'; 1000]));
        channel.push_inbound(&framed(&[b'r'; 1000]));
        let mut port = RadioPort::new(Box::new(channel));
        let mut observer = RecordingObserver::new();

        let report = session(1000).receive_body(&mut port, &mut observer).unwrap();
        assert_eq!(report.data.len(), 2000);
        assert!(!report.corrupted);
        assert_eq!(observer.progress, vec![(1000, 2000), (2000, 2000)]);
    }

    #[test]
    fn test_unreadable_size_defaults_total() {
        let channel = ScriptedChannel::new();
        channel.push_inbound(b"size?\n");
        channel.push_inbound(&framed(b"short"));
        let mut port = RadioPort::new(Box::new(channel));
        let mut observer = RecordingObserver::new();

        let report = session(7000).receive_body(&mut port, &mut observer).unwrap();
        assert_eq!(report.data, b"short".to_vec());
        assert_eq!(report.declared_size, None);
        assert_eq!(observer.notices[0], Notice::SizeUnreadable("size?".to_string()));
        assert_eq!(observer.progress, vec![(1, 1)]);
    }

    #[test]
    fn test_mismatch_shrinks_and_resyncs() {
        let channel = ScriptedChannel::new();
        channel.push_inbound(b"500\n");
        // Digest of something else, and no sentinel afterwards.
        channel.push_inbound(ChunkDigest::compute(b"other").as_bytes());
        channel.push_inbound(b"body bytes that do not match");
        let mut port = RadioPort::new(Box::new(channel.clone()));
        let mut observer = RecordingObserver::new();

        let mut session = session(7000);
        let err = session.receive_body(&mut port, &mut observer).unwrap_err();

        // Nothing was accepted before the link went idle.
        assert!(matches!(err, LinkError::NoData));
        assert_eq!(session.state(), TransferState::Failed);
        assert_eq!(session.chunk_size(), 6000);
        assert_eq!(channel.written(), b"NS".to_vec());
        assert!(observer.notices.contains(&Notice::DesyncAbandoned));
    }

    #[test]
    fn test_mismatch_never_grows_small_chunk() {
        let channel = ScriptedChannel::new();
        channel.push_inbound(b"500\n");
        channel.push_inbound(ChunkDigest::compute(b"other").as_bytes());
        channel.push_inbound(&[b'x'; 500]);
        let mut port = RadioPort::new(Box::new(channel.clone()));
        let mut observer = RecordingObserver::new();

        let mut session = session(500);
        assert!(session.receive_body(&mut port, &mut observer).is_err());

        assert_eq!(session.chunk_size(), 500);
        assert!(observer.notices.contains(&Notice::ChecksumMismatch {
            attempt: 1,
            position: 0,
            chunk_size: 500,
        }));
    }

    #[test]
    fn test_idle_link_fails_with_no_data() {
        let channel = ScriptedChannel::new();
        let mut port = RadioPort::new(Box::new(channel));
        let mut observer = RecordingObserver::new();

        let mut session = session(7000);
        assert!(matches!(
            session.receive_body(&mut port, &mut observer),
            Err(LinkError::NoData)
        ));
        assert_eq!(session.state(), TransferState::Failed);
    }

    #[test]
    fn test_chunk_validity() {
        let good = Chunk::new(b"abc".to_vec(), ChunkDigest::compute(b"abc").as_bytes().to_vec());
        assert!(good.is_valid());
        let truncated = Chunk::new(b"abc".to_vec(), good.received[..16].to_vec());
        assert!(!truncated.is_valid());
    }
}
