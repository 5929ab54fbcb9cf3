//! Event interfaces between the link engine and its consumers.
//!
//! Two seams exist:
//! - [`EventSink`]: what the receive loop dispatches for every classified line
//! - [`ImageObserver`]: progress and terminal notices from image-subsystem
//!   operations

use std::error::Error;
use std::fmt;
use std::time::Duration;

use crossbeam_channel::Sender;
use rfdlink_protocol::{ImageOp, PayloadMessage, PictureSettings, TelemetryRecord};

use crate::image::SavedImage;

/// Result of a sink callback. Errors are logged by the receive loop and never
/// stop it.
pub type SinkResult = Result<(), Box<dyn Error + Send + Sync>>;

/// Consumer of the events produced by the receive loop.
pub trait EventSink: Send {
    /// A telemetry line was parsed.
    fn on_telemetry(&mut self, record: &TelemetryRecord) -> SinkResult;

    /// A plain-text line arrived.
    fn on_text(&mut self, line: &str) -> SinkResult;

    /// The outstanding command identifier was echoed.
    fn on_identifier_ack(&mut self, _identifier: &str) -> SinkResult {
        Ok(())
    }

    /// A plain-text line split into `payload;message`.
    fn on_payload(&mut self, _message: &PayloadMessage) -> SinkResult {
        Ok(())
    }
}

/// An event dispatched by the receive loop, in owned form.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Telemetry record.
    Telemetry(TelemetryRecord),
    /// Plain-text line.
    Text(String),
    /// Echoed command identifier.
    IdentifierAck(String),
    /// Payload-routed message.
    Payload(PayloadMessage),
}

impl EventSink for Sender<LinkEvent> {
    fn on_telemetry(&mut self, record: &TelemetryRecord) -> SinkResult {
        self.send(LinkEvent::Telemetry(*record))?;
        Ok(())
    }

    fn on_text(&mut self, line: &str) -> SinkResult {
        self.send(LinkEvent::Text(line.to_string()))?;
        Ok(())
    }

    fn on_identifier_ack(&mut self, identifier: &str) -> SinkResult {
        self.send(LinkEvent::IdentifierAck(identifier.to_string()))?;
        Ok(())
    }

    fn on_payload(&mut self, message: &PayloadMessage) -> SinkResult {
        self.send(LinkEvent::Payload(message.clone()))?;
        Ok(())
    }
}

// ============================================================================
// Image Subsystem Notices
// ============================================================================

/// A user-facing notice emitted during an image-subsystem operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// Still waiting for the request to be acknowledged (rate limited).
    WaitingForAck(ImageOp),
    /// The request was never acknowledged.
    NoAcknowledgment(ImageOp),
    /// The image will be saved under this file name.
    SavingAs(String),
    /// Declared total size of the image body.
    TotalSize(usize),
    /// The size line could not be parsed; progress uses a total of 1.
    SizeUnreadable(String),
    /// Bytes received so far.
    Position(usize),
    /// A chunk failed digest verification.
    ChecksumMismatch {
        /// Consecutive failures including this one.
        attempt: u32,
        /// Buffer length when the chunk arrived.
        position: usize,
        /// Chunk size requested for the next attempt.
        chunk_size: usize,
    },
    /// The resync sentinel was found.
    DesyncRecovered,
    /// The link went idle before the sentinel appeared.
    DesyncAbandoned,
    /// The chunked body ended.
    TransferComplete {
        /// Bytes received.
        bytes: usize,
        /// Whether an unverified chunk was kept.
        corrupted: bool,
        /// Time from request to completion.
        elapsed: Duration,
    },
    /// The requested name or the decode failed; saved under the fallback.
    SavedUnderFallback(String),
    /// No settings line arrived in time.
    SettingsTimeout,
    /// The camera accepted new settings.
    SettingsUpdated,
    /// The camera never confirmed the new settings.
    SettingsNotUpdated,
    /// The camera acknowledged a flip.
    Flipped(ImageOp),
    /// Clock reported by the payload computer next to the local clock.
    RemoteTime {
        /// Remote clock line as received.
        remote: String,
        /// Local clock when it was received.
        local: String,
    },
    /// Mean ping round trip.
    PingResult {
        /// Number of pings answered.
        pings: u32,
        /// Mean round-trip time.
        mean: Duration,
    },
    /// A ping went unanswered and the measurement was abandoned.
    PingLost(u32),
    /// An operation reached its end successfully.
    Finished(ImageOp),
    /// An operation ended with a connection or storage error.
    Failed {
        /// Operation that failed.
        op: ImageOp,
        /// Error description.
        reason: String,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::WaitingForAck(op) => write!(f, "Waiting for acknowledgment ({op})"),
            Notice::NoAcknowledgment(op) => {
                write!(f, "No acknowledgment received for {op}, connection error")
            }
            Notice::SavingAs(name) => write!(f, "Image will be saved as {name}"),
            Notice::TotalSize(size) => write!(f, "Total size: {size}"),
            Notice::SizeUnreadable(line) => write!(f, "Unreadable size line {line:?}"),
            Notice::Position(pos) => write!(f, "Current position: {pos}"),
            Notice::ChecksumMismatch {
                attempt,
                position,
                chunk_size,
            } => write!(
                f,
                "Checksum mismatch at {position} (attempt {attempt}), chunk size now {chunk_size}"
            ),
            Notice::DesyncRecovered => f.write_str("Stream resynchronized"),
            Notice::DesyncAbandoned => f.write_str("Resync abandoned, link idle"),
            Notice::TransferComplete {
                bytes,
                corrupted,
                elapsed,
            } => {
                write!(f, "Image transfer complete: {bytes} bytes in {:.1}s", elapsed.as_secs_f64())?;
                if *corrupted {
                    f.write_str(" (corrupted data accepted)")?;
                }
                Ok(())
            }
            Notice::SavedUnderFallback(name) => write!(f, "Saved under fallback name {name}"),
            Notice::SettingsTimeout => f.write_str("No settings received"),
            Notice::SettingsUpdated => f.write_str("Camera settings updated"),
            Notice::SettingsNotUpdated => f.write_str("Camera settings not updated"),
            Notice::Flipped(op) => write!(f, "Camera {op} done"),
            Notice::RemoteTime { remote, local } => {
                write!(f, "Payload time: {remote} / ground time: {local}")
            }
            Notice::PingResult { pings, mean } => write!(
                f,
                "Mean round trip over {pings} pings: {:.3}s",
                mean.as_secs_f64()
            ),
            Notice::PingLost(ping) => write!(f, "Ping {ping} lost, connection error"),
            Notice::Finished(op) => write!(f, "{op} finished"),
            Notice::Failed { op, reason } => write!(f, "{op} failed: {reason}"),
        }
    }
}

/// Consumer of image-subsystem progress. Every method defaults to a no-op.
pub trait ImageObserver {
    /// A notice for the operator.
    fn on_notice(&mut self, _notice: &Notice) {}

    /// Transfer progress in bytes.
    fn on_progress(&mut self, _received: usize, _total: usize) {}

    /// One line of an image listing.
    fn on_listing_entry(&mut self, _entry: &str) {}

    /// Settings reported by the camera.
    fn on_settings(&mut self, _settings: &PictureSettings) {}

    /// An image was written to disk.
    fn on_image_saved(&mut self, _image: &SavedImage) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl ImageObserver for NullObserver {}
