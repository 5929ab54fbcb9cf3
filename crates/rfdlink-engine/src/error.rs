//! Error types for the link engine.

use std::path::PathBuf;
use std::time::Duration;

use rfdlink_protocol::{ImageOp, ProtocolError};
use thiserror::Error;

/// Errors that end a link operation.
///
/// Digest mismatches and stream desynchronization are recovered inside the
/// transfer session and never surface here; they are reported through
/// [`ImageObserver`](crate::ImageObserver) notices instead.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Serial transport failure.
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Opening or configuring the serial port failed.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Frame could not be built.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The camera never acknowledged a request before the deadline.
    #[error("no acknowledgment for {op} after {waited:?}")]
    NoAcknowledgment {
        /// Operation that went unanswered.
        op: ImageOp,
        /// How long the request was retried.
        waited: Duration,
    },

    /// No well-formed settings line arrived before the deadline.
    #[error("no settings received within {0:?}")]
    SettingsTimeout(Duration),

    /// A ping went unanswered.
    #[error("ping {ping} not answered within {deadline:?}")]
    PingTimeout {
        /// 1-based index of the ping.
        ping: u32,
        /// Per-ping deadline.
        deadline: Duration,
    },

    /// A line-oriented body did not finish before the deadline.
    #[error("{op} body incomplete after {waited:?}")]
    BodyTimeout {
        /// Operation whose body was being read.
        op: ImageOp,
        /// Time spent reading.
        waited: Duration,
    },

    /// The transfer went idle before a single chunk arrived.
    #[error("no image data received")]
    NoData,

    /// Neither the requested nor the fallback image file could be written.
    #[error("failed to save image to {path}: {source}")]
    Persistence {
        /// Last path attempted.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// The receive loop is no longer running.
    #[error("receive loop stopped")]
    ListenerStopped,

    /// The receive loop thread panicked; the port is lost.
    #[error("receive loop thread panicked")]
    ListenerPanicked,
}

/// Result type alias for link operations.
pub type LinkResult<T> = Result<T, LinkError>;
