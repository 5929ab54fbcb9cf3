//! Error types for the link protocol.

use thiserror::Error;

/// Errors that can occur when building or parsing link protocol frames.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    /// Command identifier is empty or contains a framing character.
    #[error("invalid command identifier {0:?}")]
    InvalidIdentifier(String),

    /// Command body is empty or contains the frame terminator.
    #[error("invalid command body {0:?}")]
    InvalidCommand(String),

    /// Telemetry line did not split into the expected number of fields.
    #[error("telemetry line has {actual} fields, expected {expected}")]
    TelemetryFieldCount {
        /// Fields required by the format.
        expected: usize,
        /// Fields found on the line.
        actual: usize,
    },

    /// A telemetry field could not be parsed as a number.
    #[error("telemetry field {field} is not numeric: {value:?}")]
    TelemetryField {
        /// Name of the offending field.
        field: &'static str,
        /// Raw field text.
        value: String,
    },

    /// Settings line did not contain 7 integer fields.
    #[error("malformed settings line: {0:?}")]
    MalformedSettings(String),

    /// Digest was not 32 hex characters.
    #[error("malformed digest: expected {expected} bytes, got {actual}")]
    MalformedDigest {
        /// Required digest length.
        expected: usize,
        /// Bytes received.
        actual: usize,
    },
}

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
