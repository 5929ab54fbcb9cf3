//! Classification of received downlink lines.

use crate::constants::TELEMETRY_PREFIX;
use crate::error::ProtocolError;
use crate::payload::PayloadMessage;
use crate::telemetry::TelemetryRecord;

/// A classified downlink line.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A balloon position report.
    Telemetry(TelemetryRecord),

    /// The payload echoed the outstanding command identifier.
    AcknowledgedIdentifier(String),

    /// Any other non-empty line.
    PlainText(String),

    /// A telemetry line that could not be parsed. Dropped by consumers.
    Malformed {
        /// The line as received.
        line: String,
        /// Why parsing failed.
        error: ProtocolError,
    },

    /// Nothing but whitespace. Dropped by consumers.
    Empty,
}

impl Frame {
    /// Classify one received line.
    ///
    /// `outstanding` is the identifier of the command currently awaiting its
    /// echo, if any. The rules apply in order: telemetry prefix, identifier
    /// echo, plain text, empty. This is a pure function of its inputs.
    pub fn classify(line: &str, outstanding: Option<&str>) -> Frame {
        let stripped = line.trim_end_matches(['\r', '\n']);

        if let Some(fields) = stripped.strip_prefix(TELEMETRY_PREFIX) {
            return match TelemetryRecord::parse_fields(fields) {
                Ok(record) => Frame::Telemetry(record),
                Err(error) => Frame::Malformed {
                    line: stripped.to_string(),
                    error,
                },
            };
        }

        if let Some(identifier) = outstanding.filter(|id| !id.is_empty()) {
            if stripped == identifier {
                return Frame::AcknowledgedIdentifier(identifier.to_string());
            }
        }

        if stripped.trim().is_empty() {
            Frame::Empty
        } else {
            Frame::PlainText(stripped.to_string())
        }
    }

    /// Split a plain-text line into its payload name and message.
    pub fn payload_message(&self) -> Option<PayloadMessage> {
        match self {
            Frame::PlainText(text) => PayloadMessage::parse(text),
            _ => None,
        }
    }

    /// Whether consumers should drop this frame without dispatching it.
    pub fn is_dropped(&self) -> bool {
        matches!(self, Frame::Malformed { .. } | Frame::Empty)
    }
}
