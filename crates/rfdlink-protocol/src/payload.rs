//! Free-text lines addressed by payload name.
//!
//! Payloads sharing the downlink prefix their messages with their name:
//! `<payload>;<message>`. A message made of exactly five comma-separated
//! fields is that payload's own position update.

use crate::constants::{PAYLOAD_POSITION_FIELD_COUNT, PAYLOAD_SEPARATOR};

/// A text line split into payload name and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadMessage {
    /// Name of the payload that sent the line.
    pub payload: String,
    /// Message text, line terminator removed.
    pub message: String,
}

impl PayloadMessage {
    /// Split a line on the payload separator.
    ///
    /// Returns `None` unless the line has exactly two non-empty-named parts.
    pub fn parse(line: &str) -> Option<PayloadMessage> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut parts = line.split(PAYLOAD_SEPARATOR);
        let payload = parts.next()?.trim();
        let message = parts.next()?;
        if parts.next().is_some() || payload.is_empty() {
            return None;
        }
        Some(PayloadMessage {
            payload: payload.to_string(),
            message: message.to_string(),
        })
    }

    /// Interpret the message as a position update, if it is one.
    pub fn position(&self) -> Option<PayloadPosition> {
        PayloadPosition::parse(&self.message)
    }
}

/// Position update reported by a secondary payload.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadPosition {
    /// Fix time as sent by the payload.
    pub time: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Altitude as sent by the payload.
    pub altitude: f64,
    /// Satellites in view.
    pub satellites: u32,
}

impl PayloadPosition {
    /// Parse `time,lat,lon,alt,sats`.
    pub fn parse(message: &str) -> Option<PayloadPosition> {
        let fields: Vec<&str> = message.split(',').map(str::trim).collect();
        if fields.len() != PAYLOAD_POSITION_FIELD_COUNT {
            return None;
        }
        Some(PayloadPosition {
            time: fields[0].to_string(),
            latitude: fields[1].parse().ok()?,
            longitude: fields[2].parse().ok()?,
            altitude: fields[3].parse().ok()?,
            satellites: fields[4].parse::<f64>().ok().map(|s| s as u32)?,
        })
    }
}
