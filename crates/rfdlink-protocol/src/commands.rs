//! Frames the ground station transmits.
//!
//! Two kinds of uplink frame exist:
//! - [`CommandFrame`]: a free-form command addressed by an identifier that the
//!   payload echoes back as its acknowledgment
//! - [`ImageOp`]: a request to the camera payload, answered by a single ack byte

use crate::constants::*;
use crate::error::{ProtocolError, ProtocolResult};

/// A command and the identifier the payload must echo to acknowledge it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    identifier: String,
    body: String,
}

impl CommandFrame {
    /// Build a command frame.
    ///
    /// The identifier must be non-empty and free of the `?` and `!` framing
    /// characters; the body must be non-empty and free of `!`.
    pub fn new(identifier: impl Into<String>, body: impl Into<String>) -> ProtocolResult<Self> {
        let identifier = identifier.into();
        let body = body.into();

        let framing = [COMMAND_SEPARATOR as char, FRAME_TERMINATOR as char];
        if identifier.trim().is_empty()
            || identifier.contains(framing)
            || identifier.contains(['\r', '\n'])
        {
            return Err(ProtocolError::InvalidIdentifier(identifier));
        }
        if body.is_empty() || body.contains(FRAME_TERMINATOR as char) {
            return Err(ProtocolError::InvalidCommand(body));
        }

        Ok(CommandFrame { identifier, body })
    }

    /// The identifier to be echoed.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The command body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Encode as `<identifier>?<command>!`.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.identifier.len() + self.body.len() + 2);
        buf.extend_from_slice(self.identifier.as_bytes());
        buf.push(COMMAND_SEPARATOR);
        buf.extend_from_slice(self.body.as_bytes());
        buf.push(FRAME_TERMINATOR);
        buf
    }
}

/// Image-subsystem operations understood by the camera payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageOp {
    /// Flip the camera image vertically.
    FlipVertical,
    /// Send the most recently captured image.
    MostRecentImage,
    /// Send the list of stored images.
    ListImages,
    /// Send a specific stored image.
    NamedImage,
    /// Report the current picture settings.
    QuerySettings,
    /// Accept new picture settings.
    PushSettings,
    /// Run the ping round-trip test.
    PingTest,
    /// Dump the payload computer's runtime data.
    RuntimeData,
    /// Report the payload clock ahead of a ping test.
    TimeSync,
    /// Flip the camera image horizontally.
    FlipHorizontal,
    /// Report the status of attached serial devices.
    DeviceStatus,
}

impl ImageOp {
    /// All operations, in code order.
    pub const ALL: [ImageOp; 11] = [
        ImageOp::FlipVertical,
        ImageOp::MostRecentImage,
        ImageOp::ListImages,
        ImageOp::NamedImage,
        ImageOp::QuerySettings,
        ImageOp::PushSettings,
        ImageOp::PingTest,
        ImageOp::RuntimeData,
        ImageOp::TimeSync,
        ImageOp::FlipHorizontal,
        ImageOp::DeviceStatus,
    ];

    /// Get the operation code sent on the wire.
    pub fn code(&self) -> char {
        match self {
            ImageOp::FlipVertical => '0',
            ImageOp::MostRecentImage => '1',
            ImageOp::ListImages => '2',
            ImageOp::NamedImage => '3',
            ImageOp::QuerySettings => '4',
            ImageOp::PushSettings => '5',
            ImageOp::PingTest => '6',
            ImageOp::RuntimeData => '7',
            ImageOp::TimeSync => '8',
            ImageOp::FlipHorizontal => '9',
            ImageOp::DeviceStatus => '-',
        }
    }

    /// Look an operation up by its wire code.
    pub fn from_code(code: char) -> Option<ImageOp> {
        ImageOp::ALL.into_iter().find(|op| op.code() == code)
    }

    /// Human-readable operation name.
    pub fn name(&self) -> &'static str {
        match self {
            ImageOp::FlipVertical => "flip-vertical",
            ImageOp::MostRecentImage => "most-recent-image",
            ImageOp::ListImages => "list-images",
            ImageOp::NamedImage => "named-image",
            ImageOp::QuerySettings => "query-settings",
            ImageOp::PushSettings => "push-settings",
            ImageOp::PingTest => "ping-test",
            ImageOp::RuntimeData => "runtime-data",
            ImageOp::TimeSync => "time-sync",
            ImageOp::FlipHorizontal => "flip-horizontal",
            ImageOp::DeviceStatus => "device-status",
        }
    }

    /// Encode the request as `IMAGE;<code>!`.
    pub fn encode(&self) -> Vec<u8> {
        format!("{};{}{}", IMAGE_PAYLOAD, self.code(), FRAME_TERMINATOR as char).into_bytes()
    }
}

impl std::fmt::Display for ImageOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_frame_encoding() {
        let frame = CommandFrame::new("X1", "PING").unwrap();
        assert_eq!(frame.encode(), b"X1?PING!");
        assert_eq!(frame.identifier(), "X1");
        assert_eq!(frame.body(), "PING");
    }

    #[test]
    fn test_command_frame_rejects_empty_parts() {
        assert!(matches!(
            CommandFrame::new("", "PING"),
            Err(ProtocolError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            CommandFrame::new("X1", ""),
            Err(ProtocolError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_command_frame_rejects_framing_characters() {
        assert!(CommandFrame::new("X?1", "PING").is_err());
        assert!(CommandFrame::new("X!1", "PING").is_err());
        assert!(CommandFrame::new("X1", "PI!NG").is_err());
        // The body may carry the separator; only the first one splits.
        assert!(CommandFrame::new("X1", "set?a").is_ok());
    }

    #[test]
    fn test_image_op_encoding() {
        assert_eq!(ImageOp::MostRecentImage.encode(), b"IMAGE;1!");
        assert_eq!(ImageOp::FlipVertical.encode(), b"IMAGE;0!");
        assert_eq!(ImageOp::FlipHorizontal.encode(), b"IMAGE;9!");
        assert_eq!(ImageOp::DeviceStatus.encode(), b"IMAGE;-!");
    }

    #[test]
    fn test_image_op_codes_are_unique() {
        for op in ImageOp::ALL {
            assert_eq!(ImageOp::from_code(op.code()), Some(op));
        }
        assert_eq!(ImageOp::from_code('x'), None);
    }
}
