//! Reserved bytes and fixed strings of the link wire grammar.

// ============================================================================
// Command Channel
// ============================================================================

/// Separator between the identifier and the command body.
pub const COMMAND_SEPARATOR: u8 = b'?';

/// Terminator of every command and image-subsystem request.
pub const FRAME_TERMINATOR: u8 = b'!';

// ============================================================================
// Downlink Lines
// ============================================================================

/// Prefix of a telemetry line, including the separator after the tag.
pub const TELEMETRY_PREFIX: &str = "GPS,";

/// Number of comma-separated fields in a telemetry line.
pub const TELEMETRY_FIELD_COUNT: usize = 7;

/// Separator between the payload name and its message in a text line.
pub const PAYLOAD_SEPARATOR: char = ';';

/// Number of comma-separated fields in a payload position update.
pub const PAYLOAD_POSITION_FIELD_COUNT: usize = 5;

/// Meters to feet.
pub const FEET_PER_METER: f64 = 3.2808;

// ============================================================================
// Image Subsystem
// ============================================================================

/// Payload name the camera answers to.
pub const IMAGE_PAYLOAD: &str = "IMAGE";

/// Acknowledgment of an image-subsystem request.
pub const ACK: u8 = b'A';

/// Positive chunk acknowledgment.
pub const CHUNK_ACK: u8 = b'Y';

/// Negative chunk acknowledgment.
pub const CHUNK_NAK: u8 = b'N';

/// Sentinel the sender emits while waiting for a resynchronization.
pub const SYNC_SENTINEL: &[u8; 4] = b"sync";

/// Resynchronization acknowledgment.
pub const SYNC_ACK: u8 = b'S';

/// Length of a hex-encoded chunk digest on the wire.
pub const DIGEST_LEN: usize = 32;

/// Chunks are sent in multiples of this many bytes, except the last.
pub const CHUNK_GRANULARITY: usize = 1000;

/// Default chunk size requested from the sender.
pub const DEFAULT_CHUNK_SIZE: usize = 7000;

/// Consecutive digest mismatches tolerated before the transfer is salvaged.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 5;

/// Length of the file name the camera sends before the most recent image.
pub const REMOTE_FILENAME_LEN: usize = 15;

/// Prefix byte of a named-image request and acknowledgment of a settings push.
pub const NAMED_IMAGE_PREFIX: u8 = b'B';

/// Acknowledgment of a settings push.
pub const SETTINGS_PUSH_ACK: u8 = b'B';

/// Prefix byte of a pushed settings line.
pub const SETTINGS_PUSH_PREFIX: u8 = b'A';

/// Number of fields in a settings line.
pub const SETTINGS_FIELD_COUNT: usize = 7;

/// Line terminating an image listing.
pub const LISTING_TERMINATOR: &str = "X";

/// Line terminating a runtime-data dump.
pub const RUNTIME_DATA_TERMINATOR: &str = "\r";

/// Ping request byte; the camera echoes the same byte.
pub const PING: u8 = b'~';

/// Echo of a ping.
pub const PING_ECHO: u8 = b'~';

/// Tells the camera that the ping test is over.
pub const PING_DONE: u8 = b'D';
