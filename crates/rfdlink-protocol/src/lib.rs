//! RFD Ground-Station Link Protocol
//!
//! This crate provides the wire grammar spoken between the ground station and
//! the balloon payload over the half-duplex RFD900 serial radio. It is pure:
//! nothing here touches a serial port. The engine crate drives the I/O.
//!
//! # Protocol Overview
//!
//! Three conversations share the one serial channel:
//!
//! - **Commands** (ground → payload): `<identifier>?<command>!`, retransmitted
//!   until the payload echoes `<identifier>` back on a line of its own.
//! - **Downlink lines** (payload → ground): telemetry (`GPS,` + 7 fields),
//!   identifier echoes, and free text of the form `<payload>;<message>`.
//! - **Image subsystem** (ground ↔ camera): `IMAGE;<code>!` requests answered
//!   with a single ack byte, followed by operation-specific bodies such as the
//!   chunked, digest-verified image transfer.
//!
//! # Example
//!
//! ```rust,ignore
//! use rfdlink_protocol::{CommandFrame, Frame};
//!
//! let frame = CommandFrame::new("X1", "PING")?;
//! assert_eq!(frame.encode(), b"X1?PING!");
//!
//! match Frame::classify("GPS,12,34,56.7,45.123,-93.456,1200.0,7", None) {
//!     Frame::Telemetry(record) => println!("fix at {}", record.fix_time()),
//!     other => println!("{:?}", other),
//! }
//! ```

mod codec;
mod commands;
mod constants;
mod digest;
mod error;
mod frames;
mod payload;
mod settings;
mod telemetry;

pub use codec::*;
pub use commands::*;
pub use constants::*;
pub use digest::*;
pub use error::*;
pub use frames::*;
pub use payload::*;
pub use settings::*;
pub use telemetry::*;
