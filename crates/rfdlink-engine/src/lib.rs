//! RFD Ground-Station Link Engine
//!
//! Drives the conversations of [`rfdlink_protocol`] over one half-duplex
//! serial radio.
//!
//! # Channel Ownership
//!
//! The serial channel is wrapped in a [`RadioPort`], which is neither `Clone`
//! nor `Sync`. Whoever holds it is the only user of the link:
//!
//! - [`ReceiveLoop::start`] moves the port into the receive thread. The
//!   returned [`Listener`] dispatches downlink lines to an [`EventSink`] and
//!   sends commands with [`Listener::send_command`].
//! - [`Listener::stop`] hands the port back, after which [`ImageSystem`]
//!   operations borrow it mutably for their whole duration.
//!
//! # Example
//!
//! ```rust,ignore
//! use rfdlink_engine::{CancelToken, ImageConfig, ImageSystem, NullObserver, PortSettings, RadioPort, ReceiveLoop};
//!
//! let port = RadioPort::open(&PortSettings::new("/dev/ttyUSB0"))?;
//! let (tx, rx) = crossbeam_channel::unbounded();
//! let mut listener = ReceiveLoop::new(port, tx).start()?;
//! listener.send_command("X1", "PING", &CancelToken::new())?;
//!
//! let mut port = listener.stop()?;
//! let mut images = ImageSystem::new(ImageConfig::default());
//! images.fetch_latest(&mut port, &mut NullObserver, None)?;
//! ```

mod channel;
mod command;
mod config;
mod error;
mod events;
mod listener;
mod payloads;
mod port;

pub mod image;
pub mod testing;

pub use channel::*;
pub use command::{CancelToken, CommandOutcome};
pub use config::*;
pub use error::*;
pub use events::*;
pub use image::{FetchReport, FlipAxis, ImageStore, ImageSystem, SavedImage, TransferReport};
pub use listener::*;
pub use payloads::*;
pub use port::*;
