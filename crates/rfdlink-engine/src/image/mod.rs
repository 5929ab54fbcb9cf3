//! Image subsystem of the camera payload.
//!
//! Every operation borrows the [`RadioPort`] mutably for its whole duration,
//! so it cannot overlap with another operation or with a running receive loop
//! (which owns the port outright). Each operation returns a `Result` and also
//! ends with a terminal [`Notice`] to the observer: a success notice from the
//! operation itself, or [`Notice::NoAcknowledgment`], [`Notice::Failed`] and
//! friends on error.

mod handshake;
mod ping;
mod resync;
mod settings;
mod storage;
mod transfer;

pub use ping::{PingReport, TimeSyncReport};
pub use resync::{resync, ResyncOutcome};
pub use storage::{decode, latest_image_stem, ImageStore, SavedImage};
pub use transfer::{Chunk, TransferReport, TransferSession, TransferState};

use std::time::Instant;

use chrono::Local;
use rfdlink_protocol::{
    ImageOp, PictureSettings, LISTING_TERMINATOR, NAMED_IMAGE_PREFIX, REMOTE_FILENAME_LEN,
    RUNTIME_DATA_TERMINATOR,
};
use tracing::{info, warn};

use crate::config::ImageConfig;
use crate::error::{LinkError, LinkResult};
use crate::events::{ImageObserver, Notice};
use crate::port::RadioPort;

/// Axis of a camera flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipAxis {
    /// Upside down.
    Vertical,
    /// Mirror.
    Horizontal,
}

impl FlipAxis {
    /// Operation that performs this flip.
    pub fn op(&self) -> ImageOp {
        match self {
            FlipAxis::Vertical => ImageOp::FlipVertical,
            FlipAxis::Horizontal => ImageOp::FlipHorizontal,
        }
    }
}

/// A fetched and saved image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    /// How the transfer went.
    pub transfer: TransferReport,
    /// Where the image was written.
    pub saved: SavedImage,
}

/// Ground-side driver for the camera payload.
#[derive(Debug, Clone)]
pub struct ImageSystem {
    config: ImageConfig,
    store: ImageStore,
    settings: PictureSettings,
}

impl ImageSystem {
    /// Create a driver.
    pub fn new(config: ImageConfig) -> Self {
        ImageSystem {
            store: ImageStore::from_config(&config),
            config,
            settings: PictureSettings::default(),
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    /// Image store in use.
    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    /// Last known camera settings.
    pub fn settings(&self) -> &PictureSettings {
        &self.settings
    }

    /// Replace the settings that the next push sends.
    pub fn set_settings(&mut self, settings: PictureSettings) {
        self.settings = settings;
    }

    /// Fetch the most recently captured image.
    ///
    /// Saved under `name` if given, else under the camera's file name when it
    /// has one, else under a timestamped name.
    pub fn fetch_latest(
        &mut self,
        port: &mut RadioPort,
        observer: &mut dyn ImageObserver,
        name: Option<&str>,
    ) -> LinkResult<FetchReport> {
        let op = ImageOp::MostRecentImage;
        let result = self.fetch(port, observer, op, |port| {
            let remote = port.read_up_to(REMOTE_FILENAME_LEN)?;
            let remote = String::from_utf8_lossy(&remote);
            Ok(latest_image_stem(name, &remote, &Local::now()))
        });
        conclude(observer, op, result)
    }

    /// Fetch a stored image by name.
    pub fn fetch_named(
        &mut self,
        port: &mut RadioPort,
        observer: &mut dyn ImageObserver,
        name: &str,
    ) -> LinkResult<FetchReport> {
        let op = ImageOp::NamedImage;
        let result = self.fetch(port, observer, op, |port| {
            let mut request = Vec::with_capacity(name.len() + 2);
            request.push(NAMED_IMAGE_PREFIX);
            request.extend_from_slice(name.as_bytes());
            request.push(b'\n');
            port.write(&request)?;
            Ok(name.to_string())
        });
        conclude(observer, op, result)
    }

    fn fetch<F>(
        &mut self,
        port: &mut RadioPort,
        observer: &mut dyn ImageObserver,
        op: ImageOp,
        prelude: F,
    ) -> LinkResult<FetchReport>
    where
        F: FnOnce(&mut RadioPort) -> LinkResult<String>,
    {
        let mut session = TransferSession::new(&self.config);
        session.request(port, observer, op)?;

        let stem = prelude(port)?;
        observer.on_notice(&Notice::SavingAs(self.store.file_name(&stem)));

        let transfer = session.receive_body(port, observer)?;
        let saved = self.store.save(&stem, &transfer.data)?;
        if saved.fallback {
            let name = saved
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            observer.on_notice(&Notice::SavedUnderFallback(name));
        }
        observer.on_image_saved(&saved);
        observer.on_notice(&Notice::Finished(op));
        Ok(FetchReport { transfer, saved })
    }

    /// Fetch the list of images stored on the camera.
    pub fn fetch_listing(
        &mut self,
        port: &mut RadioPort,
        observer: &mut dyn ImageObserver,
    ) -> LinkResult<Vec<String>> {
        let op = ImageOp::ListImages;
        let result = self.read_lines(port, observer, op, true);
        conclude(observer, op, result)
    }

    /// Fetch the payload computer's runtime data.
    pub fn runtime_data(
        &mut self,
        port: &mut RadioPort,
        observer: &mut dyn ImageObserver,
    ) -> LinkResult<Vec<String>> {
        let op = ImageOp::RuntimeData;
        let result = self.read_lines(port, observer, op, false);
        conclude(observer, op, result)
    }

    /// Read a line-oriented body.
    ///
    /// A listing ends with an `X` line and keeps waiting through idle reads;
    /// runtime data ends with a bare `\r` line or the first idle read.
    fn read_lines(
        &mut self,
        port: &mut RadioPort,
        observer: &mut dyn ImageObserver,
        op: ImageOp,
        listing: bool,
    ) -> LinkResult<Vec<String>> {
        handshake::request(
            port,
            observer,
            op,
            self.config.ack_deadline(),
            self.config.notice_interval(),
        )?;

        let terminator = if listing {
            LISTING_TERMINATOR
        } else {
            RUNTIME_DATA_TERMINATOR
        };
        let deadline = self.config.body_deadline();
        let started = Instant::now();
        let mut lines = Vec::new();

        loop {
            match port.read_line()? {
                Some(line) if line == terminator => break,
                Some(line) if line.trim().is_empty() => {}
                Some(line) => {
                    if listing {
                        observer.on_listing_entry(&line);
                    }
                    lines.push(line);
                }
                None if !listing => break,
                None => {}
            }
            if started.elapsed() >= deadline {
                return Err(LinkError::BodyTimeout {
                    op,
                    waited: started.elapsed(),
                });
            }
        }

        info!(op = %op, lines = lines.len(), "body received");
        observer.on_notice(&Notice::Finished(op));
        Ok(lines)
    }

    /// Ask the camera for its current settings.
    pub fn query_settings(
        &mut self,
        port: &mut RadioPort,
        observer: &mut dyn ImageObserver,
    ) -> LinkResult<PictureSettings> {
        let op = ImageOp::QuerySettings;
        let result = settings::query(port, observer, &self.config);
        if let Ok(settings) = &result {
            self.settings = *settings;
        }
        conclude(observer, op, result)
    }

    /// Send new settings to the camera.
    ///
    /// The settings become the current ones whether or not the camera confirms.
    pub fn push_settings(
        &mut self,
        port: &mut RadioPort,
        observer: &mut dyn ImageObserver,
        settings: PictureSettings,
    ) -> LinkResult<()> {
        let op = ImageOp::PushSettings;
        self.settings = settings;
        let result = settings::push(port, observer, &self.config, &self.settings);
        conclude(observer, op, result)
    }

    /// Flip the camera image.
    pub fn flip(
        &mut self,
        port: &mut RadioPort,
        observer: &mut dyn ImageObserver,
        axis: FlipAxis,
    ) -> LinkResult<()> {
        let op = axis.op();
        let result = handshake::request(
            port,
            observer,
            op,
            self.config.ack_deadline(),
            self.config.notice_interval(),
        )
        .map(|_| {
            info!(op = %op, "flip acknowledged");
            observer.on_notice(&Notice::Flipped(op));
        });
        conclude(observer, op, result)
    }

    /// Report the payload clock, then measure the ping round trip.
    pub fn time_sync(
        &mut self,
        port: &mut RadioPort,
        observer: &mut dyn ImageObserver,
    ) -> LinkResult<TimeSyncReport> {
        let result = ping::time_sync(port, observer, &self.config);
        conclude(observer, ImageOp::TimeSync, result)
    }

    /// Measure the ping round trip.
    pub fn ping_test(
        &mut self,
        port: &mut RadioPort,
        observer: &mut dyn ImageObserver,
    ) -> LinkResult<PingReport> {
        let result = ping::ping_test(port, observer, &self.config);
        conclude(observer, ImageOp::PingTest, result)
    }

    /// Ask the payload computer to report its serial devices.
    ///
    /// Not acknowledged; the answer arrives as ordinary text lines.
    pub fn request_device_status(&mut self, port: &mut RadioPort) -> LinkResult<()> {
        port.write(&ImageOp::DeviceStatus.encode())?;
        info!("device status requested");
        Ok(())
    }
}

/// Emit the terminal notice of a failed operation.
fn conclude<T>(
    observer: &mut dyn ImageObserver,
    op: ImageOp,
    result: LinkResult<T>,
) -> LinkResult<T> {
    if let Err(e) = &result {
        warn!(op = %op, error = %e, "image operation failed");
        observer.on_notice(&failure_notice(op, e));
    }
    result
}

fn failure_notice(op: ImageOp, error: &LinkError) -> Notice {
    match error {
        LinkError::NoAcknowledgment { op, .. } => Notice::NoAcknowledgment(*op),
        LinkError::SettingsTimeout(_) if op == ImageOp::PushSettings => Notice::SettingsNotUpdated,
        LinkError::SettingsTimeout(_) => Notice::SettingsTimeout,
        LinkError::PingTimeout { ping, .. } => Notice::PingLost(*ping),
        other => Notice::Failed {
            op,
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_failure_notices() {
        let no_ack = LinkError::NoAcknowledgment {
            op: ImageOp::PingTest,
            waited: Duration::from_secs(20),
        };
        assert_eq!(
            failure_notice(ImageOp::TimeSync, &no_ack),
            Notice::NoAcknowledgment(ImageOp::PingTest)
        );

        let timeout = LinkError::SettingsTimeout(Duration::from_secs(10));
        assert_eq!(
            failure_notice(ImageOp::PushSettings, &timeout),
            Notice::SettingsNotUpdated
        );
        assert_eq!(
            failure_notice(ImageOp::QuerySettings, &timeout),
            Notice::SettingsTimeout
        );

        assert!(matches!(
            failure_notice(ImageOp::MostRecentImage, &LinkError::NoData),
            Notice::Failed {
                op: ImageOp::MostRecentImage,
                ..
            }
        ));
    }

    #[test]
    fn test_flip_axis_ops() {
        assert_eq!(FlipAxis::Vertical.op().code(), '0');
        assert_eq!(FlipAxis::Horizontal.op().code(), '9');
    }
}
