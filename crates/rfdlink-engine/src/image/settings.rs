//! Picture-settings query and push.

use std::time::Instant;

use rfdlink_protocol::{
    ImageOp, PictureSettings, SETTINGS_PUSH_ACK, SETTINGS_PUSH_PREFIX,
};
use tracing::{debug, info};

use crate::config::ImageConfig;
use crate::error::{LinkError, LinkResult};
use crate::events::{ImageObserver, Notice};
use crate::image::handshake::{self, AckWait};
use crate::port::RadioPort;

/// Ask the camera for its settings and wait for a well-formed settings line.
///
/// Lines that are not exactly seven signed integers are skipped.
pub(crate) fn query(
    port: &mut RadioPort,
    observer: &mut dyn ImageObserver,
    config: &ImageConfig,
) -> LinkResult<PictureSettings> {
    let op = ImageOp::QuerySettings;
    handshake::request(port, observer, op, config.ack_deadline(), config.notice_interval())?;

    let deadline = config.settings_deadline();
    let started = Instant::now();
    while started.elapsed() < deadline {
        let Some(line) = port.read_line()? else {
            continue;
        };
        match PictureSettings::parse(&line) {
            Ok(settings) => {
                info!(%settings, "camera settings received");
                observer.on_settings(&settings);
                observer.on_notice(&Notice::Finished(op));
                return Ok(settings);
            }
            Err(e) => debug!(line = %line, error = %e, "skipping non-settings line"),
        }
    }
    Err(LinkError::SettingsTimeout(started.elapsed()))
}

/// Send `settings` to the camera and wait for it to confirm with `B`.
pub(crate) fn push(
    port: &mut RadioPort,
    observer: &mut dyn ImageObserver,
    config: &ImageConfig,
    settings: &PictureSettings,
) -> LinkResult<()> {
    let op = ImageOp::PushSettings;
    handshake::request(port, observer, op, config.ack_deadline(), config.notice_interval())?;

    let mut line = Vec::with_capacity(40);
    line.push(SETTINGS_PUSH_PREFIX);
    line.extend_from_slice(settings.to_line().as_bytes());
    line.push(b'\n');

    AckWait::new(op, config.settings_deadline(), config.notice_interval())
        .with_ack(SETTINGS_PUSH_ACK)
        .run(port, observer, &line)
        .map_err(|e| match e {
            LinkError::NoAcknowledgment { waited, .. } => LinkError::SettingsTimeout(waited),
            other => other,
        })?;

    info!(%settings, "camera settings updated");
    observer.on_notice(&Notice::SettingsUpdated);
    Ok(())
}
