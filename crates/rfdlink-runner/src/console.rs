//! Console rendering of link events and image-subsystem notices.

use std::io::Write;
use std::time::{Duration, Instant};

use rfdlink_engine::{
    EventSink, ImageObserver, Notice, PayloadTracker, SavedImage, SinkResult,
};
use rfdlink_protocol::{PayloadMessage, PictureSettings, TelemetryRecord};

/// Prints every dispatched line and keeps the per-payload logs.
pub struct ConsoleSink<W: Write + Send> {
    out: W,
    payloads: PayloadTracker,
}

impl ConsoleSink<std::io::Stdout> {
    /// Sink printing to stdout.
    pub fn stdout() -> Self {
        ConsoleSink::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        ConsoleSink {
            out,
            payloads: PayloadTracker::new(),
        }
    }

    /// Payload logs collected so far.
    pub fn payloads(&self) -> &PayloadTracker {
        &self.payloads
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> EventSink for ConsoleSink<W> {
    fn on_telemetry(&mut self, record: &TelemetryRecord) -> SinkResult {
        writeln!(
            self.out,
            "[{}] lat {:.5} lon {:.5} alt {:.0} ft sats {}",
            record.fix_time(),
            record.latitude,
            record.longitude,
            record.altitude_ft(),
            record.satellite_count
        )?;
        Ok(())
    }

    fn on_text(&mut self, line: &str) -> SinkResult {
        writeln!(self.out, "{line}")?;
        Ok(())
    }

    fn on_identifier_ack(&mut self, identifier: &str) -> SinkResult {
        writeln!(self.out, "Command {identifier} acknowledged")?;
        Ok(())
    }

    fn on_payload(&mut self, message: &PayloadMessage) -> SinkResult {
        if self.payloads.route(message) {
            writeln!(self.out, "New payload: {}", message.payload)?;
        }
        if let Some(position) = message.position() {
            writeln!(
                self.out,
                "{} position [{}] lat {:.5} lon {:.5} alt {} sats {}",
                message.payload,
                position.time,
                position.latitude,
                position.longitude,
                position.altitude,
                position.satellites
            )?;
        }
        Ok(())
    }
}

/// Prints image-subsystem notices, rate limiting progress lines.
pub struct ConsoleObserver<W: Write> {
    out: W,
    progress_interval: Duration,
    last_progress: Option<Instant>,
}

impl ConsoleObserver<std::io::Stdout> {
    pub fn stdout() -> Self {
        ConsoleObserver::new(std::io::stdout())
    }
}

impl<W: Write> ConsoleObserver<W> {
    pub fn new(out: W) -> Self {
        ConsoleObserver {
            out,
            progress_interval: Duration::from_millis(500),
            last_progress: None,
        }
    }

    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    // Console write failures are not worth aborting a transfer over.
    fn line(&mut self, text: std::fmt::Arguments<'_>) {
        let _ = self.out.write_fmt(text);
        let _ = self.out.write_all(b"\n");
    }
}

impl<W: Write> ImageObserver for ConsoleObserver<W> {
    fn on_notice(&mut self, notice: &Notice) {
        if matches!(notice, Notice::Position(_)) {
            return;
        }
        self.line(format_args!("{notice}"));
    }

    fn on_progress(&mut self, received: usize, total: usize) {
        let due = self
            .last_progress
            .map_or(true, |at| at.elapsed() >= self.progress_interval);
        if !due && received < total {
            return;
        }
        self.last_progress = Some(Instant::now());
        let percent = if total == 0 {
            100.0
        } else {
            received as f64 * 100.0 / total as f64
        };
        self.line(format_args!("{received}/{total} ({percent:.0}%)"));
    }

    fn on_listing_entry(&mut self, entry: &str) {
        self.line(format_args!("  {entry}"));
    }

    fn on_settings(&mut self, settings: &PictureSettings) {
        self.line(format_args!(
            "width {} height {} sharpness {} brightness {} contrast {} saturation {} iso {}",
            settings.width,
            settings.height,
            settings.sharpness,
            settings.brightness,
            settings.contrast,
            settings.saturation,
            settings.iso
        ));
    }

    fn on_image_saved(&mut self, image: &SavedImage) {
        self.line(format_args!(
            "Saved {} ({} bytes)",
            image.path.display(),
            image.bytes
        ));
    }
}
