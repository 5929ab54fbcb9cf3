//! Link timing: remote clock report and ping round trips.

use std::time::{Duration, Instant};

use chrono::Local;
use rfdlink_protocol::{ImageOp, PING, PING_DONE, PING_ECHO};
use tracing::{debug, info, warn};

use crate::config::ImageConfig;
use crate::error::{LinkError, LinkResult};
use crate::events::{ImageObserver, Notice};
use crate::image::handshake;
use crate::port::RadioPort;

/// Result of a ping measurement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingReport {
    /// Round trip of each ping, in order.
    pub round_trips: Vec<Duration>,
}

impl PingReport {
    /// Number of pings answered.
    pub fn pings(&self) -> u32 {
        self.round_trips.len() as u32
    }

    /// Mean round trip; zero when no pings were sent.
    pub fn mean(&self) -> Duration {
        if self.round_trips.is_empty() {
            return Duration::ZERO;
        }
        self.round_trips.iter().sum::<Duration>() / self.pings()
    }
}

/// Result of a time sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSyncReport {
    /// Clock line sent by the payload computer.
    pub remote_time: String,
    /// Local clock when it arrived.
    pub local_time: String,
    /// Ping measurement that followed.
    pub ping: PingReport,
}

/// Request the remote clock, then run a ping measurement.
pub(crate) fn time_sync(
    port: &mut RadioPort,
    observer: &mut dyn ImageObserver,
    config: &ImageConfig,
) -> LinkResult<TimeSyncReport> {
    let op = ImageOp::TimeSync;
    let deadline = config.time_sync_deadline();
    handshake::request(port, observer, op, deadline, config.notice_interval())?;

    let started = Instant::now();
    let remote_time = loop {
        if let Some(line) = port.read_line()? {
            let line = line.trim().to_string();
            if !line.is_empty() {
                break line;
            }
        }
        if started.elapsed() >= deadline {
            return Err(LinkError::BodyTimeout {
                op,
                waited: started.elapsed(),
            });
        }
    };
    let local_time = Local::now().format("%H:%M:%S").to_string();
    info!(remote = %remote_time, local = %local_time, "payload clock");
    observer.on_notice(&Notice::RemoteTime {
        remote: remote_time.clone(),
        local: local_time.clone(),
    });

    let ping = ping_test(port, observer, config)?;
    Ok(TimeSyncReport {
        remote_time,
        local_time,
        ping,
    })
}

/// Run the ping test: `ping_count` round trips, each under its own deadline.
///
/// The camera is told the test is over whether it succeeds or not.
pub(crate) fn ping_test(
    port: &mut RadioPort,
    observer: &mut dyn ImageObserver,
    config: &ImageConfig,
) -> LinkResult<PingReport> {
    let op = ImageOp::PingTest;
    handshake::request(
        port,
        observer,
        op,
        config.time_sync_deadline(),
        config.notice_interval(),
    )?;

    let result = measure(port, config);
    port.write(&[PING_DONE])?;

    let report = result?;
    info!(
        pings = report.pings(),
        mean_ms = report.mean().as_millis() as u64,
        "ping test complete"
    );
    observer.on_notice(&Notice::PingResult {
        pings: report.pings(),
        mean: report.mean(),
    });
    Ok(report)
}

fn measure(port: &mut RadioPort, config: &ImageConfig) -> LinkResult<PingReport> {
    let deadline = config.ping_deadline();
    let mut round_trips = Vec::with_capacity(config.ping_count as usize);

    for ping in 1..=config.ping_count {
        let sent = Instant::now();
        port.write(&[PING])?;
        loop {
            match port.read_byte()? {
                Some(PING_ECHO) => break,
                Some(other) => debug!(ping, byte = other, "discarding byte while awaiting echo"),
                None => {}
            }
            if sent.elapsed() >= deadline {
                warn!(ping, "ping lost");
                return Err(LinkError::PingTimeout { ping, deadline });
            }
        }
        let rtt = sent.elapsed();
        debug!(ping, rtt_ms = rtt.as_millis() as u64, "ping echoed");
        round_trips.push(rtt);
    }

    Ok(PingReport { round_trips })
}
