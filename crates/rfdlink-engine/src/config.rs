//! Tunables for the command channel and the image subsystem.
//!
//! Durations are carried as milliseconds so the structs load directly from
//! YAML; accessor methods hand out [`Duration`]s.

use std::path::PathBuf;
use std::time::Duration;

use rfdlink_protocol::{CHUNK_GRANULARITY, DEFAULT_CHUNK_SIZE, MAX_CONSECUTIVE_FAILURES};
use serde::{Deserialize, Serialize};

// ============================================================================
// Command Channel
// ============================================================================

/// Command/acknowledgment channel configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Pause between retransmissions of an unacknowledged command.
    pub retry_interval_ms: u64,
}

impl Default for CommandConfig {
    fn default() -> Self {
        CommandConfig {
            retry_interval_ms: 50,
        }
    }
}

impl CommandConfig {
    /// Set the retransmission interval.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval_ms = millis(interval);
        self
    }

    /// Pause between retransmissions.
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

// ============================================================================
// Image Subsystem
// ============================================================================

/// Image-subsystem configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Chunk size every transfer starts with.
    pub chunk_size: usize,
    /// Chunk size never shrinks below this.
    pub min_chunk_size: usize,
    /// Bytes removed from the chunk size after each mismatch.
    pub shrink_step: usize,
    /// Consecutive mismatches after which the transfer is salvaged.
    pub max_consecutive_failures: u32,
    /// Ack deadline for most requests.
    pub ack_deadline_ms: u64,
    /// Ack deadline for time sync and the ping test.
    pub time_sync_deadline_ms: u64,
    /// Deadline for receiving or pushing settings.
    pub settings_deadline_ms: u64,
    /// Deadline for each ping echo.
    pub ping_deadline_ms: u64,
    /// Pings per measurement.
    pub ping_count: u32,
    /// Minimum spacing of "waiting for acknowledgment" notices.
    pub notice_interval_ms: u64,
    /// Deadline for line-oriented bodies (listing, runtime data).
    pub body_deadline_ms: u64,
    /// Directory images are saved in.
    pub image_dir: PathBuf,
    /// Extension appended to saved images.
    pub extension: String,
    /// File stem used when the requested name cannot be used.
    pub fallback_stem: String,
}

impl Default for ImageConfig {
    fn default() -> Self {
        ImageConfig {
            chunk_size: DEFAULT_CHUNK_SIZE,
            min_chunk_size: CHUNK_GRANULARITY,
            shrink_step: CHUNK_GRANULARITY,
            max_consecutive_failures: MAX_CONSECUTIVE_FAILURES,
            ack_deadline_ms: 10_000,
            time_sync_deadline_ms: 20_000,
            settings_deadline_ms: 10_000,
            ping_deadline_ms: 10_000,
            ping_count: 10,
            notice_interval_ms: 1_000,
            body_deadline_ms: 60_000,
            image_dir: PathBuf::from("Images"),
            extension: ".jpg".to_string(),
            fallback_stem: "newimage".to_string(),
        }
    }
}

impl ImageConfig {
    /// Set the initial chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the ack deadline for ordinary requests.
    pub fn with_ack_deadline(mut self, deadline: Duration) -> Self {
        self.ack_deadline_ms = millis(deadline);
        self
    }

    /// Set the ack deadline for time sync and the ping test.
    pub fn with_time_sync_deadline(mut self, deadline: Duration) -> Self {
        self.time_sync_deadline_ms = millis(deadline);
        self
    }

    /// Set the settings deadline.
    pub fn with_settings_deadline(mut self, deadline: Duration) -> Self {
        self.settings_deadline_ms = millis(deadline);
        self
    }

    /// Set the per-ping deadline.
    pub fn with_ping_deadline(mut self, deadline: Duration) -> Self {
        self.ping_deadline_ms = millis(deadline);
        self
    }

    /// Set the number of pings per measurement.
    pub fn with_ping_count(mut self, count: u32) -> Self {
        self.ping_count = count;
        self
    }

    /// Set the spacing of waiting notices.
    pub fn with_notice_interval(mut self, interval: Duration) -> Self {
        self.notice_interval_ms = millis(interval);
        self
    }

    /// Set the deadline for line-oriented bodies.
    pub fn with_body_deadline(mut self, deadline: Duration) -> Self {
        self.body_deadline_ms = millis(deadline);
        self
    }

    /// Set the image directory.
    pub fn with_image_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.image_dir = dir.into();
        self
    }

    pub fn ack_deadline(&self) -> Duration {
        Duration::from_millis(self.ack_deadline_ms)
    }

    pub fn time_sync_deadline(&self) -> Duration {
        Duration::from_millis(self.time_sync_deadline_ms)
    }

    pub fn settings_deadline(&self) -> Duration {
        Duration::from_millis(self.settings_deadline_ms)
    }

    pub fn ping_deadline(&self) -> Duration {
        Duration::from_millis(self.ping_deadline_ms)
    }

    pub fn notice_interval(&self) -> Duration {
        Duration::from_millis(self.notice_interval_ms)
    }

    pub fn body_deadline(&self) -> Duration {
        Duration::from_millis(self.body_deadline_ms)
    }

    /// Chunk size after one more mismatch. Never grows.
    pub fn shrink(&self, chunk_size: usize) -> usize {
        if chunk_size > self.min_chunk_size {
            (chunk_size - self.shrink_step).max(self.min_chunk_size)
        } else {
            chunk_size
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ImageConfig::default();
        assert_eq!(config.chunk_size, 7000);
        assert_eq!(config.ack_deadline(), Duration::from_secs(10));
        assert_eq!(config.time_sync_deadline(), Duration::from_secs(20));
        assert_eq!(CommandConfig::default().retry_interval(), Duration::from_millis(50));
    }

    #[test]
    fn test_shrink_floors_at_minimum() {
        let config = ImageConfig::default();
        assert_eq!(config.shrink(7000), 6000);
        assert_eq!(config.shrink(6000), 5000);
        assert_eq!(config.shrink(1000), 1000);
        assert_eq!(config.shrink(1500), 1000);
        assert_eq!(config.shrink(500), 500);
    }
}
