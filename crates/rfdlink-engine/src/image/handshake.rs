//! Request/acknowledgment handshake shared by every image-subsystem request.

use std::time::{Duration, Instant};

use rfdlink_protocol::ImageOp;
use tracing::{info, trace, warn};

use crate::error::{LinkError, LinkResult};
use crate::events::{ImageObserver, Notice};
use crate::port::RadioPort;

/// A bounded wait for a single acknowledgment byte.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AckWait {
    /// Operation the wait belongs to, for notices and errors.
    pub op: ImageOp,
    /// Byte that ends the wait.
    pub ack: u8,
    /// Give up after this long.
    pub deadline: Duration,
    /// Spacing of waiting notices and retransmissions.
    pub notice_interval: Duration,
}

impl AckWait {
    /// Wait for the standard `A` acknowledgment of `op`.
    pub fn new(op: ImageOp, deadline: Duration, notice_interval: Duration) -> Self {
        AckWait {
            op,
            ack: rfdlink_protocol::ACK,
            deadline,
            notice_interval,
        }
    }

    /// Expect a different acknowledgment byte.
    pub fn with_ack(mut self, ack: u8) -> Self {
        self.ack = ack;
        self
    }

    /// Write `request` and read until the acknowledgment byte arrives.
    ///
    /// While waiting, a [`Notice::WaitingForAck`] is emitted and the request
    /// re-sent once per notice interval. Bytes other than the ack are
    /// discarded. Returns the time until the ack arrived.
    pub fn run(
        &self,
        port: &mut RadioPort,
        observer: &mut dyn ImageObserver,
        request: &[u8],
    ) -> LinkResult<Duration> {
        port.write(request)?;
        let started = Instant::now();
        let mut last_notice = started;

        loop {
            match port.read_byte()? {
                Some(byte) if byte == self.ack => {
                    let waited = started.elapsed();
                    trace!(op = %self.op, waited_ms = waited.as_millis() as u64, "acknowledged");
                    return Ok(waited);
                }
                Some(byte) => trace!(op = %self.op, byte, "discarding byte while awaiting ack"),
                None => {}
            }

            let waited = started.elapsed();
            if waited >= self.deadline {
                warn!(op = %self.op, waited_ms = waited.as_millis() as u64, "no acknowledgment");
                return Err(LinkError::NoAcknowledgment {
                    op: self.op,
                    waited,
                });
            }

            if last_notice.elapsed() >= self.notice_interval {
                info!(op = %self.op, "waiting for acknowledgment");
                observer.on_notice(&Notice::WaitingForAck(self.op));
                port.write(request)?;
                last_notice = Instant::now();
            }
        }
    }
}

/// Send the standard `IMAGE;<code>!` request for `op` and await its `A`.
///
/// Input is flushed first so stale bytes cannot be mistaken for the ack.
pub(crate) fn request(
    port: &mut RadioPort,
    observer: &mut dyn ImageObserver,
    op: ImageOp,
    deadline: Duration,
    notice_interval: Duration,
) -> LinkResult<Duration> {
    port.clear_input()?;
    AckWait::new(op, deadline, notice_interval).run(port, observer, &op.encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingObserver, ScriptedChannel};

    #[test]
    fn test_ack_after_noise() {
        let channel = ScriptedChannel::new();
        channel.push_inbound(b"xyzA");
        let mut port = RadioPort::new(Box::new(channel.clone()));
        let mut observer = RecordingObserver::new();

        AckWait::new(ImageOp::FlipVertical, Duration::from_secs(1), Duration::from_secs(1))
            .run(&mut port, &mut observer, b"IMAGE;0!")
            .unwrap();

        assert_eq!(channel.writes(), vec![b"IMAGE;0!".to_vec()]);
        assert!(observer.notices.is_empty());
    }

    #[test]
    fn test_deadline_expires_with_rate_limited_retries() {
        let channel = ScriptedChannel::new().with_idle_delay(Duration::from_millis(5));
        let mut port = RadioPort::new(Box::new(channel.clone()));
        let mut observer = RecordingObserver::new();

        let err = AckWait::new(
            ImageOp::QuerySettings,
            Duration::from_millis(200),
            Duration::from_millis(50),
        )
        .run(&mut port, &mut observer, b"IMAGE;4!")
        .unwrap_err();

        assert!(matches!(
            err,
            LinkError::NoAcknowledgment {
                op: ImageOp::QuerySettings,
                ..
            }
        ));
        let waiting = observer.count_notices(|n| matches!(n, Notice::WaitingForAck(_)));
        assert!((2..=4).contains(&waiting), "waiting notices: {}", waiting);
        assert_eq!(channel.count_writes(b"IMAGE;4!"), waiting + 1);
    }

    #[test]
    fn test_custom_ack_byte() {
        let channel = ScriptedChannel::new();
        channel.push_inbound(b"AB");
        let mut port = RadioPort::new(Box::new(channel));
        let mut observer = RecordingObserver::new();

        AckWait::new(ImageOp::PushSettings, Duration::from_secs(1), Duration::from_secs(1))
            .with_ack(b'B')
            .run(&mut port, &mut observer, b"A1,2,3,4,5,6,7\n")
            .unwrap();
    }
}
